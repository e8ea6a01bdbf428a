//! Payment gateway integration.
//!
//! Covers the two directions of gateway traffic: creating a gateway
//! order to redirect the buyer to (via [`GatewayClient`]), and
//! consuming the redirect callback that comes back, whose authenticity
//! is established by an HMAC-SHA256 signature over the order ID,
//! gateway payment ID, and amount.
//!
//! The signature is verified server-side against the configured secret
//! before any state is touched. The redirect's own query parameters are
//! never trusted on their own.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::payments::error::PaymentError;

type HmacSha256 = Hmac<Sha256>;

/// Redirect path segment announcing a successful payment.
pub const CALLBACK_SUCCESS_SEGMENT: &str = "payment-success";
/// Redirect path segment announcing a failed payment.
pub const CALLBACK_FAILURE_SEGMENT: &str = "payment-failure";

/// Outcome reported by the gateway redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackOutcome {
    Success,
    Failure,
}

impl CallbackOutcome {
    /// Parse the outcome from the redirect URL's path segment.
    pub fn from_path_segment(segment: &str) -> Result<Self, PaymentError> {
        match segment {
            CALLBACK_SUCCESS_SEGMENT => Ok(Self::Success),
            CALLBACK_FAILURE_SEGMENT => Ok(Self::Failure),
            other => Err(PaymentError::InvalidCallback {
                message: format!("unknown outcome segment '{}'", other),
            }),
        }
    }

    /// Convert to string for logging.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl std::fmt::Display for CallbackOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A gateway callback, as delivered by redirect or webhook re-post.
///
/// Ephemeral: consumed once by the reconciler; only the terminal order
/// row persists as the idempotency marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayCallback {
    /// Our order ID, echoed back by the gateway.
    pub order_id: String,
    /// The gateway's payment ID.
    pub gateway_payment_id: String,
    /// Hex-encoded HMAC-SHA256 signature.
    pub signature: String,
    /// Success or failure.
    pub outcome: CallbackOutcome,
}

impl GatewayCallback {
    /// Parse a callback from a redirect URL's outcome segment and query
    /// parameters (`gateway_order_id`, `gateway_payment_id`,
    /// `gateway_signature`).
    pub fn from_redirect(
        outcome_segment: &str,
        params: &HashMap<String, String>,
    ) -> Result<Self, PaymentError> {
        let outcome = CallbackOutcome::from_path_segment(outcome_segment)?;
        let get = |key: &str| {
            params
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| PaymentError::InvalidCallback {
                    message: format!("missing parameter '{}'", key),
                })
        };

        Ok(Self {
            order_id: get("gateway_order_id")?,
            gateway_payment_id: get("gateway_payment_id")?,
            signature: get("gateway_signature")?,
            outcome,
        })
    }
}

/// Verifies gateway callback signatures with timing-safe comparison.
///
/// The gateway signs `{order_id}|{payment_id}|{amount}` with
/// HMAC-SHA256 and hex-encodes the digest. The secret is held in a
/// [`SecretString`] so it never shows up in logs or debug output.
pub struct SignatureVerifier {
    secret: SecretString,
}

impl SignatureVerifier {
    /// Create a verifier with the shared gateway secret.
    #[must_use]
    pub fn new(secret: impl Into<SecretString>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Compute the hex signature for a callback's signed payload.
    ///
    /// Exposed so the mock gateway and tests can mint valid callbacks.
    #[must_use]
    pub fn sign(&self, order_id: &str, payment_id: &str, amount: u64) -> String {
        hex::encode(self.mac_bytes(order_id, payment_id, amount))
    }

    /// Verify a callback signature. Constant-time; a malformed hex
    /// string simply fails verification.
    #[must_use]
    pub fn verify(
        &self,
        order_id: &str,
        payment_id: &str,
        amount: u64,
        signature: &str,
    ) -> bool {
        let provided = match hex::decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::debug!("Failed to decode callback signature");
                return false;
            }
        };

        let expected = self.mac_bytes(order_id, payment_id, amount);
        if expected.len() != provided.len() {
            return false;
        }
        expected.ct_eq(&provided).into()
    }

    fn mac_bytes(&self, order_id: &str, payment_id: &str, amount: u64) -> Vec<u8> {
        let payload = format!("{}|{}|{}", order_id, payment_id, amount);
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Trait for the gateway's order-creation API.
///
/// The gateway accepts an amount plus our order ID as receipt and
/// returns the reference the buyer is redirected with.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Create a gateway order and return its redirect reference.
    async fn create_gateway_order(
        &self,
        amount: u64,
        receipt: &str,
    ) -> Result<String, PaymentError>;
}

/// Mock gateway client for development and testing.
///
/// Mints `gw_` references locally and records every request.
#[derive(Default, Clone)]
pub struct MockGatewayClient {
    requests: std::sync::Arc<tokio::sync::Mutex<Vec<(u64, String)>>>,
    fail: bool,
}

impl MockGatewayClient {
    /// Create a mock that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock whose calls all fail, for error-path tests.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            requests: Default::default(),
            fail: true,
        }
    }

    /// The (amount, receipt) pairs requested so far.
    pub async fn requests(&self) -> Vec<(u64, String)> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl GatewayClient for MockGatewayClient {
    async fn create_gateway_order(
        &self,
        amount: u64,
        receipt: &str,
    ) -> Result<String, PaymentError> {
        if self.fail {
            return Err(PaymentError::GatewayError {
                operation: "create_gateway_order".to_string(),
                message: "mock gateway configured to fail".to_string(),
            });
        }
        self.requests
            .lock()
            .await
            .push((amount, receipt.to_string()));
        Ok(format!("gw_{}", Uuid::new_v4().simple()))
    }
}

/// Live gateway client speaking the gateway's REST order API.
///
/// Authenticates with HTTP basic auth (key ID + secret); the secret is
/// held in a [`SecretString`].
pub struct LiveGatewayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: SecretString,
}

#[derive(Serialize)]
struct CreateGatewayOrderBody<'a> {
    amount: u64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Deserialize)]
struct GatewayOrderResponse {
    id: String,
}

impl LiveGatewayClient {
    /// Create a live client against the gateway's API base URL.
    pub fn new(
        base_url: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<SecretString>,
    ) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::Internal {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        })
    }

    /// Create a live client from configuration plus the API secret.
    ///
    /// The secret travels separately from [`GatewayConfig`] so it never
    /// appears in serialized configuration.
    pub fn from_config(
        config: &crate::config::GatewayConfig,
        key_secret: impl Into<SecretString>,
    ) -> Result<Self, PaymentError> {
        Self::new(config.base_url.clone(), config.key_id.clone(), key_secret)
    }
}

#[async_trait]
impl GatewayClient for LiveGatewayClient {
    async fn create_gateway_order(
        &self,
        amount: u64,
        receipt: &str,
    ) -> Result<String, PaymentError> {
        let url = format!("{}/orders", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&CreateGatewayOrderBody {
                amount,
                currency: "INR",
                receipt,
            })
            .send()
            .await
            .map_err(|e| PaymentError::GatewayError {
                operation: "create_gateway_order".to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(PaymentError::GatewayError {
                operation: "create_gateway_order".to_string(),
                message: format!("gateway returned HTTP {}", response.status()),
            });
        }

        let body: GatewayOrderResponse =
            response
                .json()
                .await
                .map_err(|e| PaymentError::GatewayError {
                    operation: "create_gateway_order".to_string(),
                    message: format!("malformed gateway response: {}", e),
                })?;

        Ok(body.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // ============ CallbackOutcome tests ============

    #[test]
    fn test_outcome_from_path_segment() {
        assert_eq!(
            CallbackOutcome::from_path_segment("payment-success").unwrap(),
            CallbackOutcome::Success
        );
        assert_eq!(
            CallbackOutcome::from_path_segment("payment-failure").unwrap(),
            CallbackOutcome::Failure
        );
        assert!(matches!(
            CallbackOutcome::from_path_segment("payment-pending"),
            Err(PaymentError::InvalidCallback { .. })
        ));
    }

    // ============ GatewayCallback parsing tests ============

    #[test]
    fn test_callback_from_redirect() {
        let cb = GatewayCallback::from_redirect(
            "payment-success",
            &params(&[
                ("gateway_order_id", "ord_1"),
                ("gateway_payment_id", "pay_1"),
                ("gateway_signature", "abcd"),
            ]),
        )
        .unwrap();

        assert_eq!(cb.order_id, "ord_1");
        assert_eq!(cb.gateway_payment_id, "pay_1");
        assert_eq!(cb.signature, "abcd");
        assert_eq!(cb.outcome, CallbackOutcome::Success);
    }

    #[test]
    fn test_callback_missing_or_empty_params_rejected() {
        let err = GatewayCallback::from_redirect(
            "payment-success",
            &params(&[("gateway_order_id", "ord_1")]),
        )
        .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidCallback { .. }));

        let err = GatewayCallback::from_redirect(
            "payment-success",
            &params(&[
                ("gateway_order_id", "ord_1"),
                ("gateway_payment_id", ""),
                ("gateway_signature", "abcd"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidCallback { .. }));
    }

    // ============ SignatureVerifier tests ============

    #[test]
    fn test_verify_valid_signature() {
        let verifier = SignatureVerifier::new("test-secret".to_string());
        let sig = verifier.sign("ord_1", "pay_1", 300);
        assert!(verifier.verify("ord_1", "pay_1", 300, &sig));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let verifier = SignatureVerifier::new("test-secret".to_string());
        let sig = verifier.sign("ord_1", "pay_1", 300);

        // Any changed field invalidates the signature
        assert!(!verifier.verify("ord_2", "pay_1", 300, &sig));
        assert!(!verifier.verify("ord_1", "pay_2", 300, &sig));
        assert!(!verifier.verify("ord_1", "pay_1", 301, &sig));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let signer = SignatureVerifier::new("secret-a".to_string());
        let verifier = SignatureVerifier::new("secret-b".to_string());
        let sig = signer.sign("ord_1", "pay_1", 300);
        assert!(!verifier.verify("ord_1", "pay_1", 300, &sig));
    }

    #[test]
    fn test_verify_rejects_malformed_signature() {
        let verifier = SignatureVerifier::new("test-secret".to_string());
        for sig in ["", "not-hex", "abc", "zz00"] {
            assert!(!verifier.verify("ord_1", "pay_1", 300, sig));
        }
    }

    // ============ MockGatewayClient tests ============

    #[tokio::test]
    async fn test_mock_gateway_records_requests() {
        let gateway = MockGatewayClient::new();
        let gw_ref = gateway.create_gateway_order(300, "ord_1").await.unwrap();
        assert!(gw_ref.starts_with("gw_"));

        let requests = gateway.requests().await;
        assert_eq!(requests, vec![(300, "ord_1".to_string())]);
    }

    #[tokio::test]
    async fn test_failing_mock_gateway() {
        let gateway = MockGatewayClient::failing();
        let err = gateway.create_gateway_order(300, "ord_1").await.unwrap_err();
        assert!(matches!(err, PaymentError::GatewayError { .. }));
    }

    // ============ LiveGatewayClient tests ============

    #[test]
    fn test_live_client_from_config() {
        let config = crate::config::GatewayConfig {
            base_url: "https://api.gateway.example/v1/".to_string(),
            key_id: "key_abc".to_string(),
        };
        let client =
            LiveGatewayClient::from_config(&config, "key-secret".to_string()).unwrap();
        assert_eq!(client.base_url, "https://api.gateway.example/v1");
        assert_eq!(client.key_id, "key_abc");
    }
}
