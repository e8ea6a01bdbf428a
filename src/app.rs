use std::sync::Arc;

use secrecy::SecretString;

use crate::catalog::{CatalogStore, InMemoryCatalogStore};
use crate::config::Config;
use crate::content::ContentGate;
use crate::payments::audit::{PaymentAuditLogger, TracingAuditLogger};
use crate::payments::gateway::{GatewayClient, MockGatewayClient, SignatureVerifier};
use crate::payments::ledger::OrderLedger;
use crate::payments::reconciler::CallbackReconciler;
use crate::payments::store::{InMemoryPaymentStore, PaymentStore};

/// Application context for dependency injection and shared state
///
/// Holds the stores, managers, and configuration the HTTP handlers
/// work against. Collaborators are trait objects so applications can
/// swap in their own database-backed implementations.
#[derive(Clone)]
pub struct AppContext {
    /// Order and entitlement storage.
    pub store: Arc<dyn PaymentStore>,
    /// Course catalog collaborator.
    pub catalog: Arc<dyn CatalogStore>,
    /// Order creation and lifecycle.
    pub ledger: Arc<OrderLedger>,
    /// Callback consumption.
    pub reconciler: Arc<CallbackReconciler>,
    /// Content visibility rules.
    pub gate: ContentGate,
    /// Service configuration.
    pub config: Arc<Config>,
}

impl AppContext {
    /// Builder pattern for constructing AppContext
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::new()
    }
}

/// Builder for AppContext with fluent API
///
/// Defaults to in-memory stores, the mock gateway, and tracing-based
/// audit logging, which is the development and testing setup. Point
/// the builder at your own implementations for production.
#[must_use = "builder does nothing until you call build()"]
pub struct AppContextBuilder {
    store: Option<Arc<dyn PaymentStore>>,
    catalog: Option<Arc<dyn CatalogStore>>,
    gateway: Option<Arc<dyn GatewayClient>>,
    audit: Option<Arc<dyn PaymentAuditLogger>>,
    gateway_secret: Option<SecretString>,
    config: Option<Config>,
}

impl AppContextBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            catalog: None,
            gateway: None,
            audit: None,
            gateway_secret: None,
            config: None,
        }
    }

    /// Set the payment store
    pub fn with_payment_store(mut self, store: Arc<dyn PaymentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the catalog store
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogStore>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Set the gateway client
    pub fn with_gateway_client(mut self, gateway: Arc<dyn GatewayClient>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Set the audit logger
    pub fn with_audit_logger(mut self, audit: Arc<dyn PaymentAuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Set the shared secret used to verify gateway callback signatures
    pub fn with_gateway_secret(mut self, secret: impl Into<SecretString>) -> Self {
        self.gateway_secret = Some(secret.into());
        self
    }

    /// Set the service configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> AppContext {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryPaymentStore::new()));
        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(InMemoryCatalogStore::new()));
        let gateway = self
            .gateway
            .unwrap_or_else(|| Arc::new(MockGatewayClient::new()));
        let audit = self
            .audit
            .unwrap_or_else(|| Arc::new(TracingAuditLogger));
        let config = Arc::new(self.config.unwrap_or_default());

        let secret = self.gateway_secret.unwrap_or_else(|| {
            tracing::warn!(
                "No gateway secret configured - callback signatures will not verify. \
                 Set one with AppContextBuilder::with_gateway_secret for anything \
                 beyond local development."
            );
            SecretString::new(String::new())
        });

        let ledger = Arc::new(OrderLedger::new(
            store.clone(),
            catalog.clone(),
            gateway,
            audit.clone(),
        ));
        let reconciler = Arc::new(CallbackReconciler::new(
            store.clone(),
            SignatureVerifier::new(secret),
            audit,
        ));

        AppContext {
            store,
            catalog,
            ledger,
            reconciler,
            gate: ContentGate,
            config,
        }
    }
}

impl Default for AppContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::ledger::CreateOrderRequest;

    #[tokio::test]
    async fn test_default_build_is_usable() {
        let context = AppContext::builder()
            .with_gateway_secret("test-secret".to_string())
            .build();

        // No catalog seeded: order creation fails with a course lookup
        let err = context
            .ledger
            .create_order(CreateOrderRequest {
                user_id: "user_1".to_string(),
                course_id: "course_1".to_string(),
                domain_id: "domain_1".to_string(),
                tier_percent: 30,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Course not found"));
    }

    #[tokio::test]
    async fn test_builder_accepts_custom_collaborators() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let context = AppContext::builder()
            .with_payment_store(store.clone())
            .with_gateway_secret("test-secret".to_string())
            .build();

        assert!(context
            .store
            .get_order("ord_missing")
            .await
            .unwrap()
            .is_none());
        assert!(store.all_orders().await.is_empty());
    }
}
