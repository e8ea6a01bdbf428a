//! Payment-specific error types.
//!
//! Provides granular error types for order, callback, and entitlement
//! operations, enabling precise error handling and informative messages
//! for API consumers.

use std::fmt;

/// Payment-specific errors.
///
/// These errors provide more context than generic errors and can be
/// converted to [`CoursegateError`](crate::error::CoursegateError) for
/// HTTP responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    // Validation errors
    /// The requested tier percentage is not one of the supported tiers.
    InvalidTier { requested: u8 },
    /// The requested tier does not improve on the buyer's current entitlement.
    TierNotAnUpgrade { current: u8, requested: u8 },
    /// A balance payment would exceed the amount still owed on the course.
    InsufficientBalance { requested: u64, remaining: u64 },

    // Order errors
    /// No order exists with the given ID.
    OrderNotFound { order_id: String },
    /// The order already reached a terminal status.
    ///
    /// For callbacks this is an idempotent no-op, not a caller-visible
    /// failure: the reconciler returns the cached settlement result.
    AlreadyTerminal { order_id: String, status: String },
    /// The order expired before its callback arrived.
    OrderExpired { order_id: String },
    /// The order is not in a status that permits the requested transition.
    InvalidState { message: String },

    // Callback errors
    /// The gateway signature did not match the expected HMAC.
    ///
    /// Security-relevant: rejected before any state mutation and audited.
    SignatureInvalid { order_id: String },
    /// The callback parameters are missing or malformed.
    InvalidCallback { message: String },

    // Collaborator errors
    /// The course referenced by the order does not exist in the catalog.
    CourseNotFound { course_id: String },
    /// The payment gateway returned an error.
    GatewayError { operation: String, message: String },

    /// An unexpected internal error occurred.
    Internal { message: String },
}

impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTier { requested } => {
                write!(f, "Invalid tier: {}% is not a supported payment tier", requested)
            }
            Self::TierNotAnUpgrade { current, requested } => {
                write!(
                    f,
                    "Tier {}% does not upgrade the current entitlement at {}%",
                    requested, current
                )
            }
            Self::InsufficientBalance { requested, remaining } => {
                write!(
                    f,
                    "Balance payment of {} exceeds the {} still owed",
                    requested, remaining
                )
            }
            Self::OrderNotFound { order_id } => {
                write!(f, "Order not found: {}", order_id)
            }
            Self::AlreadyTerminal { order_id, status } => {
                write!(f, "Order {} already settled with status {}", order_id, status)
            }
            Self::OrderExpired { order_id } => {
                write!(f, "Order {} expired before the callback arrived", order_id)
            }
            Self::InvalidState { message } => {
                write!(f, "Invalid order state: {}", message)
            }
            Self::SignatureInvalid { order_id } => {
                write!(f, "Invalid gateway signature for order {}", order_id)
            }
            Self::InvalidCallback { message } => {
                write!(f, "Invalid callback: {}", message)
            }
            Self::CourseNotFound { course_id } => {
                write!(f, "Course not found: {}", course_id)
            }
            Self::GatewayError { operation, message } => {
                write!(f, "Gateway error during '{}': {}", operation, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal payment error: {}", message)
            }
        }
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for crate::error::CoursegateError {
    fn from(err: PaymentError) -> Self {
        match &err {
            // Map to NotFound
            PaymentError::OrderNotFound { .. } | PaymentError::CourseNotFound { .. } => {
                crate::error::CoursegateError::NotFound(err.to_string())
            }

            // Map to Forbidden (security-relevant rejection)
            PaymentError::SignatureInvalid { .. } => {
                crate::error::CoursegateError::Forbidden(err.to_string())
            }

            // Map to BadRequest (client errors)
            PaymentError::InvalidTier { .. }
            | PaymentError::TierNotAnUpgrade { .. }
            | PaymentError::InsufficientBalance { .. }
            | PaymentError::AlreadyTerminal { .. }
            | PaymentError::OrderExpired { .. }
            | PaymentError::InvalidState { .. }
            | PaymentError::InvalidCallback { .. } => {
                crate::error::CoursegateError::BadRequest(err.to_string())
            }

            // Map to ServiceUnavailable / Internal (server-side failures)
            PaymentError::GatewayError { .. } => {
                crate::error::CoursegateError::ServiceUnavailable(err.to_string())
            }
            PaymentError::Internal { .. } => {
                crate::error::CoursegateError::Internal(err.to_string())
            }
        }
    }
}

impl PaymentError {
    /// Check if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::GatewayError { .. } | Self::Internal { .. }
        )
    }

    /// Check if this error must be audited as a security event.
    ///
    /// Signature mismatches indicate tampering or misconfiguration and are
    /// never retried automatically.
    #[must_use]
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::SignatureInvalid { .. })
    }
}
