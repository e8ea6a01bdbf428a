//! Audit logging for payment operations.
//!
//! Provides a trait-based audit logging system for tracking settlement
//! events. This is useful for compliance, debugging, and security
//! monitoring: rejected signatures in particular are always audited.

use async_trait::async_trait;
use std::fmt;

/// Audit event types for payment operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentAuditEvent {
    /// Order created for a settlement attempt.
    OrderCreated {
        order_id: String,
        user_id: String,
        course_id: String,
        tier_percent: u8,
        amount_due: u64,
    },
    /// Callback received from the gateway.
    CallbackReceived {
        order_id: String,
        outcome: String,
    },
    /// Callback signature rejected. Security event.
    SignatureRejected {
        order_id: String,
        gateway_payment_id: String,
    },
    /// Order verified and entitlement credited.
    PaymentVerified {
        order_id: String,
        user_id: String,
        course_id: String,
        tier_percent: u8,
        amount: u64,
        total_paid: u64,
    },
    /// Gateway reported the payment failed.
    PaymentFailed {
        order_id: String,
    },
    /// Order expired without a callback.
    OrderExpired {
        order_id: String,
    },
}

impl fmt::Display for PaymentAuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrderCreated { order_id, user_id, course_id, tier_percent, amount_due } => {
                write!(
                    f,
                    "Order created: order={}, user={}, course={}, tier={}%, due={}",
                    order_id, user_id, course_id, tier_percent, amount_due
                )
            }
            Self::CallbackReceived { order_id, outcome } => {
                write!(f, "Callback received: order={}, outcome={}", order_id, outcome)
            }
            Self::SignatureRejected { order_id, gateway_payment_id } => {
                write!(
                    f,
                    "Signature rejected: order={}, payment={}",
                    order_id, gateway_payment_id
                )
            }
            Self::PaymentVerified { order_id, user_id, course_id, tier_percent, amount, total_paid } => {
                write!(
                    f,
                    "Payment verified: order={}, user={}, course={}, tier={}%, amount={}, total_paid={}",
                    order_id, user_id, course_id, tier_percent, amount, total_paid
                )
            }
            Self::PaymentFailed { order_id } => {
                write!(f, "Payment failed: order={}", order_id)
            }
            Self::OrderExpired { order_id } => {
                write!(f, "Order expired: order={}", order_id)
            }
        }
    }
}

/// Trait for audit logging backends.
///
/// Implement this trait to integrate with your logging system (e.g.
/// database, external service, file-based logging).
#[async_trait]
pub trait PaymentAuditLogger: Send + Sync {
    /// Log a payment audit event.
    ///
    /// Implementations should handle failures gracefully to avoid
    /// disrupting settlement.
    async fn log(&self, event: PaymentAuditEvent);
}

/// No-op audit logger that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAuditLogger;

#[async_trait]
impl PaymentAuditLogger for NoOpAuditLogger {
    async fn log(&self, _event: PaymentAuditEvent) {
        // No-op
    }
}

/// Tracing-based audit logger.
///
/// Logs events at INFO level, except security events which log at WARN.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

#[async_trait]
impl PaymentAuditLogger for TracingAuditLogger {
    async fn log(&self, event: PaymentAuditEvent) {
        let kind = event_kind(&event);
        if matches!(event, PaymentAuditEvent::SignatureRejected { .. }) {
            tracing::warn!(
                target: "payments::audit",
                event_type = %kind,
                security = true,
                "{}", event
            );
        } else {
            tracing::info!(
                target: "payments::audit",
                event_type = %kind,
                "{}", event
            );
        }
    }
}

/// Get the event kind as a string for structured logging.
fn event_kind(event: &PaymentAuditEvent) -> &'static str {
    match event {
        PaymentAuditEvent::OrderCreated { .. } => "order_created",
        PaymentAuditEvent::CallbackReceived { .. } => "callback_received",
        PaymentAuditEvent::SignatureRejected { .. } => "signature_rejected",
        PaymentAuditEvent::PaymentVerified { .. } => "payment_verified",
        PaymentAuditEvent::PaymentFailed { .. } => "payment_failed",
        PaymentAuditEvent::OrderExpired { .. } => "order_expired",
    }
}
