//! Tiered payment settlement for course access.
//!
//! Maps a paid percentage of a course's price to unlocked content,
//! tracks one order per settlement attempt, and reconciles gateway
//! redirect callbacks into entitlements exactly once per payment.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use coursegate::payments::{
//!     CallbackReconciler, CreateOrderRequest, GatewayCallback,
//!     InMemoryPaymentStore, MockGatewayClient, OrderLedger,
//!     SignatureVerifier, TracingAuditLogger,
//! };
//!
//! let store = Arc::new(InMemoryPaymentStore::new());
//! let ledger = OrderLedger::new(
//!     store.clone(),
//!     catalog,
//!     Arc::new(MockGatewayClient::new()),
//!     Arc::new(TracingAuditLogger),
//! );
//!
//! // A buyer requests the 30% tier
//! let order = ledger.create_order(CreateOrderRequest {
//!     user_id: "user_1".into(),
//!     course_id: "course_1".into(),
//!     domain_id: "domain_1".into(),
//!     tier_percent: 30,
//! }).await?;
//! ledger.mark_awaiting_callback(&order.id).await?;
//!
//! // ...gateway redirects back...
//! let reconciler = CallbackReconciler::new(
//!     store,
//!     SignatureVerifier::new(secret),
//!     Arc::new(TracingAuditLogger),
//! );
//! let result = reconciler.handle_callback(callback).await?;
//! assert!(result.verified);
//! ```

pub mod audit;
pub mod entitlement;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod order;
pub mod reconciler;
pub mod store;

// Order exports
pub use order::{Order, OrderStatus};

// Entitlement exports
pub use entitlement::Entitlement;

// Store exports
pub use store::{InMemoryPaymentStore, PaymentStore, Settlement};

// Ledger exports
pub use ledger::{CreateOrderRequest, ExpirySweeper, OrderLedger};

// Gateway exports
pub use gateway::{
    CallbackOutcome, GatewayCallback, GatewayClient, LiveGatewayClient, MockGatewayClient,
    SignatureVerifier,
};

// Reconciler exports
pub use reconciler::{CallbackReconciler, SettlementResult};

// Audit exports
pub use audit::{NoOpAuditLogger, PaymentAuditEvent, PaymentAuditLogger, TracingAuditLogger};

// Error exports
pub use error::PaymentError;

/// Current Unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
