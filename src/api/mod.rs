//! HTTP surface of the settlement engine.
//!
//! Exposes order creation, gateway callback consumption, entitlement
//! lookup, and gated content listing as an Axum route module.

mod routes;

pub use routes::{
    CallbackResponse, ContentResponse, CreateOrderBody, CreateOrderResponse, EntitlementResponse,
    OrderStatusResponse, PaymentsModule, router,
};
