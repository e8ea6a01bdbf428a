//! Coursegate - tiered course access and payment settlement
//!
//! Coursegate is built on top of Axum and Tokio. It grants partial,
//! tiered access to paid course content and reconciles that access
//! against a redirect-based payment gateway's asynchronous callbacks
//! without double- or under-crediting a buyer.
//!
//! # Features
//!
//! - **Tier policy**: pure paid-percentage to unlocked-content rules
//! - **Order ledger**: one order per settlement attempt, with expiry
//! - **Callback reconciliation**: HMAC-verified, idempotent settlement
//! - **Content gating**: entitlement-driven visibility with an
//!   administrative bypass capability
//! - **HTTP**: Axum route module over an injectable [`AppContext`]
//! - **Testing**: in-process HTTP scenarios, in-memory stores
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use coursegate::{self, AppContext, ConfigBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Initialize logging
//!     coursegate::init_tracing();
//!
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     let addr = config.server.addr()?;
//!
//!     let context = AppContext::builder()
//!         .with_config(config)
//!         .with_gateway_secret(std::env::var("COURSEGATE_GATEWAY_SECRET")?)
//!         .build();
//!
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(listener, coursegate::api::router(context)).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
mod app;
pub mod catalog;
mod config;
pub mod content;
mod error;
mod http;
pub mod payments;
pub mod testing;
pub mod tier;

// Re-exports for public API
pub use app::{AppContext, AppContextBuilder};
pub use catalog::{CatalogStore, ContentItem, Course, InMemoryCatalogStore};
pub use config::{Config, ConfigBuilder, GatewayConfig, LoggingConfig, OrdersConfig, ServerConfig};
pub use content::{ContentGate, Viewer};
pub use error::{CoursegateError, ErrorResponse, Result};
pub use http::RouteModule;
pub use payments::{
    CallbackOutcome, CallbackReconciler, CreateOrderRequest, Entitlement, ExpirySweeper,
    GatewayCallback, GatewayClient, InMemoryPaymentStore, MockGatewayClient, Order, OrderLedger,
    OrderStatus, PaymentError, PaymentStore, SettlementResult, SignatureVerifier,
};
pub use tier::{AccessTag, TierLevel, access_tag_for_tier, amount_for_tier, balance_due};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early in your application, typically in main()
/// before building the AppContext.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "coursegate=debug")
/// - `COURSEGATE_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("COURSEGATE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
