//! Payment orders and their lifecycle.
//!
//! One order is created per settlement attempt (initial or balance
//! payment). Orders move Created -> AwaitingCallback -> one of
//! {Verified, Failed, Expired}; the terminal statuses are final and an
//! order is never reused for another attempt.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::tier::TierLevel;

/// Lifecycle status of a payment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Persisted, gateway order minted, client not yet redirected.
    Created,
    /// Client redirected to the gateway; a callback is expected.
    AwaitingCallback,
    /// Gateway confirmed payment; entitlement credited.
    Verified,
    /// Gateway reported the payment failed.
    Failed,
    /// No callback arrived within the expiry window.
    Expired,
}

impl OrderStatus {
    /// Terminal statuses never transition again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Failed | Self::Expired)
    }

    /// Convert to string for storage and logging.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AwaitingCallback => "awaiting_callback",
            Self::Verified => "verified",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment order for one settlement attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    /// Order ID (`ord_` prefix).
    pub id: String,
    /// The buyer.
    pub user_id: String,
    /// The course being (partially) bought.
    pub course_id: String,
    /// The domain the course belongs to.
    pub domain_id: String,
    /// Tier requested for this settlement attempt.
    pub tier: TierLevel,
    /// Amount due, smallest currency unit. Fixed at creation; later
    /// course price changes do not retroactively alter it.
    pub amount_due: u64,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Gateway-facing reference the client is redirected with.
    pub gateway_ref: String,
    /// Gateway payment ID, recorded on verification.
    pub gateway_payment_id: Option<String>,
    /// Creation timestamp (Unix seconds).
    pub created_at: u64,
    /// Last status change timestamp (Unix seconds).
    pub updated_at: u64,
}

impl Order {
    /// Mint a fresh order ID.
    #[must_use]
    pub fn new_id() -> String {
        format!("ord_{}", Uuid::new_v4().simple())
    }

    /// Whether this order already reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
