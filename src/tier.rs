//! Payment tiers and the access they unlock.
//!
//! A course can be bought in three tiers: 30%, 50%, or the full price.
//! Each tier maps to an access tag controlling how much of the course's
//! content sequence is unlocked. Both mappings are pure functions so the
//! stored access tag can always be recomputed from the verified tier.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::payments::error::PaymentError;

/// A supported payment tier, as a percentage of the course price.
///
/// Only 30, 50, and 100 are valid; any other percentage is an
/// input-validation error, not a runtime fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TierLevel {
    /// 30% of the course price.
    Thirty,
    /// 50% of the course price.
    Fifty,
    /// The full course price.
    Full,
}

impl TierLevel {
    /// The tier as a percentage of the course price.
    #[must_use]
    pub fn as_percent(&self) -> u8 {
        match self {
            Self::Thirty => 30,
            Self::Fifty => 50,
            Self::Full => 100,
        }
    }

    /// Parse a percentage into a tier.
    pub fn from_percent(percent: u8) -> Result<Self, PaymentError> {
        match percent {
            30 => Ok(Self::Thirty),
            50 => Ok(Self::Fifty),
            100 => Ok(Self::Full),
            other => Err(PaymentError::InvalidTier { requested: other }),
        }
    }
}

impl TryFrom<u8> for TierLevel {
    type Error = PaymentError;

    fn try_from(percent: u8) -> Result<Self, Self::Error> {
        Self::from_percent(percent)
    }
}

impl From<TierLevel> for u8 {
    fn from(tier: TierLevel) -> Self {
        tier.as_percent()
    }
}

impl fmt::Display for TierLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percent())
    }
}

/// How much of a course's content sequence an entitlement unlocks.
///
/// Derived from [`TierLevel`] via [`access_tag_for_tier`]; never stored
/// in a way that can drift from the tier it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessTag {
    /// The first four items of the sequence.
    #[serde(rename = "first-4")]
    FirstFour,
    /// The first eight items of the sequence.
    #[serde(rename = "first-8")]
    FirstEight,
    /// The entire sequence.
    #[serde(rename = "all")]
    All,
}

impl AccessTag {
    /// The highest unlocked sequence position, or `None` for unlimited.
    #[must_use]
    pub fn threshold(&self) -> Option<u32> {
        match self {
            Self::FirstFour => Some(4),
            Self::FirstEight => Some(8),
            Self::All => None,
        }
    }

    /// Convert to the wire string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstFour => "first-4",
            Self::FirstEight => "first-8",
            Self::All => "all",
        }
    }
}

impl fmt::Display for AccessTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Amount due for a tier, in the smallest currency unit.
///
/// Rounds up so the platform never under-collects:
/// `amount_for_tier(p, Full) == p` for every price.
#[must_use]
pub fn amount_for_tier(price: u64, tier: TierLevel) -> u64 {
    let percent = tier.as_percent() as u64;
    (price * percent + 99) / 100
}

/// The access tag a tier unlocks.
#[must_use]
pub fn access_tag_for_tier(tier: TierLevel) -> AccessTag {
    match tier {
        TierLevel::Thirty => AccessTag::FirstFour,
        TierLevel::Fifty => AccessTag::FirstEight,
        TierLevel::Full => AccessTag::All,
    }
}

/// The amount still owed on a course after partial payment.
pub fn balance_due(price: u64, already_paid: u64) -> Result<u64, PaymentError> {
    if already_paid > price {
        return Err(PaymentError::InvalidState {
            message: format!(
                "amount paid {} exceeds course price {}",
                already_paid, price
            ),
        });
    }
    Ok(price - already_paid)
}
