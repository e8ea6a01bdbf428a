//! Course entitlements.
//!
//! An entitlement records what a (user, course) pair has paid and
//! unlocked. It is created on the first verified order for the pair,
//! mutated only by the callback reconciler, and is monotonically
//! non-decreasing in both tier and amount paid. Because every mutation
//! absorbs exactly one verified order, the row is a projection that can
//! be rebuilt from the order history at any time.

use serde::{Deserialize, Serialize};

use crate::payments::order::{Order, OrderStatus};
use crate::tier::{AccessTag, TierLevel, access_tag_for_tier};

/// What a user has paid and unlocked on a course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entitlement {
    /// The entitled user.
    pub user_id: String,
    /// The course the entitlement is scoped to.
    pub course_id: String,
    /// Highest tier any verified order reached.
    pub highest_tier: TierLevel,
    /// Sum of all verified order amounts, smallest currency unit.
    pub total_paid: u64,
    /// Access unlocked by `highest_tier`; recomputed on every write so
    /// it can never drift from the tier.
    pub access_tag: AccessTag,
    /// Last mutation timestamp (Unix seconds).
    pub updated_at: u64,
}

impl Entitlement {
    /// Entitlement granted by a first verified order.
    #[must_use]
    pub fn from_order(order: &Order, now: u64) -> Self {
        Self {
            user_id: order.user_id.clone(),
            course_id: order.course_id.clone(),
            highest_tier: order.tier,
            total_paid: order.amount_due,
            access_tag: access_tag_for_tier(order.tier),
            updated_at: now,
        }
    }

    /// Absorb one more verified order.
    ///
    /// Tier only ever rises and the paid total only ever grows; the
    /// access tag is recomputed from the resulting tier.
    pub fn absorb(&mut self, order: &Order, now: u64) {
        self.highest_tier = self.highest_tier.max(order.tier);
        self.total_paid += order.amount_due;
        self.access_tag = access_tag_for_tier(self.highest_tier);
        self.updated_at = now;
    }

    /// Rebuild the entitlement for a pair as a fold over its verified
    /// orders, in creation order. Returns `None` when nothing verified.
    ///
    /// Used for reconciliation and audit: the stored row must always
    /// equal this fold.
    #[must_use]
    pub fn fold_verified<'a>(
        orders: impl IntoIterator<Item = &'a Order>,
        now: u64,
    ) -> Option<Self> {
        let mut verified: Vec<&Order> = orders
            .into_iter()
            .filter(|o| o.status == OrderStatus::Verified)
            .collect();
        verified.sort_by_key(|o| o.created_at);

        let mut iter = verified.into_iter();
        let first = iter.next()?;
        let mut entitlement = Self::from_order(first, now);
        for order in iter {
            entitlement.absorb(order, now);
        }
        Some(entitlement)
    }
}
