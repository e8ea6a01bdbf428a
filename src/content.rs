//! Content gating.
//!
//! Decides which items of a course's ordered content sequence a viewer
//! can see, given their entitlement. Privileged viewers (course staff)
//! bypass gating entirely; the bypass is a capability flag supplied by
//! the identity provider, never inferred from the content itself.

use serde::{Deserialize, Serialize};

use crate::catalog::ContentItem;
use crate::payments::entitlement::Entitlement;

/// An authenticated viewer, as supplied by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewer {
    /// The authenticated user.
    pub user_id: String,
    /// Whether the viewer holds the administrative capability and sees
    /// everything unmetered.
    #[serde(default)]
    pub privileged: bool,
}

impl Viewer {
    /// An ordinary viewer.
    #[must_use]
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            privileged: false,
        }
    }

    /// A privileged viewer.
    #[must_use]
    pub fn privileged(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            privileged: true,
        }
    }
}

/// Filters a course's content sequence down to what a viewer may see.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentGate;

impl ContentGate {
    /// The items a viewer can see, in sequence order.
    ///
    /// Ordinary viewers see the prefix their entitlement's access tag
    /// unlocks; with no entitlement nothing is visible. Privileged
    /// viewers receive the full sequence regardless of entitlement.
    #[must_use]
    pub fn visible_items(
        &self,
        viewer: &Viewer,
        entitlement: Option<&Entitlement>,
        items: Vec<ContentItem>,
    ) -> Vec<ContentItem> {
        if viewer.privileged {
            return items;
        }

        let threshold = match entitlement {
            Some(entitlement) => entitlement.access_tag.threshold(),
            // No entitlement: nothing visible
            None => Some(0),
        };

        match threshold {
            None => items,
            Some(limit) => items
                .into_iter()
                .filter(|item| item.sequence_order <= limit)
                .collect(),
        }
    }
}
