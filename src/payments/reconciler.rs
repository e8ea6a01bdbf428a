//! Gateway callback reconciliation.
//!
//! The reconciler is the only writer of entitlement transitions. It
//! consumes gateway callbacks at-least-once: duplicate deliveries of a
//! settled order return the cached result instead of re-crediting, and
//! the signature is verified before any state is touched.

use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::payments::audit::{PaymentAuditEvent, PaymentAuditLogger};
use crate::payments::entitlement::Entitlement;
use crate::payments::error::PaymentError;
use crate::payments::gateway::{CallbackOutcome, GatewayCallback, SignatureVerifier};
use crate::payments::order::{Order, OrderStatus};
use crate::payments::store::PaymentStore;
use crate::payments::unix_now;
use crate::tier::{AccessTag, TierLevel};

/// Outcome of consuming a callback, as reported to the caller.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SettlementResult {
    /// The order the callback settled.
    pub order_id: String,
    /// Whether the payment is verified (true for duplicate deliveries
    /// of an already-verified order).
    pub verified: bool,
    /// Current entitlement tier for the pair, if any.
    pub tier: Option<TierLevel>,
    /// Current access tag for the pair, if any.
    pub access_tag: Option<AccessTag>,
    /// Current total paid for the pair.
    pub total_paid: u64,
}

impl SettlementResult {
    fn new(order: &Order, verified: bool, entitlement: Option<&Entitlement>) -> Self {
        Self {
            order_id: order.id.clone(),
            verified,
            tier: entitlement.map(|e| e.highest_tier),
            access_tag: entitlement.map(|e| e.access_tag),
            total_paid: entitlement.map(|e| e.total_paid).unwrap_or(0),
        }
    }
}

/// Consumes gateway callbacks and settles orders exactly once.
pub struct CallbackReconciler {
    store: Arc<dyn PaymentStore>,
    verifier: SignatureVerifier,
    audit: Arc<dyn PaymentAuditLogger>,
}

impl CallbackReconciler {
    /// Create a new reconciler.
    #[must_use]
    pub fn new(
        store: Arc<dyn PaymentStore>,
        verifier: SignatureVerifier,
        audit: Arc<dyn PaymentAuditLogger>,
    ) -> Self {
        Self {
            store,
            verifier,
            audit,
        }
    }

    /// Consume one gateway callback.
    ///
    /// Idempotent under at-least-once delivery, keyed on the order ID:
    /// a callback for an order that already settled returns the cached
    /// result without touching any state. A callback for an expired
    /// order is rejected. Signature mismatches are rejected before any
    /// mutation and audited as security events, never retried.
    pub async fn handle_callback(&self, callback: GatewayCallback) -> Result<SettlementResult> {
        self.audit
            .log(PaymentAuditEvent::CallbackReceived {
                order_id: callback.order_id.clone(),
                outcome: callback.outcome.as_str().to_string(),
            })
            .await;

        let order = self
            .store
            .get_order(&callback.order_id)
            .await?
            .ok_or_else(|| PaymentError::OrderNotFound {
                order_id: callback.order_id.clone(),
            })?;

        if order.is_terminal() {
            return Ok(self.terminal_result(&order).await?);
        }

        // Authenticity first: nothing below runs on a bad signature.
        if !self.verifier.verify(
            &order.id,
            &callback.gateway_payment_id,
            order.amount_due,
            &callback.signature,
        ) {
            self.audit
                .log(PaymentAuditEvent::SignatureRejected {
                    order_id: order.id.clone(),
                    gateway_payment_id: callback.gateway_payment_id.clone(),
                })
                .await;
            return Err(PaymentError::SignatureInvalid {
                order_id: order.id,
            }
            .into());
        }

        match callback.outcome {
            CallbackOutcome::Failure => self.settle_failure(&order, &callback).await,
            CallbackOutcome::Success => self.settle_verified(&order, &callback).await,
        }
    }

    async fn settle_failure(
        &self,
        order: &Order,
        callback: &GatewayCallback,
    ) -> Result<SettlementResult> {
        let failed = match self
            .store
            .mark_failed(&order.id, Some(&callback.gateway_payment_id), unix_now())
            .await
        {
            Ok(order) => order,
            // A concurrent delivery settled the order first; defer to it.
            Err(PaymentError::AlreadyTerminal { .. }) => {
                return Ok(self.refetch_terminal(&order.id).await?);
            }
            Err(other) => return Err(other.into()),
        };

        self.audit
            .log(PaymentAuditEvent::PaymentFailed {
                order_id: failed.id.clone(),
            })
            .await;

        let entitlement = self
            .store
            .get_entitlement(&failed.user_id, &failed.course_id)
            .await?;
        Ok(SettlementResult::new(&failed, false, entitlement.as_ref()))
    }

    async fn settle_verified(
        &self,
        order: &Order,
        callback: &GatewayCallback,
    ) -> Result<SettlementResult> {
        let settlement = match self
            .store
            .settle_success(&order.id, &callback.gateway_payment_id, unix_now())
            .await
        {
            Ok(settlement) => settlement,
            // A concurrent delivery settled the order first; defer to it.
            Err(PaymentError::AlreadyTerminal { .. }) => {
                return Ok(self.refetch_terminal(&order.id).await?);
            }
            Err(other) => return Err(other.into()),
        };

        self.audit
            .log(PaymentAuditEvent::PaymentVerified {
                order_id: settlement.order.id.clone(),
                user_id: settlement.order.user_id.clone(),
                course_id: settlement.order.course_id.clone(),
                tier_percent: settlement.order.tier.as_percent(),
                amount: settlement.order.amount_due,
                total_paid: settlement.entitlement.total_paid,
            })
            .await;

        Ok(SettlementResult::new(
            &settlement.order,
            true,
            Some(&settlement.entitlement),
        ))
    }

    /// Cached result for an order that already reached a terminal
    /// status. Expired orders are a hard rejection: the payment must be
    /// retried via a fresh order.
    async fn terminal_result(&self, order: &Order) -> std::result::Result<SettlementResult, PaymentError> {
        match order.status {
            OrderStatus::Verified => {
                let entitlement = self
                    .store
                    .get_entitlement(&order.user_id, &order.course_id)
                    .await?;
                Ok(SettlementResult::new(order, true, entitlement.as_ref()))
            }
            OrderStatus::Failed => {
                let entitlement = self
                    .store
                    .get_entitlement(&order.user_id, &order.course_id)
                    .await?;
                Ok(SettlementResult::new(order, false, entitlement.as_ref()))
            }
            OrderStatus::Expired => Err(PaymentError::OrderExpired {
                order_id: order.id.clone(),
            }),
            OrderStatus::Created | OrderStatus::AwaitingCallback => {
                Err(PaymentError::Internal {
                    message: format!("order {} is not terminal", order.id),
                })
            }
        }
    }

    async fn refetch_terminal(
        &self,
        order_id: &str,
    ) -> std::result::Result<SettlementResult, PaymentError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| PaymentError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        self.terminal_result(&order).await
    }
}
