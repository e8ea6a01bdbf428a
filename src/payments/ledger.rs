//! Order creation and lifecycle management.
//!
//! The ledger creates one order per settlement attempt, computes the
//! amount due from the tier policy (charging upgraders only the
//! difference), hands the order to the gateway for a redirect
//! reference, and expires orders whose callback never arrives.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::catalog::CatalogStore;
use crate::config::OrdersConfig;
use crate::error::Result;
use crate::payments::audit::{PaymentAuditEvent, PaymentAuditLogger};
use crate::payments::error::PaymentError;
use crate::payments::gateway::GatewayClient;
use crate::payments::order::{Order, OrderStatus};
use crate::payments::store::PaymentStore;
use crate::payments::unix_now;
use crate::tier::{TierLevel, amount_for_tier, balance_due};

/// Request to create a settlement order.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    /// The buyer.
    pub user_id: String,
    /// The course to buy into.
    pub course_id: String,
    /// The domain the course belongs to.
    pub domain_id: String,
    /// Requested tier, as a percentage.
    pub tier_percent: u8,
}

/// Creates and tracks payment orders.
pub struct OrderLedger {
    store: Arc<dyn PaymentStore>,
    catalog: Arc<dyn CatalogStore>,
    gateway: Arc<dyn GatewayClient>,
    audit: Arc<dyn PaymentAuditLogger>,
}

impl OrderLedger {
    /// Create a new ledger over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn PaymentStore>,
        catalog: Arc<dyn CatalogStore>,
        gateway: Arc<dyn GatewayClient>,
        audit: Arc<dyn PaymentAuditLogger>,
    ) -> Self {
        Self {
            store,
            catalog,
            gateway,
            audit,
        }
    }

    /// Create an order for a settlement attempt.
    ///
    /// Validates the tier, rejects purchases that do not improve on the
    /// buyer's current entitlement, and charges an upgrader only the
    /// difference between the target tier amount and what was already
    /// paid. The course price is snapshotted into the order.
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        let tier = TierLevel::from_percent(request.tier_percent)?;

        let course = self
            .catalog
            .get_course(&request.course_id)
            .await?
            .ok_or_else(|| PaymentError::CourseNotFound {
                course_id: request.course_id.clone(),
            })?;

        let existing = self
            .store
            .get_entitlement(&request.user_id, &request.course_id)
            .await?;

        let amount_due = match &existing {
            Some(entitlement) => {
                if entitlement.highest_tier >= tier {
                    return Err(PaymentError::TierNotAnUpgrade {
                        current: entitlement.highest_tier.as_percent(),
                        requested: tier.as_percent(),
                    }
                    .into());
                }
                let target = amount_for_tier(course.price, tier);
                let remaining = balance_due(course.price, entitlement.total_paid)?;
                let due = target.saturating_sub(entitlement.total_paid);
                if due > remaining {
                    return Err(PaymentError::InsufficientBalance {
                        requested: due,
                        remaining,
                    }
                    .into());
                }
                due
            }
            None => amount_for_tier(course.price, tier),
        };

        let now = unix_now();
        let order_id = Order::new_id();
        let gateway_ref = self
            .gateway
            .create_gateway_order(amount_due, &order_id)
            .await?;

        let order = Order {
            id: order_id,
            user_id: request.user_id,
            course_id: request.course_id,
            domain_id: request.domain_id,
            tier,
            amount_due,
            status: OrderStatus::Created,
            gateway_ref,
            gateway_payment_id: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_order(order.clone()).await?;

        self.audit
            .log(PaymentAuditEvent::OrderCreated {
                order_id: order.id.clone(),
                user_id: order.user_id.clone(),
                course_id: order.course_id.clone(),
                tier_percent: tier.as_percent(),
                amount_due,
            })
            .await;

        Ok(order)
    }

    /// Record that the client has been redirected to the gateway.
    ///
    /// Transitions Created -> AwaitingCallback; any other current
    /// status is an error.
    pub async fn mark_awaiting_callback(&self, order_id: &str) -> Result<Order> {
        let order = self
            .store
            .transition_order(
                order_id,
                OrderStatus::Created,
                OrderStatus::AwaitingCallback,
                unix_now(),
            )
            .await?;
        Ok(order)
    }

    /// Expire a single pending order.
    ///
    /// The status is re-checked by the store's compare-and-set, so a
    /// callback racing this call resolves to exactly one winner.
    pub async fn expire(&self, order_id: &str) -> Result<Order> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| PaymentError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        if order.is_terminal() {
            return Err(PaymentError::AlreadyTerminal {
                order_id: order.id,
                status: order.status.as_str().to_string(),
            }
            .into());
        }

        let expired = self
            .store
            .transition_order(order_id, order.status, OrderStatus::Expired, unix_now())
            .await?;

        self.audit
            .log(PaymentAuditEvent::OrderExpired {
                order_id: expired.id.clone(),
            })
            .await;

        Ok(expired)
    }

    /// Expire every pending order older than the configured timeout.
    ///
    /// Called periodically by [`ExpirySweeper`]; usable directly from
    /// tests and one-off maintenance.
    pub async fn sweep_expired(&self, config: &OrdersConfig) -> Result<Vec<Order>> {
        let now = unix_now();
        let cutoff = now.saturating_sub(config.expiry_minutes * 60);
        let expired = self.store.expire_stale(cutoff, now).await?;

        for order in &expired {
            self.audit
                .log(PaymentAuditEvent::OrderExpired {
                    order_id: order.id.clone(),
                })
                .await;
        }

        if !expired.is_empty() {
            tracing::info!(
                target: "payments::ledger",
                count = expired.len(),
                "Expired stale orders"
            );
        }

        Ok(expired)
    }
}

/// Background task expiring orders whose callback never arrived.
///
/// # Shutdown
///
/// Call `shutdown()` before dropping to cleanly stop the task.
pub struct ExpirySweeper {
    shutdown: Arc<AtomicBool>,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ExpirySweeper {
    /// Start the sweep loop on the current Tokio runtime.
    #[must_use]
    pub fn start(ledger: Arc<OrderLedger>, config: OrdersConfig) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(
                config.sweep_interval_secs.max(1),
            ));

            loop {
                if shutdown_flag.load(Ordering::Acquire) {
                    tracing::debug!("Order expiry sweeper shutting down");
                    break;
                }

                interval.tick().await;

                if shutdown_flag.load(Ordering::Acquire) {
                    break;
                }

                if let Err(error) = ledger.sweep_expired(&config).await {
                    tracing::error!(
                        target: "payments::ledger",
                        error = %error,
                        "Expiry sweep failed"
                    );
                }
            }
        });

        Self {
            shutdown,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Gracefully stop the sweep loop.
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);

        let mut guard = self.handle.lock().await;
        if let Some(handle) = guard.take() {
            // The task may be parked in a long interval tick; abort
            // rather than wait out the tick.
            handle.abort();
            let _ = handle.await;
            tracing::debug!("Order expiry sweeper stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Course, InMemoryCatalogStore};
    use crate::payments::audit::test::TestAuditLogger;
    use crate::payments::gateway::MockGatewayClient;
    use crate::payments::store::InMemoryPaymentStore;

    struct Fixture {
        ledger: OrderLedger,
        store: Arc<InMemoryPaymentStore>,
        audit: TestAuditLogger,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryPaymentStore::new());
        let catalog = Arc::new(InMemoryCatalogStore::new());
        catalog
            .seed_course(Course {
                id: "course_1".to_string(),
                domain_id: "domain_1".to_string(),
                title: "Rust Fundamentals".to_string(),
                price: 1000,
            })
            .await;
        let audit = TestAuditLogger::new();
        let ledger = OrderLedger::new(
            store.clone(),
            catalog,
            Arc::new(MockGatewayClient::new()),
            Arc::new(audit.clone()),
        );
        Fixture {
            ledger,
            store,
            audit,
        }
    }

    fn request(tier_percent: u8) -> CreateOrderRequest {
        CreateOrderRequest {
            user_id: "user_1".to_string(),
            course_id: "course_1".to_string(),
            domain_id: "domain_1".to_string(),
            tier_percent,
        }
    }

    #[tokio::test]
    async fn test_create_order_thirty_percent() {
        let f = fixture().await;
        let order = f.ledger.create_order(request(30)).await.unwrap();

        assert_eq!(order.amount_due, 300);
        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(order.tier, TierLevel::Thirty);
        assert!(order.gateway_ref.starts_with("gw_"));

        let events = f.audit.events().await;
        assert!(matches!(
            events[0],
            PaymentAuditEvent::OrderCreated { amount_due: 300, .. }
        ));
    }

    #[tokio::test]
    async fn test_create_order_rejects_invalid_tier() {
        let f = fixture().await;
        let err = f.ledger.create_order(request(40)).await.unwrap_err();
        assert!(err.to_string().contains("not a supported payment tier"));
    }

    #[tokio::test]
    async fn test_create_order_rejects_unknown_course() {
        let f = fixture().await;
        let mut req = request(30);
        req.course_id = "missing".to_string();
        let err = f.ledger.create_order(req).await.unwrap_err();
        assert!(err.to_string().contains("Course not found"));
    }

    #[tokio::test]
    async fn test_create_order_rejects_redundant_purchase() {
        let f = fixture().await;
        let order = f.ledger.create_order(request(50)).await.unwrap();
        f.store
            .settle_success(&order.id, "pay_1", unix_now())
            .await
            .unwrap();

        // Same tier again
        let err = f.ledger.create_order(request(50)).await.unwrap_err();
        assert!(err.to_string().contains("does not upgrade"));

        // Downgrade
        let err = f.ledger.create_order(request(30)).await.unwrap_err();
        assert!(err.to_string().contains("does not upgrade"));
    }

    #[tokio::test]
    async fn test_balance_order_charges_only_remainder() {
        let f = fixture().await;
        let first = f.ledger.create_order(request(30)).await.unwrap();
        f.store
            .settle_success(&first.id, "pay_1", unix_now())
            .await
            .unwrap();

        let balance = f.ledger.create_order(request(100)).await.unwrap();
        assert_eq!(balance.amount_due, 700);
        assert_eq!(balance.tier, TierLevel::Full);
    }

    #[tokio::test]
    async fn test_mark_awaiting_callback() {
        let f = fixture().await;
        let order = f.ledger.create_order(request(30)).await.unwrap();

        let updated = f.ledger.mark_awaiting_callback(&order.id).await.unwrap();
        assert_eq!(updated.status, OrderStatus::AwaitingCallback);

        // Repeating is an error: the order has left Created
        assert!(f.ledger.mark_awaiting_callback(&order.id).await.is_err());
    }

    #[tokio::test]
    async fn test_expire_pending_order() {
        let f = fixture().await;
        let order = f.ledger.create_order(request(30)).await.unwrap();
        f.ledger.mark_awaiting_callback(&order.id).await.unwrap();

        let expired = f.ledger.expire(&order.id).await.unwrap();
        assert_eq!(expired.status, OrderStatus::Expired);

        // Terminal: cannot be expired again
        assert!(f.ledger.expire(&order.id).await.is_err());

        let events = f.audit.events().await;
        assert!(events
            .iter()
            .any(|e| matches!(e, PaymentAuditEvent::OrderExpired { order_id } if *order_id == order.id)));
    }

    #[tokio::test]
    async fn test_expired_order_never_settles() {
        let f = fixture().await;
        let order = f.ledger.create_order(request(30)).await.unwrap();
        f.ledger.expire(&order.id).await.unwrap();

        let err = f
            .store
            .settle_success(&order.id, "pay_1", unix_now())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::AlreadyTerminal { ref status, .. } if status == "expired"));
        assert!(f
            .store
            .get_entitlement("user_1", "course_1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_sweep_expires_only_stale_orders() {
        let f = fixture().await;
        let order = f.ledger.create_order(request(30)).await.unwrap();
        f.ledger.mark_awaiting_callback(&order.id).await.unwrap();

        // Nothing is older than the timeout yet
        let config = OrdersConfig {
            expiry_minutes: 30,
            sweep_interval_secs: 60,
        };
        assert!(f.ledger.sweep_expired(&config).await.unwrap().is_empty());

        // With a zero-minute window the pending order goes stale at once
        let config = OrdersConfig {
            expiry_minutes: 0,
            sweep_interval_secs: 60,
        };
        let expired = f.ledger.sweep_expired(&config).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, order.id);
    }

    #[tokio::test]
    async fn test_sweeper_shutdown() {
        let f = fixture().await;
        let ledger = Arc::new(f.ledger);
        let sweeper = ExpirySweeper::start(
            ledger,
            OrdersConfig {
                expiry_minutes: 30,
                sweep_interval_secs: 1,
            },
        );
        sweeper.shutdown().await;
    }
}
