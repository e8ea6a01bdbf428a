//! Storage traits for orders and entitlements.
//!
//! Implement [`PaymentStore`] to persist settlement state to your
//! database. The trait is deliberately shaped so that the two-sided
//! writes (order status + entitlement) are single store operations:
//! a backend maps each of them onto one transaction, and the provided
//! in-memory implementation runs each under one lock acquisition.
//! Entitlements therefore can never be observed out of step with the
//! order that credited them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::payments::entitlement::Entitlement;
use crate::payments::error::PaymentError;
use crate::payments::order::{Order, OrderStatus};

/// An order settled together with the entitlement it credited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// The order, now `Verified`.
    pub order: Order,
    /// The entitlement after absorbing the order.
    pub entitlement: Entitlement,
}

/// Trait for storing orders and entitlements.
///
/// # Atomicity
///
/// `settle_success`, `mark_failed`, `transition_order`, and
/// `expire_stale` must each run as one transaction (or equivalent
/// critical section) that re-checks the order status before writing.
/// Production implementations should use a database transaction with
/// `SELECT ... FOR UPDATE` semantics; the in-memory implementation
/// serializes all mutations behind a single lock.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persist a freshly created order.
    ///
    /// Fails with `InvalidState` if the ID is already taken.
    async fn insert_order(&self, order: Order) -> Result<(), PaymentError>;

    /// Get an order by ID.
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, PaymentError>;

    /// Compare-and-set status transition.
    ///
    /// Applies `from -> to` only if the order is currently in `from`,
    /// and returns the updated order. Fails with `AlreadyTerminal` if
    /// the order has already settled, `InvalidState` on any other
    /// mismatch.
    async fn transition_order(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
        now: u64,
    ) -> Result<Order, PaymentError>;

    /// Atomically verify an order and credit its entitlement.
    ///
    /// In one critical section: re-checks the order is still pending,
    /// transitions it to `Verified` with the gateway payment ID, and
    /// upserts the (user, course) entitlement by absorbing the order.
    /// Fails with `AlreadyTerminal` if another delivery won the race.
    async fn settle_success(
        &self,
        order_id: &str,
        gateway_payment_id: &str,
        now: u64,
    ) -> Result<Settlement, PaymentError>;

    /// Transition a pending order to `Failed`. No entitlement mutation.
    async fn mark_failed(
        &self,
        order_id: &str,
        gateway_payment_id: Option<&str>,
        now: u64,
    ) -> Result<Order, PaymentError>;

    /// Get the entitlement for a (user, course) pair.
    async fn get_entitlement(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<Entitlement>, PaymentError>;

    /// Expire every pending order created at or before `cutoff`.
    ///
    /// The status re-check happens inside the same critical section as
    /// the write, so a callback racing the sweep resolves to exactly
    /// one winner. Returns the orders that were expired.
    async fn expire_stale(&self, cutoff: u64, now: u64) -> Result<Vec<Order>, PaymentError>;

    /// All orders for a (user, course) pair, oldest first.
    async fn list_orders(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Vec<Order>, PaymentError>;

    /// Recompute the entitlement as a fold over verified orders.
    ///
    /// The stored row must always equal this fold; reconciliation jobs
    /// can use it to audit or repair a backend after a crash.
    async fn rebuild_entitlement(
        &self,
        user_id: &str,
        course_id: &str,
        now: u64,
    ) -> Result<Option<Entitlement>, PaymentError> {
        let orders = self.list_orders(user_id, course_id).await?;
        Ok(Entitlement::fold_verified(&orders, now))
    }
}

/// In-memory payment store for development and testing.
///
/// All mutations serialize behind one lock, which makes every trait
/// operation a single critical section and gives the single-writer-
/// per-key discipline for free. In production, use a database-backed
/// implementation instead.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    inner: Arc<Mutex<InMemoryPaymentInner>>,
}

#[derive(Default)]
struct InMemoryPaymentInner {
    orders: HashMap<String, Order>,
    entitlements: HashMap<(String, String), Entitlement>,
}

impl InMemoryPaymentStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored orders (for testing).
    pub async fn all_orders(&self) -> Vec<Order> {
        self.inner.lock().await.orders.values().cloned().collect()
    }
}

fn pending_or_err(order: &Order) -> Result<(), PaymentError> {
    if order.is_terminal() {
        return Err(PaymentError::AlreadyTerminal {
            order_id: order.id.clone(),
            status: order.status.as_str().to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert_order(&self, order: Order) -> Result<(), PaymentError> {
        let mut inner = self.inner.lock().await;
        if inner.orders.contains_key(&order.id) {
            return Err(PaymentError::InvalidState {
                message: format!("order {} already exists", order.id),
            });
        }
        inner.orders.insert(order.id.clone(), order);
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, PaymentError> {
        Ok(self.inner.lock().await.orders.get(order_id).cloned())
    }

    async fn transition_order(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
        now: u64,
    ) -> Result<Order, PaymentError> {
        let mut inner = self.inner.lock().await;
        let order = inner
            .orders
            .get_mut(order_id)
            .ok_or_else(|| PaymentError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        if order.status != from {
            pending_or_err(order)?;
            return Err(PaymentError::InvalidState {
                message: format!(
                    "order {} is {}, expected {}",
                    order_id, order.status, from
                ),
            });
        }

        order.status = to;
        order.updated_at = now;
        Ok(order.clone())
    }

    async fn settle_success(
        &self,
        order_id: &str,
        gateway_payment_id: &str,
        now: u64,
    ) -> Result<Settlement, PaymentError> {
        let mut inner = self.inner.lock().await;

        let order = inner
            .orders
            .get_mut(order_id)
            .ok_or_else(|| PaymentError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        pending_or_err(order)?;

        order.status = OrderStatus::Verified;
        order.gateway_payment_id = Some(gateway_payment_id.to_string());
        order.updated_at = now;
        let order = order.clone();

        let key = (order.user_id.clone(), order.course_id.clone());
        let entitlement = match inner.entitlements.get_mut(&key) {
            Some(existing) => {
                existing.absorb(&order, now);
                existing.clone()
            }
            None => {
                let fresh = Entitlement::from_order(&order, now);
                inner.entitlements.insert(key, fresh.clone());
                fresh
            }
        };

        Ok(Settlement { order, entitlement })
    }

    async fn mark_failed(
        &self,
        order_id: &str,
        gateway_payment_id: Option<&str>,
        now: u64,
    ) -> Result<Order, PaymentError> {
        let mut inner = self.inner.lock().await;
        let order = inner
            .orders
            .get_mut(order_id)
            .ok_or_else(|| PaymentError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        pending_or_err(order)?;

        order.status = OrderStatus::Failed;
        if let Some(payment_id) = gateway_payment_id {
            order.gateway_payment_id = Some(payment_id.to_string());
        }
        order.updated_at = now;
        Ok(order.clone())
    }

    async fn get_entitlement(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<Entitlement>, PaymentError> {
        let key = (user_id.to_string(), course_id.to_string());
        Ok(self.inner.lock().await.entitlements.get(&key).cloned())
    }

    async fn expire_stale(&self, cutoff: u64, now: u64) -> Result<Vec<Order>, PaymentError> {
        let mut inner = self.inner.lock().await;
        let mut expired = Vec::new();
        for order in inner.orders.values_mut() {
            if !order.is_terminal() && order.created_at <= cutoff {
                order.status = OrderStatus::Expired;
                order.updated_at = now;
                expired.push(order.clone());
            }
        }
        Ok(expired)
    }

    async fn list_orders(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Vec<Order>, PaymentError> {
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.user_id == user_id && o.course_id == course_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }
}
