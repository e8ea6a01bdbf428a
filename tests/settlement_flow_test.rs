//! End-to-end settlement flows exercised through the public API,
//! without the HTTP layer.

use std::sync::Arc;

use coursegate::payments::NoOpAuditLogger;
use coursegate::{
    AccessTag, AppContext, CallbackOutcome, CallbackReconciler, Course, CreateOrderRequest,
    GatewayCallback, InMemoryCatalogStore, InMemoryPaymentStore, MockGatewayClient, OrderLedger,
    OrderStatus, OrdersConfig, PaymentStore, SignatureVerifier, TierLevel,
};

const SECRET: &str = "integration-test-secret";

struct Harness {
    ledger: Arc<OrderLedger>,
    reconciler: CallbackReconciler,
    store: Arc<InMemoryPaymentStore>,
}

async fn harness(price: u64) -> Harness {
    let store = Arc::new(InMemoryPaymentStore::new());
    let catalog = Arc::new(InMemoryCatalogStore::new());
    catalog
        .seed_course(Course {
            id: "course_1".to_string(),
            domain_id: "domain_1".to_string(),
            title: "Rust Fundamentals".to_string(),
            price,
        })
        .await;

    let ledger = Arc::new(OrderLedger::new(
        store.clone(),
        catalog,
        Arc::new(MockGatewayClient::new()),
        Arc::new(NoOpAuditLogger),
    ));
    let reconciler = CallbackReconciler::new(
        store.clone(),
        SignatureVerifier::new(SECRET.to_string()),
        Arc::new(NoOpAuditLogger),
    );

    Harness {
        ledger,
        reconciler,
        store,
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

fn success_callback(order_id: &str, payment_id: &str, amount: u64) -> GatewayCallback {
    GatewayCallback {
        order_id: order_id.to_string(),
        gateway_payment_id: payment_id.to_string(),
        signature: SignatureVerifier::new(SECRET.to_string()).sign(order_id, payment_id, amount),
        outcome: CallbackOutcome::Success,
    }
}

#[tokio::test]
async fn partial_then_balance_payment_reaches_full_access() {
    let h = harness(1000).await;

    // 30% tier: 300 due, unlocks the first four items
    let order = h.ledger.create_order(request(30)).await.unwrap();
    assert_eq!(order.amount_due, 300);
    h.ledger.mark_awaiting_callback(&order.id).await.unwrap();

    let result = h
        .reconciler
        .handle_callback(success_callback(&order.id, "pay_1", 300))
        .await
        .unwrap();
    assert!(result.verified);
    assert_eq!(result.tier, Some(TierLevel::Thirty));
    assert_eq!(result.access_tag, Some(AccessTag::FirstFour));
    assert_eq!(result.total_paid, 300);

    // Balance order to the full price charges exactly the remainder
    let balance = h.ledger.create_order(request(100)).await.unwrap();
    assert_eq!(balance.amount_due, 700);
    h.ledger.mark_awaiting_callback(&balance.id).await.unwrap();

    let result = h
        .reconciler
        .handle_callback(success_callback(&balance.id, "pay_2", 700))
        .await
        .unwrap();
    assert!(result.verified);
    assert_eq!(result.tier, Some(TierLevel::Full));
    assert_eq!(result.access_tag, Some(AccessTag::All));
    assert_eq!(result.total_paid, 1000);
}

#[tokio::test]
async fn duplicate_success_callback_is_idempotent() {
    let h = harness(1000).await;

    let order = h.ledger.create_order(request(30)).await.unwrap();
    h.ledger.mark_awaiting_callback(&order.id).await.unwrap();

    let callback = success_callback(&order.id, "pay_1", 300);
    let first = h.reconciler.handle_callback(callback.clone()).await.unwrap();
    let second = h.reconciler.handle_callback(callback).await.unwrap();

    assert!(first.verified && second.verified);
    assert_eq!(first.total_paid, 300);
    assert_eq!(second.total_paid, 300);

    let entitlement = h
        .store
        .get_entitlement("user_1", "course_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entitlement.total_paid, 300);
}

#[tokio::test]
async fn tampered_callback_is_rejected_before_any_mutation() {
    let h = harness(1000).await;

    let order = h.ledger.create_order(request(50)).await.unwrap();
    h.ledger.mark_awaiting_callback(&order.id).await.unwrap();

    let mut callback = success_callback(&order.id, "pay_1", 500);
    callback.signature = "ff".repeat(32);
    let err = h.reconciler.handle_callback(callback).await.unwrap_err();
    assert!(err.to_string().contains("Invalid gateway signature"));

    // The order is still waiting and nothing was credited
    let stored = h.store.get_order(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::AwaitingCallback);
    assert!(h
        .store
        .get_entitlement("user_1", "course_1")
        .await
        .unwrap()
        .is_none());

    // The untampered callback still settles afterwards
    let result = h
        .reconciler
        .handle_callback(success_callback(&order.id, "pay_1", 500))
        .await
        .unwrap();
    assert!(result.verified);
    assert_eq!(result.access_tag, Some(AccessTag::FirstEight));
}

#[tokio::test]
async fn failure_callback_settles_without_credit_and_allows_retry() {
    let h = harness(1000).await;

    let order = h.ledger.create_order(request(30)).await.unwrap();
    h.ledger.mark_awaiting_callback(&order.id).await.unwrap();

    let mut callback = success_callback(&order.id, "pay_1", 300);
    callback.outcome = CallbackOutcome::Failure;
    let result = h.reconciler.handle_callback(callback).await.unwrap();
    assert!(!result.verified);

    assert!(h
        .store
        .get_entitlement("user_1", "course_1")
        .await
        .unwrap()
        .is_none());

    // Retry happens through a fresh order, never by reusing the failed one
    let retry = h.ledger.create_order(request(30)).await.unwrap();
    assert_ne!(retry.id, order.id);
    h.ledger.mark_awaiting_callback(&retry.id).await.unwrap();
    let result = h
        .reconciler
        .handle_callback(success_callback(&retry.id, "pay_2", 300))
        .await
        .unwrap();
    assert!(result.verified);
}

#[tokio::test]
async fn late_callback_after_expiry_sweep_is_rejected() {
    let h = harness(1000).await;

    let order = h.ledger.create_order(request(30)).await.unwrap();
    h.ledger.mark_awaiting_callback(&order.id).await.unwrap();

    // Zero-minute window: the sweep expires the pending order at once
    let expired = h
        .ledger
        .sweep_expired(&OrdersConfig {
            expiry_minutes: 0,
            sweep_interval_secs: 60,
        })
        .await
        .unwrap();
    assert_eq!(expired.len(), 1);

    let err = h
        .reconciler
        .handle_callback(success_callback(&order.id, "pay_1", 300))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("expired"));

    assert!(h
        .store
        .get_entitlement("user_1", "course_1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn entitlement_is_rebuildable_from_verified_orders() {
    let h = harness(1000).await;

    let order = h.ledger.create_order(request(30)).await.unwrap();
    h.ledger.mark_awaiting_callback(&order.id).await.unwrap();
    h.reconciler
        .handle_callback(success_callback(&order.id, "pay_1", 300))
        .await
        .unwrap();

    let balance = h.ledger.create_order(request(100)).await.unwrap();
    h.ledger.mark_awaiting_callback(&balance.id).await.unwrap();
    h.reconciler
        .handle_callback(success_callback(&balance.id, "pay_2", 700))
        .await
        .unwrap();

    let stored = h
        .store
        .get_entitlement("user_1", "course_1")
        .await
        .unwrap()
        .unwrap();
    let rebuilt = h
        .store
        .rebuild_entitlement("user_1", "course_1", stored.updated_at)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(rebuilt.highest_tier, stored.highest_tier);
    assert_eq!(rebuilt.total_paid, stored.total_paid);
    assert_eq!(rebuilt.access_tag, stored.access_tag);
}

#[tokio::test]
async fn app_context_wires_the_same_flow() {
    let catalog = Arc::new(InMemoryCatalogStore::new());
    catalog
        .seed_course(Course {
            id: "course_1".to_string(),
            domain_id: "domain_1".to_string(),
            title: "Rust Fundamentals".to_string(),
            price: 400,
        })
        .await;

    let context = AppContext::builder()
        .with_catalog(catalog)
        .with_gateway_secret(SECRET.to_string())
        .build();

    let order = context.ledger.create_order(request(50)).await.unwrap();
    assert_eq!(order.amount_due, 200);
    context.ledger.mark_awaiting_callback(&order.id).await.unwrap();

    let result = context
        .reconciler
        .handle_callback(success_callback(&order.id, "pay_1", 200))
        .await
        .unwrap();
    assert!(result.verified);
    assert_eq!(result.access_tag, Some(AccessTag::FirstEight));
}
