use super::*;
use crate::db::Table;
use crate::email::Template;
use crate::stripe::IntentStatus;
use crate::testing::FlakyStore;
use shared::models::{ActivityAction, EntityType, OrderStatus, PaymentStatus};

#[tokio::test]
async fn test_happy_path() {
    let h = harness();
    h.seed("p1", 10.0, Some(5)).await;

    let resp = h
        .service
        .create_order(&customer("u1"), cart(&[("p1", 10.0, 2)]))
        .await
        .unwrap();

    assert_eq!(resp.order.status, OrderStatus::Pending);
    assert_eq!(resp.order.quantity, 2);
    assert_eq!(resp.order.amount_paid, 20.0);
    assert_eq!(resp.order.user.email, "u1@codebook.dev");
    assert!(resp.stock_restores.is_empty());
    assert_eq!(h.stock_of("p1").await, Some(3));

    assert_eq!(h.mailer.count(Template::OrderConfirmation), 1);
    assert_eq!(h.mailer.count(Template::AdminNewOrder), 1);

    let audit = h.audit_entries().await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, ActivityAction::Create);
    assert_eq!(audit[0].entity_type, EntityType::Order);
    assert_eq!(audit[0].entity_id, resp.order.id);

    let stored = h.stored(&resp.order.id).await;
    assert_eq!(stored, resp.order);
}

#[tokio::test]
async fn test_insufficient_stock_rolls_back() {
    let h = harness();
    h.seed("p1", 10.0, Some(5)).await;
    h.seed("p2", 10.0, Some(1)).await;

    let err = h
        .service
        .create_order(&customer("u1"), cart(&[("p1", 10.0, 1), ("p2", 10.0, 2)]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrderError::Stock(crate::services::StockError::Insufficient { ref product_id }) if product_id == "p2"
    ));
    assert_eq!(h.stock_of("p1").await, Some(5));
    assert_eq!(h.stock_of("p2").await, Some(1));
    assert!(h.orders().await.is_empty());
    assert!(h.audit_entries().await.is_empty());
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_last_copy_triggers_out_of_stock() {
    let h = harness();
    h.seed("p1", 10.0, Some(1)).await;

    h.service
        .create_order(&customer("u1"), cart(&[("p1", 10.0, 1)]))
        .await
        .unwrap();

    assert_eq!(h.stock_of("p1").await, Some(0));
    assert_eq!(h.mailer.count(Template::AdminOutOfStock), 1);
}

#[tokio::test]
async fn test_same_intent_returns_same_order() {
    let h = build(
        Arc::new(MemoryStore::new()),
        ScriptedGateway::new().with_intent("pi_1", IntentStatus::Succeeded, 2000),
        false,
    );
    let first = h.place_paid_order("pi_1").await;
    assert_eq!(first.payment_status, Some(PaymentStatus::Succeeded));

    let mut again = cart(&[("p1", 10.0, 2)]);
    again.payment_intent_id = Some("pi_1".into());
    let second = h
        .service
        .create_order(&customer("u1"), again)
        .await
        .unwrap();

    assert_eq!(second.order.id, first.id);
    assert_eq!(h.orders().await.len(), 1);
    assert_eq!(h.stock_of("p1").await, Some(3));
}

#[tokio::test]
async fn test_unverifiable_intent_is_best_effort() {
    let h = harness();
    let order = h.place_paid_order("pi_unknown").await;
    assert_eq!(order.payment_intent_id.as_deref(), Some("pi_unknown"));
    assert_eq!(order.payment_status, None);
}

#[tokio::test]
async fn test_paid_policy_rejects_unpaid_intent() {
    let h = build(
        Arc::new(MemoryStore::new()),
        ScriptedGateway::new().with_intent("pi_1", IntentStatus::RequiresPaymentMethod, 2000),
        true,
    );
    h.seed("p1", 10.0, Some(5)).await;

    let mut req = cart(&[("p1", 10.0, 2)]);
    req.payment_intent_id = Some("pi_1".into());
    let err = h
        .service
        .create_order(&customer("u1"), req)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::PaymentNotSucceeded { .. }));

    let missing = h
        .service
        .create_order(&customer("u1"), cart(&[("p1", 10.0, 2)]))
        .await
        .unwrap_err();
    assert!(matches!(missing, OrderError::NoPaymentIntent(_)));
    assert_eq!(h.stock_of("p1").await, Some(5));
}

#[tokio::test]
async fn test_write_failure_releases_stock() {
    let store = Arc::new(FlakyStore::new());
    let h = build(store.clone(), ScriptedGateway::new(), false);
    h.seed("p1", 10.0, Some(5)).await;
    store.fail_writes_to(Table::Orders);

    let mut req = cart(&[("p1", 10.0, 2)]);
    req.payment_intent_id = Some("pi_9".into());
    let err = h
        .service
        .create_order(&customer("u1"), req)
        .await
        .unwrap_err();

    match err {
        OrderError::PersistFailed {
            payment_intent_id, ..
        } => assert_eq!(payment_intent_id.as_deref(), Some("pi_9")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.stock_of("p1").await, Some(5));
    assert!(h.mailer.count(Template::OrderConfirmation) == 0);
}

#[tokio::test]
async fn test_order_for_someone_else_is_rejected() {
    let h = harness();
    h.seed("p1", 10.0, Some(5)).await;

    let mut req = cart(&[("p1", 10.0, 1)]);
    req.user = Some(DeclaredUser {
        id: Some("u2".into()),
    });
    let err = h
        .service
        .create_order(&customer("u1"), req)
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::IdentityMismatch));
    assert_eq!(h.stock_of("p1").await, Some(5));
}

#[tokio::test]
async fn test_untracked_and_unknown_products() {
    let h = harness();
    h.seed("ebook", 5.0, None).await;

    let ok = h
        .service
        .create_order(&customer("u1"), cart(&[("ebook", 5.0, 3)]))
        .await
        .unwrap();
    assert_eq!(ok.order.quantity, 3);
    assert_eq!(h.stock_of("ebook").await, None);

    let err = h
        .service
        .create_order(&customer("u1"), cart(&[("ghost", 5.0, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::Stock(crate::services::StockError::ProductNotFound(_))
    ));
}
