//! Redelivered and concurrent provider callbacks apply exactly once

mod common;

use common::{FakePos, FakeStripe, Harness, card_cart, payment_succeeded_event, restaurant, seed};
use rust_decimal::Decimal;
use settle_cloud::db::Store;
use settle_cloud::reconcile::{ReconcileOutcome, parse_paytabs_callback, parse_stripe_event};
use settle_cloud::settlement::SettleRequest;
use shared::order::PaymentStatus;

async fn settled_order(h: &Harness) -> (String, String) {
    seed(h.store.as_ref(), &restaurant("r1", "DE", "EUR"), Decimal::new(1250, 2)).await;
    let order = h.state.orders.create_order("r1", card_cart("r1", 2)).await.unwrap();
    let resp = h
        .state
        .settlement
        .settle(&order.id, &SettleRequest::default())
        .await
        .unwrap();
    (order.id, resp.payment_intent_id)
}

#[tokio::test]
async fn test_redelivered_event_is_duplicate() {
    let h = Harness::new(FakeStripe::new(), FakePos::new());
    let (order_id, intent_id) = settled_order(&h).await;

    let body = payment_succeeded_event("evt_1", &intent_id, &order_id, 2500);
    let event = parse_stripe_event(&body).unwrap();

    let first = h.state.reconciler.handle("stripe", &event).await.unwrap();
    assert_eq!(first, ReconcileOutcome::Applied);
    let second = h.state.reconciler.handle("stripe", &event).await.unwrap();
    assert_eq!(second, ReconcileOutcome::Duplicate);

    let order = h.store.order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert!(order.timestamps.paid_at.is_some());
    assert_eq!(h.store.payments_for_order(&order_id).await.unwrap().len(), 1);
    assert!(h.store.invoice_for_order(&order_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_distinct_events_for_same_payment_apply_once() {
    let h = Harness::new(FakeStripe::new(), FakePos::new());
    let (order_id, intent_id) = settled_order(&h).await;

    // payment_intent.succeeded and checkout.session.completed racing each other
    let a = parse_stripe_event(&payment_succeeded_event("evt_a", &intent_id, &order_id, 2500)).unwrap();
    let b = parse_stripe_event(
        serde_json::json!({
            "id": "evt_b",
            "type": "checkout.session.completed",
            "data": { "object": {
                "mode": "payment",
                "payment_intent": intent_id,
                "amount_total": 2500,
                "currency": "eur",
                "metadata": { "orderId": order_id }
            }}
        })
        .to_string()
        .as_bytes(),
    )
    .unwrap();

    let (ra, rb) = tokio::join!(
        h.state.reconciler.handle("stripe", &a),
        h.state.reconciler.handle("stripe", &b)
    );
    let mut outcomes = vec![ra.unwrap(), rb.unwrap()];
    outcomes.sort_by_key(|o| format!("{o:?}"));
    assert_eq!(
        outcomes,
        vec![ReconcileOutcome::AlreadyApplied, ReconcileOutcome::Applied]
    );

    assert_eq!(h.store.payments_for_order(&order_id).await.unwrap().len(), 1);
    assert!(h.store.invoice_for_order(&order_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_order_number_reference_resolves_within_restaurant() {
    let h = Harness::new(FakeStripe::new(), FakePos::new());
    let (order_id, _) = settled_order(&h).await;
    let order = h.store.order(&order_id).await.unwrap().unwrap();

    // Payment link flow: metadata carries the human order number and restaurant
    let body = serde_json::json!({
        "id": "evt_link",
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": "pi_from_link",
            "amount_received": 2500,
            "currency": "eur",
            "metadata": { "orderId": order.order_number, "restaurantId": "r1" }
        }}
    })
    .to_string();
    let event = parse_stripe_event(body.as_bytes()).unwrap();
    let outcome = h.state.reconciler.handle("stripe", &event).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);
    assert_eq!(
        h.store.order(&order_id).await.unwrap().unwrap().payment_status,
        PaymentStatus::Paid
    );
}

#[tokio::test]
async fn test_unknown_order_is_ignored_and_recorded() {
    let h = Harness::new(FakeStripe::new(), FakePos::new());
    let event = parse_stripe_event(&payment_succeeded_event("evt_x", "pi_nope", "missing", 100)).unwrap();

    let outcome = h.state.reconciler.handle("stripe", &event).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Ignored);
    assert!(h.store.is_event_processed("evt_x").await.unwrap());
}

#[tokio::test]
async fn test_full_refund_after_payment() {
    let h = Harness::new(FakeStripe::new(), FakePos::new());
    let (order_id, intent_id) = settled_order(&h).await;
    let paid = parse_stripe_event(&payment_succeeded_event("evt_1", &intent_id, &order_id, 2500)).unwrap();
    h.state.reconciler.handle("stripe", &paid).await.unwrap();

    let refund = |id: &str, full: bool| {
        serde_json::json!({
            "id": id,
            "type": "charge.refunded",
            "data": { "object": { "payment_intent": intent_id, "refunded": full } }
        })
        .to_string()
    };
    let partial = parse_stripe_event(refund("evt_r1", false).as_bytes()).unwrap();
    assert_eq!(
        h.state.reconciler.handle("stripe", &partial).await.unwrap(),
        ReconcileOutcome::Ignored
    );
    assert_eq!(
        h.store.order(&order_id).await.unwrap().unwrap().payment_status,
        PaymentStatus::Paid
    );

    let full = parse_stripe_event(refund("evt_r2", true).as_bytes()).unwrap();
    assert_eq!(
        h.state.reconciler.handle("stripe", &full).await.unwrap(),
        ReconcileOutcome::Applied
    );
    assert_eq!(
        h.store.order(&order_id).await.unwrap().unwrap().payment_status,
        PaymentStatus::Refunded
    );

    // A late success redelivery with a new id must not resurrect PAID
    let late = parse_stripe_event(&payment_succeeded_event("evt_late", &intent_id, &order_id, 2500)).unwrap();
    h.state.reconciler.handle("stripe", &late).await.unwrap();
    assert_eq!(
        h.store.order(&order_id).await.unwrap().unwrap().payment_status,
        PaymentStatus::Refunded
    );
}

#[tokio::test]
async fn test_paytabs_callback_marks_paid_once() {
    let h = Harness::new(FakeStripe::new(), FakePos::new());
    seed(h.store.as_ref(), &restaurant("r1", "SA", "SAR"), Decimal::new(4000, 2)).await;
    let order = h.state.orders.create_order("r1", card_cart("r1", 1)).await.unwrap();

    let body = serde_json::json!({
        "tran_ref": "TST2024",
        "cart_id": order.id,
        "cart_currency": "SAR",
        "cart_amount": "40.00",
        "payment_result": { "response_status": "A" }
    })
    .to_string();
    let event = parse_paytabs_callback(body.as_bytes()).unwrap();
    assert_eq!(event.id, "paytabs:TST2024:A");

    assert_eq!(
        h.state.reconciler.handle("paytabs", &event).await.unwrap(),
        ReconcileOutcome::Applied
    );
    assert_eq!(
        h.state.reconciler.handle("paytabs", &event).await.unwrap(),
        ReconcileOutcome::Duplicate
    );

    let payments = h.store.payments_for_order(&order.id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].provider, "paytabs");
    assert_eq!(payments[0].provider_reference, "TST2024");
}
