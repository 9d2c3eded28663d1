//! POS adapter: menu reconciliation, order push and inbound events

mod common;

use common::{FakePos, FakeStripe, Harness, card_cart, restaurant, seed, with_pos};
use rust_decimal::Decimal;
use settle_cloud::db::Store;
use settle_cloud::pos::inbound::{PosEvent, PosEventOutcome, handle_event};
use settle_cloud::pos::push::push_order;
use settle_cloud::pos::sync_job::{SyncOutcome, run_menu_sync};
use settle_cloud::pos::{MenuSnapshot, PosCategory, PosMenuItem};
use shared::models::MISC_CATEGORY_NAME;
use shared::order::{OrderStatus, PosSyncStatus};

fn snapshot() -> MenuSnapshot {
    MenuSnapshot {
        success: true,
        categories: vec![PosCategory {
            external_id: "cat-1".into(),
            name: "Burgers".into(),
            sort_order: 1,
        }],
        items: vec![
            PosMenuItem {
                external_id: "burger-1".into(),
                name: "Burger".into(),
                category_external_id: Some("cat-1".into()),
                category_name: None,
                price: Decimal::new(1100, 2),
                available: true,
            },
            PosMenuItem {
                external_id: "fries-1".into(),
                name: "Fries".into(),
                category_external_id: Some("cat-unknown".into()),
                category_name: None,
                price: Decimal::new(350, 2),
                available: true,
            },
        ],
        errors: vec![],
    }
}

#[tokio::test]
async fn test_menu_sync_upserts_and_is_repeatable() {
    let h = Harness::new(FakeStripe::new(), FakePos::new().with_snapshot(snapshot()));
    seed(h.store.as_ref(), &with_pos(restaurant("r1", "DE", "EUR"), "square"), Decimal::TEN).await;
    seed(h.store.as_ref(), &restaurant("r2", "DE", "EUR"), Decimal::TEN).await;

    let report = run_menu_sync(h.store.as_ref(), &h.pos, 2).await.unwrap();
    assert_eq!((report.total, report.success, report.failed, report.skipped), (2, 1, 0, 1));
    let r1 = report.details.iter().find(|d| d.restaurant_id == "r1").unwrap();
    assert_eq!(r1.outcome, SyncOutcome::Success);
    let stats = r1.stats.unwrap();
    assert_eq!(stats.categories_updated, 1);
    assert_eq!(stats.categories_created, 1);
    assert_eq!(stats.items_updated, 1);
    assert_eq!(stats.items_created, 1);

    let items = h.store.menu_items("r1").await.unwrap();
    let burger = items.iter().find(|i| i.id == "r1-burger").unwrap();
    assert_eq!(burger.price, Decimal::new(1100, 2));
    let categories = h.store.menu_categories("r1").await.unwrap();
    let misc = categories.iter().find(|c| c.name == MISC_CATEGORY_NAME).unwrap();
    let fries = items.iter().find(|i| i.name == "Fries").unwrap();
    assert_eq!(fries.category_id, misc.id);

    // Second pass matches everything by external id
    let again = run_menu_sync(h.store.as_ref(), &h.pos, 2).await.unwrap();
    let stats = again.details.iter().find(|d| d.restaurant_id == "r1").unwrap().stats.unwrap();
    assert_eq!(stats.categories_created, 0);
    assert_eq!(stats.items_created, 0);
    assert_eq!(h.store.menu_items("r1").await.unwrap().len(), 2);
    assert_eq!(h.store.menu_categories("r1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_menu_sync_failure_is_reported_not_fatal() {
    // No snapshot configured: the fake POS menu endpoint errors
    let h = Harness::new(FakeStripe::new(), FakePos::new());
    seed(h.store.as_ref(), &with_pos(restaurant("r1", "DE", "EUR"), "toast"), Decimal::TEN).await;

    let report = run_menu_sync(h.store.as_ref(), &h.pos, 1).await.unwrap();
    assert_eq!((report.total, report.failed), (1, 1));
    assert!(!report.details[0].errors.is_empty());
}

#[tokio::test]
async fn test_order_push_records_pos_state() {
    let h = Harness::new(FakeStripe::new(), FakePos::new());
    seed(h.store.as_ref(), &with_pos(restaurant("r1", "DE", "EUR"), "square"), Decimal::TEN).await;
    let order = h.state.orders.create_order("r1", card_cart("r1", 1)).await.unwrap();
    assert_eq!(order.pos_sync_status, PosSyncStatus::Pending);

    let status = push_order(h.store.as_ref(), &h.pos, &order.id).await;
    assert_eq!(status, PosSyncStatus::Synced);
    let stored = h.store.order(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.pos_sync_status, PosSyncStatus::Synced);
    assert!(stored.pos_order_id.is_some());
    assert!(h.pos.sent().iter().any(|o| o.order_id == order.id));
}

#[tokio::test]
async fn test_pos_failure_never_blocks_order() {
    let h = Harness::new(FakeStripe::new(), FakePos::new().failing_send());
    seed(h.store.as_ref(), &with_pos(restaurant("r1", "DE", "EUR"), "square"), Decimal::TEN).await;

    let order = h.state.orders.create_order("r1", card_cart("r1", 1)).await.unwrap();
    let status = push_order(h.store.as_ref(), &h.pos, &order.id).await;
    assert_eq!(status, PosSyncStatus::Failed);

    let stored = h.store.order(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.pos_sync_status, PosSyncStatus::Failed);
}

#[tokio::test]
async fn test_orders_without_pos_are_disabled() {
    let h = Harness::new(FakeStripe::new(), FakePos::new());
    seed(h.store.as_ref(), &restaurant("r1", "DE", "EUR"), Decimal::TEN).await;
    let order = h.state.orders.create_order("r1", card_cart("r1", 1)).await.unwrap();
    assert_eq!(order.pos_sync_status, PosSyncStatus::Disabled);
    assert_eq!(
        push_order(h.store.as_ref(), &h.pos, &order.id).await,
        PosSyncStatus::Disabled
    );
}

#[tokio::test]
async fn test_inbound_status_events() {
    let h = Harness::new(FakeStripe::new(), FakePos::new());
    seed(h.store.as_ref(), &with_pos(restaurant("r1", "DE", "EUR"), "square"), Decimal::TEN).await;
    let order = h.state.orders.create_order("r1", card_cart("r1", 1)).await.unwrap();

    let event = |id: &str, status: &str| PosEvent::OrderStatusChanged {
        event_id: id.to_string(),
        order_id: Some(order.id.clone()),
        order_number: None,
        pos_order_id: Some("sq-77".into()),
        status: status.to_string(),
    };

    let preparing = event("e1", "IN_PROGRESS");
    let outcome = handle_event(h.store.as_ref(), "r1", "square", &preparing).await.unwrap();
    assert_eq!(outcome, PosEventOutcome::Applied);
    let stored = h.store.order(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Preparing);
    assert_eq!(stored.pos_order_id.as_deref(), Some("sq-77"));

    let outcome = handle_event(h.store.as_ref(), "r1", "square", &preparing).await.unwrap();
    assert_eq!(outcome, PosEventOutcome::Duplicate);

    // A late OPEN would move the order backwards
    let outcome = handle_event(h.store.as_ref(), "r1", "square", &event("e2", "OPEN")).await.unwrap();
    assert_eq!(outcome, PosEventOutcome::Ignored);
    assert_eq!(
        h.store.order(&order.id).await.unwrap().unwrap().status,
        OrderStatus::Preparing
    );

    let outcome = handle_event(h.store.as_ref(), "r1", "square", &event("e3", "CANCELED")).await.unwrap();
    assert_eq!(outcome, PosEventOutcome::Applied);
    assert_eq!(
        h.store.order(&order.id).await.unwrap().unwrap().status,
        OrderStatus::Cancelled
    );
}

#[tokio::test]
async fn test_inbound_inventory_events() {
    let h = Harness::new(FakeStripe::new(), FakePos::new());
    seed(h.store.as_ref(), &with_pos(restaurant("r1", "DE", "EUR"), "square"), Decimal::TEN).await;

    let sold_out = PosEvent::InventoryChanged {
        event_id: "inv-1".into(),
        external_id: "burger-1".into(),
        available: false,
    };
    assert_eq!(
        handle_event(h.store.as_ref(), "r1", "square", &sold_out).await.unwrap(),
        PosEventOutcome::Applied
    );
    let items = h.store.menu_items("r1").await.unwrap();
    assert!(!items[0].available);

    let unknown = PosEvent::InventoryChanged {
        event_id: "inv-2".into(),
        external_id: "nope".into(),
        available: false,
    };
    assert_eq!(
        handle_event(h.store.as_ref(), "r1", "square", &unknown).await.unwrap(),
        PosEventOutcome::Ignored
    );
}
