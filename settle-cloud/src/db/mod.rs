//! Persistence layer
//!
//! [`Store`] is the seam between business logic and storage. `PgStore` is the
//! production implementation; `MemoryStore` backs `DATABASE_URL=memory` and
//! the test suite.
//!
//! Order writes are compare-and-set on `version`: `update_order` only applies
//! when the stored version still equals the expected one.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use shared::models::{
    ConnectStatus, Invoice, MenuCategory, MenuItem, Order, Payment, Restaurant, SubscriptionInfo,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("json column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Result of a guarded order deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// Order is paid and was left untouched
    Paid,
}

#[async_trait]
pub trait Store: Send + Sync {
    // ── Restaurants ──
    async fn insert_restaurant(&self, restaurant: &Restaurant) -> Result<(), StoreError>;
    async fn restaurant(&self, id: &str) -> Result<Option<Restaurant>, StoreError>;
    async fn restaurant_by_slug(&self, slug: &str) -> Result<Option<Restaurant>, StoreError>;
    async fn restaurant_by_stripe_account(
        &self,
        account_id: &str,
    ) -> Result<Option<Restaurant>, StoreError>;
    async fn restaurant_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Restaurant>, StoreError>;
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, StoreError>;
    /// Overwrite the Connect flags; true only for the write that flipped
    /// `onboarding_completed` from false to true
    async fn save_connect_status(
        &self,
        restaurant_id: &str,
        status: &ConnectStatus,
    ) -> Result<bool, StoreError>;
    async fn save_subscription(
        &self,
        restaurant_id: &str,
        subscription: &SubscriptionInfo,
    ) -> Result<(), StoreError>;
    async fn restaurant_by_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Restaurant>, StoreError>;

    // ── Menu ──
    async fn menu_items(&self, restaurant_id: &str) -> Result<Vec<MenuItem>, StoreError>;
    async fn menu_categories(&self, restaurant_id: &str) -> Result<Vec<MenuCategory>, StoreError>;
    async fn upsert_category(&self, category: &MenuCategory) -> Result<(), StoreError>;
    async fn upsert_menu_item(&self, item: &MenuItem) -> Result<(), StoreError>;
    /// Toggle availability by POS external id; returns false if no item matched
    async fn set_item_availability(
        &self,
        restaurant_id: &str,
        external_id: &str,
        available: bool,
    ) -> Result<bool, StoreError>;

    // ── Orders ──
    /// Atomically allocate the next order sequence for a restaurant (starts at 1)
    async fn next_order_sequence(&self, restaurant_id: &str) -> Result<i64, StoreError>;
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;
    async fn order(&self, id: &str) -> Result<Option<Order>, StoreError>;
    async fn order_by_intent(&self, payment_intent_id: &str) -> Result<Option<Order>, StoreError>;
    async fn order_by_number(
        &self,
        restaurant_id: &str,
        order_number: &str,
    ) -> Result<Option<Order>, StoreError>;
    async fn order_by_pos_id(
        &self,
        restaurant_id: &str,
        pos_order_id: &str,
    ) -> Result<Option<Order>, StoreError>;
    /// Compare-and-set write; stores `order` with `version = expected_version + 1`
    /// and returns false when the stored version moved on.
    async fn update_order(&self, order: &Order, expected_version: i64) -> Result<bool, StoreError>;
    /// Delete an order unless it is paid, atomically
    async fn delete_unpaid_order(&self, id: &str) -> Result<DeleteOutcome, StoreError>;

    // ── Ledger ──
    /// Append a ledger row; returns false if this provider reference is already recorded
    async fn append_payment(&self, payment: &Payment) -> Result<bool, StoreError>;
    async fn payments_for_order(&self, order_id: &str) -> Result<Vec<Payment>, StoreError>;
    /// Create the order's invoice unless one exists; returns false if it did
    async fn create_invoice_once(&self, invoice: &Invoice) -> Result<bool, StoreError>;
    async fn invoice_for_order(&self, order_id: &str) -> Result<Option<Invoice>, StoreError>;

    // ── Webhook de-duplication ──
    async fn is_event_processed(&self, event_id: &str) -> Result<bool, StoreError>;
    async fn record_event(
        &self,
        event_id: &str,
        source: &str,
        event_type: &str,
        now: i64,
    ) -> Result<(), StoreError>;
}
