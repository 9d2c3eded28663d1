//! In-process store
//!
//! One mutex over all tables; every trait call is a single critical section,
//! which gives the same atomicity the SQL statements have in `PgStore`.

use super::{DeleteOutcome, Store, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared::models::{
    ConnectStatus, Invoice, MenuCategory, MenuItem, Order, Payment, Restaurant, SubscriptionInfo,
};
use shared::order::PaymentStatus;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct Tables {
    restaurants: HashMap<String, Restaurant>,
    categories: HashMap<String, MenuCategory>,
    items: HashMap<String, MenuItem>,
    sequences: HashMap<String, i64>,
    orders: HashMap<String, Order>,
    payments: Vec<Payment>,
    invoices: HashMap<String, Invoice>,
    events: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_restaurant(&self, restaurant: &Restaurant) -> Result<(), StoreError> {
        self.tables
            .lock()
            .restaurants
            .insert(restaurant.id.clone(), restaurant.clone());
        Ok(())
    }

    async fn restaurant(&self, id: &str) -> Result<Option<Restaurant>, StoreError> {
        Ok(self.tables.lock().restaurants.get(id).cloned())
    }

    async fn restaurant_by_slug(&self, slug: &str) -> Result<Option<Restaurant>, StoreError> {
        Ok(self
            .tables
            .lock()
            .restaurants
            .values()
            .find(|r| r.slug == slug)
            .cloned())
    }

    async fn restaurant_by_stripe_account(
        &self,
        account_id: &str,
    ) -> Result<Option<Restaurant>, StoreError> {
        Ok(self
            .tables
            .lock()
            .restaurants
            .values()
            .find(|r| r.connect.stripe_account_id.as_deref() == Some(account_id))
            .cloned())
    }

    async fn restaurant_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Restaurant>, StoreError> {
        Ok(self
            .tables
            .lock()
            .restaurants
            .values()
            .find(|r| r.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, StoreError> {
        let mut all: Vec<Restaurant> = self.tables.lock().restaurants.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn save_connect_status(
        &self,
        restaurant_id: &str,
        status: &ConnectStatus,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock();
        let Some(r) = tables.restaurants.get_mut(restaurant_id) else {
            return Ok(false);
        };
        let flipped = !r.connect.onboarding_completed && status.onboarding_completed;
        r.connect = status.clone();
        Ok(flipped)
    }

    async fn save_subscription(
        &self,
        restaurant_id: &str,
        subscription: &SubscriptionInfo,
    ) -> Result<(), StoreError> {
        if let Some(r) = self.tables.lock().restaurants.get_mut(restaurant_id) {
            r.subscription = Some(subscription.clone());
        }
        Ok(())
    }

    async fn restaurant_by_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Restaurant>, StoreError> {
        Ok(self
            .tables
            .lock()
            .restaurants
            .values()
            .find(|r| {
                r.subscription
                    .as_ref()
                    .is_some_and(|s| s.subscription_id == subscription_id)
            })
            .cloned())
    }

    async fn menu_items(&self, restaurant_id: &str) -> Result<Vec<MenuItem>, StoreError> {
        let mut items: Vec<MenuItem> = self
            .tables
            .lock()
            .items
            .values()
            .filter(|i| i.restaurant_id == restaurant_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn menu_categories(&self, restaurant_id: &str) -> Result<Vec<MenuCategory>, StoreError> {
        let mut cats: Vec<MenuCategory> = self
            .tables
            .lock()
            .categories
            .values()
            .filter(|c| c.restaurant_id == restaurant_id)
            .cloned()
            .collect();
        cats.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        Ok(cats)
    }

    async fn upsert_category(&self, category: &MenuCategory) -> Result<(), StoreError> {
        self.tables
            .lock()
            .categories
            .insert(category.id.clone(), category.clone());
        Ok(())
    }

    async fn upsert_menu_item(&self, item: &MenuItem) -> Result<(), StoreError> {
        self.tables.lock().items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn set_item_availability(
        &self,
        restaurant_id: &str,
        external_id: &str,
        available: bool,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock();
        let mut matched = false;
        for item in tables.items.values_mut().filter(|i| {
            i.restaurant_id == restaurant_id && i.external_id.as_deref() == Some(external_id)
        }) {
            item.available = available;
            matched = true;
        }
        Ok(matched)
    }

    async fn next_order_sequence(&self, restaurant_id: &str) -> Result<i64, StoreError> {
        let mut tables = self.tables.lock();
        let seq = tables.sequences.entry(restaurant_id.to_string()).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let duplicate = tables.orders.values().any(|o| {
            o.restaurant_id == order.restaurant_id && o.order_number == order.order_number
        });
        if duplicate || tables.orders.contains_key(&order.id) {
            return Err(StoreError::Corrupt(format!(
                "duplicate order {} / {}",
                order.id, order.order_number
            )));
        }
        tables.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn order(&self, id: &str) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.lock().orders.get(id).cloned())
    }

    async fn order_by_intent(&self, payment_intent_id: &str) -> Result<Option<Order>, StoreError> {
        Ok(self
            .tables
            .lock()
            .orders
            .values()
            .find(|o| o.payment_intent_id.as_deref() == Some(payment_intent_id))
            .cloned())
    }

    async fn order_by_number(
        &self,
        restaurant_id: &str,
        order_number: &str,
    ) -> Result<Option<Order>, StoreError> {
        Ok(self
            .tables
            .lock()
            .orders
            .values()
            .find(|o| o.restaurant_id == restaurant_id && o.order_number == order_number)
            .cloned())
    }

    async fn order_by_pos_id(
        &self,
        restaurant_id: &str,
        pos_order_id: &str,
    ) -> Result<Option<Order>, StoreError> {
        Ok(self
            .tables
            .lock()
            .orders
            .values()
            .find(|o| {
                o.restaurant_id == restaurant_id && o.pos_order_id.as_deref() == Some(pos_order_id)
            })
            .cloned())
    }

    async fn update_order(&self, order: &Order, expected_version: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock();
        match tables.orders.get_mut(&order.id) {
            Some(stored) if stored.version == expected_version => {
                let mut next = order.clone();
                next.version = expected_version + 1;
                *stored = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_unpaid_order(&self, id: &str) -> Result<DeleteOutcome, StoreError> {
        let mut tables = self.tables.lock();
        match tables.orders.get(id) {
            None => Ok(DeleteOutcome::NotFound),
            Some(o) if o.payment_status == PaymentStatus::Paid => Ok(DeleteOutcome::Paid),
            Some(_) => {
                tables.orders.remove(id);
                Ok(DeleteOutcome::Deleted)
            }
        }
    }

    async fn append_payment(&self, payment: &Payment) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock();
        let exists = tables.payments.iter().any(|p| {
            p.provider == payment.provider
                && p.provider_reference == payment.provider_reference
                && p.kind == payment.kind
        });
        if exists {
            return Ok(false);
        }
        tables.payments.push(payment.clone());
        Ok(true)
    }

    async fn payments_for_order(&self, order_id: &str) -> Result<Vec<Payment>, StoreError> {
        Ok(self
            .tables
            .lock()
            .payments
            .iter()
            .filter(|p| p.order_id.as_deref() == Some(order_id))
            .cloned()
            .collect())
    }

    async fn create_invoice_once(&self, invoice: &Invoice) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock();
        if tables.invoices.contains_key(&invoice.order_id) {
            return Ok(false);
        }
        tables
            .invoices
            .insert(invoice.order_id.clone(), invoice.clone());
        Ok(true)
    }

    async fn invoice_for_order(&self, order_id: &str) -> Result<Option<Invoice>, StoreError> {
        Ok(self.tables.lock().invoices.get(order_id).cloned())
    }

    async fn is_event_processed(&self, event_id: &str) -> Result<bool, StoreError> {
        Ok(self.tables.lock().events.contains(event_id))
    }

    async fn record_event(
        &self,
        event_id: &str,
        _source: &str,
        _event_type: &str,
        _now: i64,
    ) -> Result<(), StoreError> {
        self.tables.lock().events.insert(event_id.to_string());
        Ok(())
    }
}
