//! PostgreSQL store (sqlx)

use super::{DeleteOutcome, Store, StoreError};
use crate::money::round_money;
use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{
    ConnectStatus, Invoice, MenuCategory, MenuExtra, MenuItem, MenuVariant, Order, OrderItem,
    OrderTimestamps, OrderTotals, Payment, PaymentKind, Restaurant, RestaurantSettings,
    SubscriptionInfo,
};
use shared::order::{
    OrderStatus, OrderType, PaymentMethod, PaymentStatus, PosSyncStatus, SettlementType,
};
use sqlx::PgPool;
use sqlx::types::Json;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run embedded migrations
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

fn corrupt(column: &str, value: &str) -> StoreError {
    StoreError::Corrupt(format!("unexpected {column} value '{value}'"))
}

// ── Row types ──

#[derive(sqlx::FromRow)]
struct RestaurantRow {
    id: String,
    slug: String,
    name: String,
    country: String,
    domain: Option<String>,
    settings: Option<Json<RestaurantSettings>>,
    stripe_account_id: Option<String>,
    stripe_onboarding_completed: bool,
    stripe_charges_enabled: bool,
    stripe_payouts_enabled: bool,
    stripe_details_submitted: bool,
    stripe_customer_id: Option<String>,
    subscription_id: Option<String>,
    subscription_status: Option<String>,
    subscription_period_end: Option<i64>,
    subscription_cancel_at_period_end: bool,
    created_at: i64,
}

impl From<RestaurantRow> for Restaurant {
    fn from(row: RestaurantRow) -> Self {
        let subscription = match (row.subscription_id, row.subscription_status) {
            (Some(subscription_id), Some(status)) => Some(SubscriptionInfo {
                subscription_id,
                status,
                current_period_end: row.subscription_period_end,
                cancel_at_period_end: row.subscription_cancel_at_period_end,
            }),
            _ => None,
        };
        Restaurant {
            id: row.id,
            slug: row.slug,
            name: row.name,
            country: row.country,
            domain: row.domain,
            settings: row.settings.map(|j| j.0),
            connect: ConnectStatus {
                stripe_account_id: row.stripe_account_id,
                onboarding_completed: row.stripe_onboarding_completed,
                charges_enabled: row.stripe_charges_enabled,
                payouts_enabled: row.stripe_payouts_enabled,
                details_submitted: row.stripe_details_submitted,
            },
            stripe_customer_id: row.stripe_customer_id,
            subscription,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MenuItemRow {
    id: String,
    restaurant_id: String,
    category_id: String,
    name: String,
    external_id: Option<String>,
    price: Decimal,
    available: bool,
    variants: Json<Vec<MenuVariant>>,
    extras: Json<Vec<MenuExtra>>,
}

impl From<MenuItemRow> for MenuItem {
    fn from(row: MenuItemRow) -> Self {
        MenuItem {
            id: row.id,
            restaurant_id: row.restaurant_id,
            category_id: row.category_id,
            name: row.name,
            external_id: row.external_id,
            price: row.price,
            available: row.available,
            variants: row.variants.0,
            extras: row.extras.0,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: String,
    restaurant_id: String,
    name: String,
    external_id: Option<String>,
    sort_order: i32,
}

impl From<CategoryRow> for MenuCategory {
    fn from(row: CategoryRow) -> Self {
        MenuCategory {
            id: row.id,
            restaurant_id: row.restaurant_id,
            name: row.name,
            external_id: row.external_id,
            sort_order: row.sort_order,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    restaurant_id: String,
    order_number: String,
    order_type: String,
    status: String,
    payment_status: String,
    payment_method: String,
    payment_intent_id: Option<String>,
    payment_provider: Option<String>,
    settlement_type: Option<String>,
    currency: String,
    subtotal: Decimal,
    tax: Decimal,
    service_fee: Decimal,
    tip: Decimal,
    total: Decimal,
    items: Json<Vec<OrderItem>>,
    confirmed_at: Option<i64>,
    prepared_at: Option<i64>,
    ready_at: Option<i64>,
    delivered_at: Option<i64>,
    paid_at: Option<i64>,
    cancelled_at: Option<i64>,
    completed_at: Option<i64>,
    cancel_reason: Option<String>,
    pos_sync_status: String,
    pos_order_id: Option<String>,
    customer_name: Option<String>,
    table_number: Option<String>,
    version: i64,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let settlement_type = match row.settlement_type.as_deref() {
            Some(s) => Some(SettlementType::from_db(s).ok_or_else(|| corrupt("settlement_type", s))?),
            None => None,
        };
        Ok(Order {
            order_type: OrderType::from_db(&row.order_type)
                .ok_or_else(|| corrupt("order_type", &row.order_type))?,
            status: OrderStatus::from_db(&row.status).ok_or_else(|| corrupt("status", &row.status))?,
            payment_status: PaymentStatus::from_db(&row.payment_status)
                .ok_or_else(|| corrupt("payment_status", &row.payment_status))?,
            payment_method: PaymentMethod::from_db(&row.payment_method)
                .ok_or_else(|| corrupt("payment_method", &row.payment_method))?,
            pos_sync_status: PosSyncStatus::from_db(&row.pos_sync_status)
                .ok_or_else(|| corrupt("pos_sync_status", &row.pos_sync_status))?,
            settlement_type,
            id: row.id,
            restaurant_id: row.restaurant_id,
            order_number: row.order_number,
            payment_intent_id: row.payment_intent_id,
            payment_provider: row.payment_provider,
            totals: OrderTotals {
                subtotal: round_money(row.subtotal, &row.currency),
                tax: round_money(row.tax, &row.currency),
                service_fee: round_money(row.service_fee, &row.currency),
                tip: round_money(row.tip, &row.currency),
                total: round_money(row.total, &row.currency),
            },
            currency: row.currency,
            items: row.items.0,
            timestamps: OrderTimestamps {
                confirmed_at: row.confirmed_at,
                prepared_at: row.prepared_at,
                ready_at: row.ready_at,
                delivered_at: row.delivered_at,
                paid_at: row.paid_at,
                cancelled_at: row.cancelled_at,
                completed_at: row.completed_at,
            },
            cancel_reason: row.cancel_reason,
            pos_order_id: row.pos_order_id,
            customer_name: row.customer_name,
            table_number: row.table_number,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: String,
    restaurant_id: String,
    order_id: Option<String>,
    amount: Decimal,
    currency: String,
    kind: String,
    provider: String,
    provider_reference: String,
    created_at: i64,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            kind: PaymentKind::from_db(&row.kind).ok_or_else(|| corrupt("kind", &row.kind))?,
            id: row.id,
            restaurant_id: row.restaurant_id,
            order_id: row.order_id,
            amount: row.amount,
            currency: row.currency,
            provider: row.provider,
            provider_reference: row.provider_reference,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    order_id: String,
    restaurant_id: String,
    invoice_number: String,
    subtotal: Decimal,
    tax: Decimal,
    total: Decimal,
    currency: String,
    created_at: i64,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Invoice {
            id: row.id,
            order_id: row.order_id,
            restaurant_id: row.restaurant_id,
            invoice_number: row.invoice_number,
            subtotal: round_money(row.subtotal, &row.currency),
            tax: round_money(row.tax, &row.currency),
            total: round_money(row.total, &row.currency),
            currency: row.currency,
            created_at: row.created_at,
        }
    }
}

fn order_from_row(row: Option<OrderRow>) -> Result<Option<Order>, StoreError> {
    row.map(Order::try_from).transpose()
}

#[async_trait]
impl Store for PgStore {
    async fn insert_restaurant(&self, r: &Restaurant) -> Result<(), StoreError> {
        let sub = r.subscription.as_ref();
        sqlx::query(
            "INSERT INTO restaurants (id, slug, name, country, domain, settings,
                stripe_account_id, stripe_onboarding_completed, stripe_charges_enabled,
                stripe_payouts_enabled, stripe_details_submitted, stripe_customer_id,
                subscription_id, subscription_status, subscription_period_end,
                subscription_cancel_at_period_end, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(&r.id)
        .bind(&r.slug)
        .bind(&r.name)
        .bind(&r.country)
        .bind(&r.domain)
        .bind(r.settings.as_ref().map(Json))
        .bind(&r.connect.stripe_account_id)
        .bind(r.connect.onboarding_completed)
        .bind(r.connect.charges_enabled)
        .bind(r.connect.payouts_enabled)
        .bind(r.connect.details_submitted)
        .bind(&r.stripe_customer_id)
        .bind(sub.map(|s| s.subscription_id.as_str()))
        .bind(sub.map(|s| s.status.as_str()))
        .bind(sub.and_then(|s| s.current_period_end))
        .bind(sub.is_some_and(|s| s.cancel_at_period_end))
        .bind(r.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn restaurant(&self, id: &str) -> Result<Option<Restaurant>, StoreError> {
        let row: Option<RestaurantRow> = sqlx::query_as("SELECT * FROM restaurants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Restaurant::from))
    }

    async fn restaurant_by_slug(&self, slug: &str) -> Result<Option<Restaurant>, StoreError> {
        let row: Option<RestaurantRow> =
            sqlx::query_as("SELECT * FROM restaurants WHERE slug = $1")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Restaurant::from))
    }

    async fn restaurant_by_stripe_account(
        &self,
        account_id: &str,
    ) -> Result<Option<Restaurant>, StoreError> {
        let row: Option<RestaurantRow> =
            sqlx::query_as("SELECT * FROM restaurants WHERE stripe_account_id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Restaurant::from))
    }

    async fn restaurant_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Restaurant>, StoreError> {
        let row: Option<RestaurantRow> =
            sqlx::query_as("SELECT * FROM restaurants WHERE stripe_customer_id = $1")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Restaurant::from))
    }

    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, StoreError> {
        let rows: Vec<RestaurantRow> = sqlx::query_as("SELECT * FROM restaurants ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Restaurant::from).collect())
    }

    async fn save_connect_status(
        &self,
        restaurant_id: &str,
        status: &ConnectStatus,
    ) -> Result<bool, StoreError> {
        // The row lock serializes concurrent writers so only one sees the old false
        let was_completed: Option<Option<bool>> = sqlx::query_scalar(
            "WITH prev AS (
                SELECT stripe_onboarding_completed FROM restaurants WHERE id = $6 FOR UPDATE
             )
             UPDATE restaurants SET stripe_account_id = $1, stripe_onboarding_completed = $2,
                stripe_charges_enabled = $3, stripe_payouts_enabled = $4,
                stripe_details_submitted = $5
             WHERE id = $6
             RETURNING (SELECT stripe_onboarding_completed FROM prev)",
        )
        .bind(&status.stripe_account_id)
        .bind(status.onboarding_completed)
        .bind(status.charges_enabled)
        .bind(status.payouts_enabled)
        .bind(status.details_submitted)
        .bind(restaurant_id)
        .fetch_optional(&self.pool)
        .await?;
        let was_completed = was_completed.flatten().unwrap_or(true);
        Ok(!was_completed && status.onboarding_completed)
    }

    async fn save_subscription(
        &self,
        restaurant_id: &str,
        sub: &SubscriptionInfo,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE restaurants SET subscription_id = $1, subscription_status = $2,
                subscription_period_end = COALESCE($3, subscription_period_end),
                subscription_cancel_at_period_end = $4
             WHERE id = $5",
        )
        .bind(&sub.subscription_id)
        .bind(&sub.status)
        .bind(sub.current_period_end)
        .bind(sub.cancel_at_period_end)
        .bind(restaurant_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn restaurant_by_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Restaurant>, StoreError> {
        let row: Option<RestaurantRow> =
            sqlx::query_as("SELECT * FROM restaurants WHERE subscription_id = $1")
                .bind(subscription_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Restaurant::from))
    }

    async fn menu_items(&self, restaurant_id: &str) -> Result<Vec<MenuItem>, StoreError> {
        let rows: Vec<MenuItemRow> =
            sqlx::query_as("SELECT * FROM menu_items WHERE restaurant_id = $1 ORDER BY name")
                .bind(restaurant_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(MenuItem::from).collect())
    }

    async fn menu_categories(&self, restaurant_id: &str) -> Result<Vec<MenuCategory>, StoreError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            "SELECT * FROM menu_categories WHERE restaurant_id = $1 ORDER BY sort_order, name",
        )
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MenuCategory::from).collect())
    }

    async fn upsert_category(&self, c: &MenuCategory) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO menu_categories (id, restaurant_id, name, external_id, sort_order)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name, external_id = EXCLUDED.external_id,
                sort_order = EXCLUDED.sort_order",
        )
        .bind(&c.id)
        .bind(&c.restaurant_id)
        .bind(&c.name)
        .bind(&c.external_id)
        .bind(c.sort_order)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_menu_item(&self, i: &MenuItem) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO menu_items (id, restaurant_id, category_id, name, external_id, price,
                available, variants, extras)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO UPDATE SET
                category_id = EXCLUDED.category_id, name = EXCLUDED.name,
                external_id = EXCLUDED.external_id, price = EXCLUDED.price,
                available = EXCLUDED.available, variants = EXCLUDED.variants,
                extras = EXCLUDED.extras",
        )
        .bind(&i.id)
        .bind(&i.restaurant_id)
        .bind(&i.category_id)
        .bind(&i.name)
        .bind(&i.external_id)
        .bind(i.price)
        .bind(i.available)
        .bind(Json(&i.variants))
        .bind(Json(&i.extras))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_item_availability(
        &self,
        restaurant_id: &str,
        external_id: &str,
        available: bool,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE menu_items SET available = $1 WHERE restaurant_id = $2 AND external_id = $3",
        )
        .bind(available)
        .bind(restaurant_id)
        .bind(external_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn next_order_sequence(&self, restaurant_id: &str) -> Result<i64, StoreError> {
        // Single statement: the row lock serializes concurrent checkouts
        let (value,): (i64,) = sqlx::query_as(
            "INSERT INTO order_sequences (restaurant_id, last_value) VALUES ($1, 1)
             ON CONFLICT (restaurant_id) DO UPDATE SET last_value = order_sequences.last_value + 1
             RETURNING last_value",
        )
        .bind(restaurant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(value)
    }

    async fn insert_order(&self, o: &Order) -> Result<(), StoreError> {
        let t = &o.timestamps;
        sqlx::query(
            "INSERT INTO orders (id, restaurant_id, order_number, order_type, status,
                payment_status, payment_method, payment_intent_id, payment_provider,
                settlement_type, currency, subtotal, tax, service_fee, tip, total, items,
                confirmed_at, prepared_at, ready_at, delivered_at, paid_at, cancelled_at,
                completed_at, cancel_reason, pos_sync_status, pos_order_id, customer_name,
                table_number, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32)",
        )
        .bind(&o.id)
        .bind(&o.restaurant_id)
        .bind(&o.order_number)
        .bind(o.order_type.as_db())
        .bind(o.status.as_db())
        .bind(o.payment_status.as_db())
        .bind(o.payment_method.as_db())
        .bind(&o.payment_intent_id)
        .bind(&o.payment_provider)
        .bind(o.settlement_type.map(|s| s.as_db()))
        .bind(&o.currency)
        .bind(o.totals.subtotal)
        .bind(o.totals.tax)
        .bind(o.totals.service_fee)
        .bind(o.totals.tip)
        .bind(o.totals.total)
        .bind(Json(&o.items))
        .bind(t.confirmed_at)
        .bind(t.prepared_at)
        .bind(t.ready_at)
        .bind(t.delivered_at)
        .bind(t.paid_at)
        .bind(t.cancelled_at)
        .bind(t.completed_at)
        .bind(&o.cancel_reason)
        .bind(o.pos_sync_status.as_db())
        .bind(&o.pos_order_id)
        .bind(&o.customer_name)
        .bind(&o.table_number)
        .bind(o.version)
        .bind(o.created_at)
        .bind(o.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn order(&self, id: &str) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        order_from_row(row)
    }

    async fn order_by_intent(&self, payment_intent_id: &str) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> =
            sqlx::query_as("SELECT * FROM orders WHERE payment_intent_id = $1 LIMIT 1")
                .bind(payment_intent_id)
                .fetch_optional(&self.pool)
                .await?;
        order_from_row(row)
    }

    async fn order_by_number(
        &self,
        restaurant_id: &str,
        order_number: &str,
    ) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> =
            sqlx::query_as("SELECT * FROM orders WHERE restaurant_id = $1 AND order_number = $2")
                .bind(restaurant_id)
                .bind(order_number)
                .fetch_optional(&self.pool)
                .await?;
        order_from_row(row)
    }

    async fn order_by_pos_id(
        &self,
        restaurant_id: &str,
        pos_order_id: &str,
    ) -> Result<Option<Order>, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT * FROM orders WHERE restaurant_id = $1 AND pos_order_id = $2 LIMIT 1",
        )
        .bind(restaurant_id)
        .bind(pos_order_id)
        .fetch_optional(&self.pool)
        .await?;
        order_from_row(row)
    }

    async fn update_order(&self, o: &Order, expected_version: i64) -> Result<bool, StoreError> {
        let t = &o.timestamps;
        let result = sqlx::query(
            "UPDATE orders SET status = $1, payment_status = $2, payment_method = $3,
                payment_intent_id = $4, payment_provider = $5, settlement_type = $6,
                confirmed_at = $7, prepared_at = $8, ready_at = $9, delivered_at = $10,
                paid_at = $11, cancelled_at = $12, completed_at = $13, cancel_reason = $14,
                pos_sync_status = $15, pos_order_id = $16, updated_at = $17,
                version = version + 1
             WHERE id = $18 AND version = $19",
        )
        .bind(o.status.as_db())
        .bind(o.payment_status.as_db())
        .bind(o.payment_method.as_db())
        .bind(&o.payment_intent_id)
        .bind(&o.payment_provider)
        .bind(o.settlement_type.map(|s| s.as_db()))
        .bind(t.confirmed_at)
        .bind(t.prepared_at)
        .bind(t.ready_at)
        .bind(t.delivered_at)
        .bind(t.paid_at)
        .bind(t.cancelled_at)
        .bind(t.completed_at)
        .bind(&o.cancel_reason)
        .bind(o.pos_sync_status.as_db())
        .bind(&o.pos_order_id)
        .bind(o.updated_at)
        .bind(&o.id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_unpaid_order(&self, id: &str) -> Result<DeleteOutcome, StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND payment_status <> 'PAID'")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 1 {
            return Ok(DeleteOutcome::Deleted);
        }
        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(if exists.is_some() {
            DeleteOutcome::Paid
        } else {
            DeleteOutcome::NotFound
        })
    }

    async fn append_payment(&self, p: &Payment) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO payments (id, restaurant_id, order_id, amount, currency, kind, provider,
                provider_reference, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (provider, provider_reference, kind) DO NOTHING",
        )
        .bind(&p.id)
        .bind(&p.restaurant_id)
        .bind(&p.order_id)
        .bind(p.amount)
        .bind(&p.currency)
        .bind(p.kind.as_db())
        .bind(&p.provider)
        .bind(&p.provider_reference)
        .bind(p.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn payments_for_order(&self, order_id: &str) -> Result<Vec<Payment>, StoreError> {
        let rows: Vec<PaymentRow> =
            sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at")
                .bind(order_id)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn create_invoice_once(&self, i: &Invoice) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO invoices (id, order_id, restaurant_id, invoice_number, subtotal, tax,
                total, currency, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (order_id) DO NOTHING",
        )
        .bind(&i.id)
        .bind(&i.order_id)
        .bind(&i.restaurant_id)
        .bind(&i.invoice_number)
        .bind(i.subtotal)
        .bind(i.tax)
        .bind(i.total)
        .bind(&i.currency)
        .bind(i.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn invoice_for_order(&self, order_id: &str) -> Result<Option<Invoice>, StoreError> {
        let row: Option<InvoiceRow> = sqlx::query_as("SELECT * FROM invoices WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Invoice::from))
    }

    async fn is_event_processed(&self, event_id: &str) -> Result<bool, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT event_id FROM processed_webhook_events WHERE event_id = $1")
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn record_event(
        &self,
        event_id: &str,
        source: &str,
        event_type: &str,
        now: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO processed_webhook_events (event_id, source, event_type, processed_at)
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
        )
        .bind(event_id)
        .bind(source)
        .bind(event_type)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
