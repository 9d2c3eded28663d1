//! Order Model

use crate::order::{OrderStatus, OrderType, PaymentMethod, PaymentStatus, PosSyncStatus, SettlementType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Variant chosen for an order line (snapshot)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChosenVariant {
    pub id: String,
    pub name: String,
    pub price: Decimal,
}

/// Extra chosen for an order line (snapshot)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChosenExtra {
    pub id: String,
    pub name: String,
    pub price: Decimal,
}

/// Order line: menu item snapshot taken at checkout
///
/// Immutable once the order is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub menu_item_id: String,
    pub name: String,
    pub quantity: i32,
    /// Variant price (or base price) plus extras
    pub unit_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<ChosenVariant>,
    #[serde(default)]
    pub extras: Vec<ChosenExtra>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub line_total: Decimal,
}

/// Monetary breakdown of an order, all values rounded to 2 dp
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    /// Tax amount; embedded in `subtotal` when prices include tax
    pub tax: Decimal,
    pub service_fee: Decimal,
    pub tip: Decimal,
    pub total: Decimal,
}

/// Lifecycle timestamps (Unix millis), each set at most once
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct OrderTimestamps {
    pub confirmed_at: Option<i64>,
    pub prepared_at: Option<i64>,
    pub ready_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub paid_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub completed_at: Option<i64>,
}

/// Order aggregate root
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub restaurant_id: String,
    /// `{prefix}-{5-digit sequence}`, unique per restaurant
    pub order_number: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_intent_id: Option<String>,
    /// Provider that created the intent (`stripe`, `paytabs`)
    pub payment_provider: Option<String>,
    pub settlement_type: Option<SettlementType>,
    pub currency: String,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub items: Vec<OrderItem>,
    #[serde(flatten)]
    pub timestamps: OrderTimestamps,
    pub cancel_reason: Option<String>,
    pub pos_sync_status: PosSyncStatus,
    pub pos_order_id: Option<String>,
    pub customer_name: Option<String>,
    pub table_number: Option<String>,
    /// Optimistic concurrency counter, bumped on every write
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Compact view returned by the order creation API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreated {
    pub id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total: Decimal,
    pub currency: String,
}

impl From<&Order> for OrderCreated {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.clone(),
            order_number: order.order_number.clone(),
            status: order.status,
            payment_status: order.payment_status,
            total: order.totals.total,
            currency: order.currency.clone(),
        }
    }
}

/// Format an order number from a prefix and a per-restaurant sequence
pub fn format_order_number(prefix: &str, sequence: i64) -> String {
    format!("{prefix}-{sequence:05}")
}
