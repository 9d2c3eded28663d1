//! Invoice Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Invoice issued when an order is paid
///
/// At most one per order; `order_id` is the idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub order_id: String,
    pub restaurant_id: String,
    pub invoice_number: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub created_at: i64,
}

/// Invoice number derived from the order number
pub fn invoice_number_for(order_number: &str) -> String {
    format!("INV-{order_number}")
}
