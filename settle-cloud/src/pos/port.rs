//! POS adapter contract
//!
//! Only the contract lives here; each vendor's wire format sits behind
//! [`PosConnector`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{Order, Restaurant};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PosError {
    #[error("restaurant {0} has no POS integration configured")]
    NotConfigured(String),

    #[error("POS vendor {0} is not supported")]
    UnsupportedVendor(String),

    #[error("POS unreachable: {0}")]
    Network(String),

    #[error("POS rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl From<PosError> for AppError {
    fn from(err: PosError) -> Self {
        let code = match &err {
            PosError::NotConfigured(_) => ErrorCode::PosNotConfigured,
            PosError::UnsupportedVendor(_) => ErrorCode::PosVendorUnsupported,
            PosError::Network(_) | PosError::Rejected { .. } => ErrorCode::PosSyncFailed,
        };
        AppError::with_message(code, err.to_string())
    }
}

/// Category as reported by the POS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosCategory {
    pub external_id: String,
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
}

/// Menu item as reported by the POS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosMenuItem {
    pub external_id: String,
    pub name: String,
    #[serde(default)]
    pub category_external_id: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    pub price: Decimal,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

/// Result of `sync_menu`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuSnapshot {
    pub success: bool,
    #[serde(default)]
    pub categories: Vec<PosCategory>,
    #[serde(default)]
    pub items: Vec<PosMenuItem>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PosOrderLine {
    pub menu_item_id: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Order as pushed to the POS
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PosOrder {
    pub order_id: String,
    pub order_number: String,
    pub order_type: String,
    pub currency: String,
    pub total: Decimal,
    pub lines: Vec<PosOrderLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<String>,
}

impl From<&Order> for PosOrder {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            order_type: order.order_type.as_db().to_string(),
            currency: order.currency.clone(),
            total: order.totals.total,
            lines: order
                .items
                .iter()
                .map(|item| PosOrderLine {
                    menu_item_id: item.menu_item_id.clone(),
                    name: item.name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    notes: item.notes.clone(),
                })
                .collect(),
            customer_name: order.customer_name.clone(),
            table_number: order.table_number.clone(),
        }
    }
}

#[async_trait]
pub trait PosConnector: Send + Sync {
    fn vendor(&self) -> &str;

    async fn sync_menu(&self) -> Result<MenuSnapshot, PosError>;

    /// Push an order; returns the vendor's order id when it assigns one
    async fn send_order(&self, order: &PosOrder) -> Result<Option<String>, PosError>;
}

/// Builds the connector for a restaurant's POS settings
pub trait PosConnectors: Send + Sync {
    fn for_restaurant(&self, restaurant: &Restaurant) -> Result<Box<dyn PosConnector>, PosError>;
}
