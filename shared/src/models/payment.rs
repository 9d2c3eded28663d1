//! Payment ledger Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentKind {
    Order,
    Subscription,
}

impl PaymentKind {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "ORDER" => Some(Self::Order),
            "SUBSCRIPTION" => Some(Self::Subscription),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Order => "ORDER",
            Self::Subscription => "SUBSCRIPTION",
        }
    }
}

/// Ledger entry, one per successful provider transaction
///
/// Append-only: rows are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: String,
    pub restaurant_id: String,
    pub order_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub kind: PaymentKind,
    pub provider: String,
    /// Provider transaction reference (payment intent id, PayTabs tran_ref)
    pub provider_reference: String,
    pub created_at: i64,
}
