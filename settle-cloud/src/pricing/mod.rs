//! Pricing: cart resolution against the menu and the price calculator
//!
//! Menu prices are authoritative; the cart only names items, variants and
//! extras by id.

pub mod calculator;

pub use calculator::{PricedCart, calculate};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{ChosenExtra, ChosenVariant, MenuItem};
use std::collections::HashMap;
use thiserror::Error;

/// Maximum allowed quantity per line
pub const MAX_QUANTITY: i32 = 9999;

/// One cart line as sent by the guest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub menu_item_id: String,
    pub quantity: i32,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub extra_ids: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Cart line resolved against the menu, ready for pricing
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLine {
    pub menu_item_id: String,
    pub name: String,
    pub base_price: Decimal,
    pub variant: Option<ChosenVariant>,
    pub extras: Vec<ChosenExtra>,
    pub quantity: i32,
    pub notes: Option<String>,
}

/// What to do with cart lines naming an unknown menu item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownItemPolicy {
    /// Reject the whole cart
    #[default]
    Reject,
    /// Drop the line and keep going (logged)
    Drop,
}

impl UnknownItemPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(Self::Reject),
            "drop" => Some(Self::Drop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid quantity {quantity} for item {menu_item_id}")]
    InvalidQuantity { menu_item_id: String, quantity: i32 },

    #[error("menu item {0} not found")]
    UnknownItem(String),

    #[error("menu item {0} is unavailable")]
    UnavailableItem(String),

    #[error("variant {variant_id} not found on item {menu_item_id}")]
    UnknownVariant { menu_item_id: String, variant_id: String },

    #[error("extra {extra_id} not found on item {menu_item_id}")]
    UnknownExtra { menu_item_id: String, extra_id: String },

    #[error("tip must be non-negative")]
    NegativeTip,
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        let code = match &err {
            PricingError::EmptyCart => ErrorCode::OrderEmpty,
            PricingError::InvalidQuantity { .. } => ErrorCode::InvalidQuantity,
            PricingError::UnknownItem(_) => ErrorCode::MenuItemNotFound,
            PricingError::UnavailableItem(_) => ErrorCode::MenuItemUnavailable,
            PricingError::UnknownVariant { .. } => ErrorCode::VariantNotFound,
            PricingError::UnknownExtra { .. } => ErrorCode::ExtraNotFound,
            PricingError::NegativeTip => ErrorCode::ValueOutOfRange,
        };
        AppError::with_message(code, err.to_string())
    }
}

/// Resolve cart lines against the restaurant's menu
///
/// Quantities are validated before lookup, so an invalid quantity is
/// rejected even when the item itself would be dropped.
pub fn resolve_cart(
    lines: &[CartLine],
    menu: &[MenuItem],
    policy: UnknownItemPolicy,
) -> Result<Vec<ResolvedLine>, PricingError> {
    if lines.is_empty() {
        return Err(PricingError::EmptyCart);
    }

    let by_id: HashMap<&str, &MenuItem> = menu.iter().map(|m| (m.id.as_str(), m)).collect();
    let mut resolved = Vec::with_capacity(lines.len());

    for line in lines {
        if line.quantity <= 0 || line.quantity > MAX_QUANTITY {
            return Err(PricingError::InvalidQuantity {
                menu_item_id: line.menu_item_id.clone(),
                quantity: line.quantity,
            });
        }

        let Some(item) = by_id.get(line.menu_item_id.as_str()) else {
            match policy {
                UnknownItemPolicy::Reject => {
                    return Err(PricingError::UnknownItem(line.menu_item_id.clone()));
                }
                UnknownItemPolicy::Drop => {
                    tracing::warn!(menu_item_id = %line.menu_item_id, "Dropping unknown menu item from cart");
                    continue;
                }
            }
        };

        if !item.available {
            return Err(PricingError::UnavailableItem(item.id.clone()));
        }

        let variant = match &line.variant_id {
            Some(vid) => {
                let v = item.variant(vid).ok_or_else(|| PricingError::UnknownVariant {
                    menu_item_id: item.id.clone(),
                    variant_id: vid.clone(),
                })?;
                Some(ChosenVariant {
                    id: v.id.clone(),
                    name: v.name.clone(),
                    price: v.price,
                })
            }
            None => None,
        };

        let extras = line
            .extra_ids
            .iter()
            .map(|eid| {
                item.extra(eid)
                    .map(|e| ChosenExtra {
                        id: e.id.clone(),
                        name: e.name.clone(),
                        price: e.price,
                    })
                    .ok_or_else(|| PricingError::UnknownExtra {
                        menu_item_id: item.id.clone(),
                        extra_id: eid.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        resolved.push(ResolvedLine {
            menu_item_id: item.id.clone(),
            name: item.name.clone(),
            base_price: item.price,
            variant,
            extras,
            quantity: line.quantity,
            notes: line.notes.clone(),
        });
    }

    if resolved.is_empty() {
        return Err(PricingError::EmptyCart);
    }
    Ok(resolved)
}
