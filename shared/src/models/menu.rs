//! Menu Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catch-all category for items whose POS category is unknown
pub const MISC_CATEGORY_NAME: &str = "Misc";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuCategory {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    /// Identifier in the restaurant's POS
    pub external_id: Option<String>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuVariant {
    pub id: String,
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuExtra {
    pub id: String,
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuItem {
    pub id: String,
    pub restaurant_id: String,
    pub category_id: String,
    pub name: String,
    pub external_id: Option<String>,
    pub price: Decimal,
    pub available: bool,
    #[serde(default)]
    pub variants: Vec<MenuVariant>,
    #[serde(default)]
    pub extras: Vec<MenuExtra>,
}

impl MenuItem {
    pub fn variant(&self, id: &str) -> Option<&MenuVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn extra(&self, id: &str) -> Option<&MenuExtra> {
        self.extras.iter().find(|e| e.id == id)
    }
}
