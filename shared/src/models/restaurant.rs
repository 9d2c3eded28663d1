//! Restaurant Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default order number prefix
pub const DEFAULT_ORDER_PREFIX: &str = "ORD";

/// How the service fee is computed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceFeeType {
    #[default]
    Percent,
    Fixed,
}

/// Fee, tax and POS configuration of a restaurant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestaurantSettings {
    pub service_fee_enabled: bool,
    pub service_fee_type: ServiceFeeType,
    /// Percent of subtotal, e.g. `10` for 10 %
    pub service_fee_percent: Decimal,
    pub service_fee_amount: Decimal,
    /// Percent, e.g. `19` for 19 %
    pub tax_rate: Decimal,
    /// Menu prices already include tax
    pub include_tax: bool,
    pub currency: String,
    #[serde(default = "default_prefix")]
    pub order_number_prefix: String,
    pub pos_system: Option<String>,
    #[serde(skip_serializing)]
    pub pos_api_key: Option<String>,
    pub pos_sync_enabled: bool,
}

fn default_prefix() -> String {
    DEFAULT_ORDER_PREFIX.to_string()
}

impl Default for RestaurantSettings {
    fn default() -> Self {
        Self {
            service_fee_enabled: false,
            service_fee_type: ServiceFeeType::Percent,
            service_fee_percent: Decimal::ZERO,
            service_fee_amount: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            include_tax: true,
            currency: "EUR".to_string(),
            order_number_prefix: default_prefix(),
            pos_system: None,
            pos_api_key: None,
            pos_sync_enabled: false,
        }
    }
}

impl RestaurantSettings {
    /// POS vendor and API key, when the integration is enabled and complete
    pub fn pos_credentials(&self) -> Option<(&str, &str)> {
        if !self.pos_sync_enabled {
            return None;
        }
        match (self.pos_system.as_deref(), self.pos_api_key.as_deref()) {
            (Some(system), Some(key)) if !system.is_empty() && !key.is_empty() => {
                Some((system, key))
            }
            _ => None,
        }
    }
}

/// Stripe Connect state stored on the restaurant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConnectStatus {
    pub stripe_account_id: Option<String>,
    pub onboarding_completed: bool,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub details_submitted: bool,
}

impl ConnectStatus {
    /// Locally known preconditions for a split payment
    ///
    /// Stripe must still confirm `charges_enabled && details_submitted` live.
    pub fn split_candidate(&self) -> Option<&str> {
        match self.stripe_account_id.as_deref() {
            Some(id) if !id.is_empty() && self.onboarding_completed => Some(id),
            _ => None,
        }
    }
}

/// Platform subscription of a restaurant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub subscription_id: String,
    /// Provider status string (`active`, `past_due`, `canceled`, ...)
    pub status: String,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
}

/// Restaurant (tenant)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Restaurant {
    pub id: String,
    pub slug: String,
    pub name: String,
    /// ISO-3166 alpha-2, input to provider routing
    pub country: String,
    /// Public web domain, used for Apple Pay registration
    pub domain: Option<String>,
    pub settings: Option<RestaurantSettings>,
    pub connect: ConnectStatus,
    pub stripe_customer_id: Option<String>,
    pub subscription: Option<SubscriptionInfo>,
    pub created_at: i64,
}

impl Restaurant {
    /// Settings, or the defaults when the restaurant never configured any
    pub fn settings_or_default(&self) -> RestaurantSettings {
        self.settings.clone().unwrap_or_default()
    }
}
