//! Payment provider port
//!
//! Every concrete provider (Stripe direct, Stripe Connect split, PayTabs
//! redirect) implements [`PaymentProvider`]. Errors are classified so the
//! orchestrator can decide between fallback, retry and rejection.

use async_trait::async_trait;
use shared::error::{AppError, ErrorCode};
use shared::order::SettlementType;
use std::collections::BTreeMap;
use thiserror::Error;

/// Provider family, used for routing and persisted on the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Stripe,
    PayTabs,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::PayTabs => "paytabs",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stripe" => Some(Self::Stripe),
            "paytabs" => Some(Self::PayTabs),
            _ => None,
        }
    }
}

/// Payment request handed to a provider
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: String,
    pub order_number: String,
    pub restaurant_id: String,
    /// Total to charge, in the currency's minor units (tip included)
    pub amount_minor: i64,
    /// ISO-4217, upper case
    pub currency: String,
    pub tip_minor: i64,
    pub metadata: BTreeMap<String, String>,
}

/// Successful intent creation
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
    pub settlement_type: SettlementType,
    pub application_fee_minor: Option<i64>,
    pub transfer_destination: Option<String>,
    /// Non-fatal notice for the caller (e.g. funds landed on the platform account)
    pub warning: Option<String>,
}

/// Provider-side view of an existing intent
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentConfirmation {
    pub succeeded: bool,
    /// Raw provider status (`succeeded`, `processing`, `A`, ...)
    pub status: String,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// Missing or invalid credentials, misconfiguration, unsupported region
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Network failure, timeout or provider 5xx: the caller may retry
    #[error("provider temporarily unavailable: {0}")]
    Transient(String),

    /// Provider refused the payment
    #[error("payment declined: {0}")]
    Declined(String),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        let code = match &err {
            PaymentError::Unavailable(_) => ErrorCode::ProviderUnavailable,
            PaymentError::Transient(_) => ErrorCode::PaymentTransient,
            PaymentError::Declined(_) => ErrorCode::PaymentDeclined,
        };
        AppError::with_message(code, err.to_string())
    }
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Whether the provider can charge in this currency
    fn supports_currency(&self, _currency: &str) -> bool {
        true
    }

    async fn process_payment(&self, request: &PaymentRequest) -> Result<PaymentOutcome, PaymentError>;

    async fn confirm_payment(&self, intent_id: &str) -> Result<PaymentConfirmation, PaymentError>;

    fn supported_payment_methods(&self, country: &str) -> Vec<&'static str>;
}
