//! Settlement orchestrator
//!
//! Picks a provider for the restaurant's country, creates the payment intent
//! and stores the routing on the order. No database transaction is held
//! across the provider call: the order is read, the provider is called under
//! a client-side timeout, then the result is written with compare-and-set.

pub mod onboarding;

pub use onboarding::{ConnectOnboarding, ConnectRefresh, OnboardingLink};

use crate::db::Store;
use crate::error::ServiceResult;
use crate::money::to_minor_units;
use crate::orders::update_with_retry;
use crate::payment::{
    PaymentConfirmation, PaymentError, PaymentOutcome, PaymentProvider, PaymentRequest,
    ProviderKind, ProviderRegistry,
};
use crate::reconcile::{PaymentSignal, ReconcileOutcome, Reconciler};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{Order, Restaurant};
use shared::order::{OrderStatus, PaymentMethod, PaymentStatus, SettlementType};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Optional client-side expectations, checked against the stored order
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettleRequest {
    /// Expected amount in minor units
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Used only when the restaurant has no country on record
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementResponse {
    pub success: bool,
    pub order_id: String,
    pub payment_intent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    pub provider: String,
    pub settlement_type: SettlementType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_fee: Option<i64>,
    pub supported_payment_methods: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmResponse {
    pub success: bool,
    pub order_id: String,
    /// Provider's view of the intent
    pub provider_status: String,
    pub payment_status: PaymentStatus,
}

fn ensure_settleable(order: &Order) -> Result<(), AppError> {
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::new(ErrorCode::OrderCancelled).with_detail("order_id", order.id.as_str()));
    }
    if order.payment_status == PaymentStatus::Paid {
        return Err(AppError::new(ErrorCode::OrderAlreadyPaid).with_detail("order_id", order.id.as_str()));
    }
    if order.payment_method == PaymentMethod::Cash {
        return Err(AppError::with_message(
            ErrorCode::PaymentInvalidMethod,
            "Cash orders are settled at the counter",
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct SettlementOrchestrator {
    store: Arc<dyn Store>,
    registry: ProviderRegistry,
    provider_timeout: Duration,
}

impl SettlementOrchestrator {
    pub fn new(store: Arc<dyn Store>, registry: ProviderRegistry, provider_timeout: Duration) -> Self {
        Self {
            store,
            registry,
            provider_timeout,
        }
    }

    /// Bound a provider call; an elapsed timeout is a transient failure
    async fn bounded<T>(
        &self,
        provider: &dyn PaymentProvider,
        call: impl Future<Output = Result<T, PaymentError>>,
    ) -> Result<T, PaymentError> {
        match tokio::time::timeout(self.provider_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(provider = provider.name(), timeout = ?self.provider_timeout, "Provider call timed out");
                Err(PaymentError::Transient(format!("{} timed out", provider.name())))
            }
        }
    }

    async fn load(&self, order_id: &str) -> ServiceResult<(Order, Restaurant)> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(order_id))?;
        let restaurant = self
            .store
            .restaurant(&order.restaurant_id)
            .await?
            .ok_or_else(|| AppError::restaurant_not_found(order.restaurant_id.as_str()))?;
        Ok((order, restaurant))
    }

    /// Create a payment intent for an order
    pub async fn settle(&self, order_id: &str, request: &SettleRequest) -> ServiceResult<SettlementResponse> {
        let (order, restaurant) = self.load(order_id).await?;
        ensure_settleable(&order)?;

        let amount_minor = to_minor_units(order.totals.total, &order.currency)
            .filter(|a| *a > 0)
            .ok_or_else(|| {
                AppError::with_message(ErrorCode::ValueOutOfRange, "Order total cannot be charged")
            })?;
        let currency_matches = request
            .currency
            .as_deref()
            .is_none_or(|c| c.eq_ignore_ascii_case(&order.currency));
        if request.amount.is_some_and(|a| a != amount_minor) || !currency_matches {
            return Err(AppError::new(ErrorCode::OrderAmountMismatch)
                .with_detail("expected_amount", amount_minor)
                .with_detail("currency", order.currency.as_str())
                .into());
        }

        let country = if restaurant.country.is_empty() {
            request.country.clone().unwrap_or_default()
        } else {
            restaurant.country.clone()
        };
        let payment = PaymentRequest {
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            restaurant_id: order.restaurant_id.clone(),
            amount_minor,
            currency: order.currency.to_ascii_uppercase(),
            tip_minor: to_minor_units(order.totals.tip, &order.currency).unwrap_or(0),
            metadata: BTreeMap::from([("orderType".to_string(), order.order_type.as_db().to_string())]),
        };

        let (provider, outcome, fallback_message) = self.create_intent(&country, &payment).await?;

        let intent_id = outcome.payment_intent_id.clone();
        let provider_name = provider.name();
        let settlement_type = outcome.settlement_type;
        update_with_retry(self.store.as_ref(), &order.id, |order| {
            ensure_settleable(order)?;
            order.payment_intent_id = Some(intent_id.clone());
            order.payment_provider = Some(provider_name.to_string());
            order.settlement_type = Some(settlement_type);
            order.payment_method = PaymentMethod::Card;
            if order.payment_status == PaymentStatus::Failed {
                order.payment_status = PaymentStatus::Pending;
            }
            Ok((true, ()))
        })
        .await?;

        tracing::info!(
            order_id = %order.id,
            provider = provider_name,
            settlement_type = settlement_type.as_db(),
            intent_id = %outcome.payment_intent_id,
            "Payment intent created"
        );

        Ok(SettlementResponse {
            success: true,
            order_id: order.id,
            payment_intent_id: outcome.payment_intent_id,
            client_secret: outcome.client_secret,
            redirect_url: outcome.redirect_url,
            provider: provider_name.to_string(),
            settlement_type,
            application_fee: outcome.application_fee_minor,
            supported_payment_methods: provider
                .supported_payment_methods(&country)
                .into_iter()
                .map(String::from)
                .collect(),
            fallback_message,
            warning: outcome.warning,
        })
    }

    /// Preferred provider, with one fallback to Stripe when it is unavailable
    async fn create_intent(
        &self,
        country: &str,
        payment: &PaymentRequest,
    ) -> ServiceResult<(Arc<dyn PaymentProvider>, PaymentOutcome, Option<String>)> {
        let candidates = self.registry.resolve(country, &payment.currency);
        let Some(preferred) = candidates.first().cloned() else {
            return Err(AppError::provider_unavailable(country).into());
        };

        let err = match self
            .bounded(preferred.as_ref(), preferred.process_payment(payment))
            .await
        {
            Ok(outcome) => return Ok((preferred, outcome, None)),
            Err(e) => e,
        };

        let fallback = candidates
            .iter()
            .skip(1)
            .find(|p| p.kind() == ProviderKind::Stripe)
            .cloned();
        match (err, fallback) {
            (PaymentError::Unavailable(reason), Some(stripe)) => {
                tracing::warn!(
                    order_id = %payment.order_id,
                    provider = preferred.name(),
                    reason = %reason,
                    "Preferred provider unavailable, falling back to Stripe"
                );
                match self.bounded(stripe.as_ref(), stripe.process_payment(payment)).await {
                    Ok(outcome) => {
                        let message = format!(
                            "{} is not available for this restaurant; payment is processed by {}",
                            preferred.name(),
                            stripe.name()
                        );
                        Ok((stripe, outcome, Some(message)))
                    }
                    Err(PaymentError::Unavailable(reason)) => {
                        tracing::error!(order_id = %payment.order_id, reason = %reason, "No payment provider available");
                        Err(AppError::provider_unavailable(country).into())
                    }
                    Err(e) => Err(e.into()),
                }
            }
            (PaymentError::Unavailable(reason), None) => {
                tracing::error!(order_id = %payment.order_id, provider = preferred.name(), reason = %reason, "No payment provider available");
                Err(AppError::provider_unavailable(country).into())
            }
            (e, _) => Err(e.into()),
        }
    }

    /// Ask the provider for the intent's state and reconcile a success
    pub async fn confirm(&self, order_id: &str, reconciler: &Reconciler) -> ServiceResult<ConfirmResponse> {
        let (order, _) = self.load(order_id).await?;
        if order.payment_status == PaymentStatus::Paid {
            return Ok(ConfirmResponse {
                success: true,
                order_id: order.id,
                provider_status: "succeeded".to_string(),
                payment_status: PaymentStatus::Paid,
            });
        }
        let intent_id = order
            .payment_intent_id
            .clone()
            .ok_or_else(|| AppError::new(ErrorCode::PaymentIntentMissing).with_detail("order_id", order.id.as_str()))?;
        let provider_name = order.payment_provider.as_deref().unwrap_or(ProviderKind::Stripe.as_str());
        let provider = self
            .registry
            .by_name(provider_name)
            .ok_or_else(|| AppError::provider_unavailable(provider_name))?;

        let PaymentConfirmation {
            succeeded,
            status,
            amount_minor,
            currency,
        } = self
            .bounded(provider.as_ref(), provider.confirm_payment(&intent_id))
            .await?;

        let mut payment_status = order.payment_status;
        if succeeded {
            let signal = PaymentSignal {
                intent_id,
                order_ref: Some(order.id.clone()),
                restaurant_id: Some(order.restaurant_id.clone()),
                amount_minor,
                currency,
                provider: provider.name(),
            };
            let outcome = reconciler.payment_succeeded(&signal).await?;
            if matches!(outcome, ReconcileOutcome::Applied | ReconcileOutcome::AlreadyApplied) {
                payment_status = PaymentStatus::Paid;
            }
        }

        Ok(ConfirmResponse {
            success: succeeded,
            order_id: order.id,
            provider_status: status,
            payment_status,
        })
    }
}
