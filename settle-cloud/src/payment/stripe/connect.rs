//! Stripe Connect destination charges with platform fee
//!
//! A split is attempted only when the restaurant finished onboarding and
//! Stripe confirms the account live. Anything else degrades to a platform
//! charge tagged `DIRECT_FALLBACK`; Connect problems never fail checkout.

use super::api::{StripeAccount, StripeApi, StripeError};
use super::direct::{confirm_with, intent_for};
use crate::db::Store;
use crate::money::percent_of_minor;
use crate::payment::port::{
    PaymentConfirmation, PaymentError, PaymentOutcome, PaymentProvider, PaymentRequest,
    ProviderKind,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::ConnectStatus;
use shared::order::SettlementType;
use std::sync::Arc;

pub const DIRECT_FALLBACK_WARNING: &str =
    "Payment settled on the platform account; the restaurant payout must be handled manually";

/// Why a split was not possible
enum Route {
    Split(String),
    Fallback(&'static str),
}

pub struct StripeConnectProvider {
    api: Arc<dyn StripeApi>,
    store: Arc<dyn Store>,
    fee_percent: Decimal,
}

impl StripeConnectProvider {
    pub fn new(api: Arc<dyn StripeApi>, store: Arc<dyn Store>, fee_percent: Decimal) -> Self {
        Self {
            api,
            store,
            fee_percent,
        }
    }

    async fn route(&self, restaurant_id: &str) -> Result<Route, PaymentError> {
        let restaurant = self
            .store
            .restaurant(restaurant_id)
            .await
            .map_err(|e| PaymentError::Transient(format!("restaurant lookup failed: {e}")))?
            .ok_or_else(|| PaymentError::Unavailable(format!("unknown restaurant {restaurant_id}")))?;

        let Some(account_id) = restaurant.connect.split_candidate() else {
            return Ok(Route::Fallback("onboarding incomplete"));
        };

        match self.api.retrieve_account(account_id).await {
            Ok(account) if account.ready_for_split() => Ok(Route::Split(account.id)),
            Ok(account) => {
                self.record_flags(restaurant_id, &restaurant.connect, &account)
                    .await;
                Ok(Route::Fallback("connected account cannot accept charges"))
            }
            Err(StripeError::AccountUnavailable(id)) => {
                self.clear_stale_account(restaurant_id, &id).await;
                Ok(Route::Fallback("connected account unavailable"))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Store what Stripe reported for an account that is not ready
    async fn record_flags(&self, restaurant_id: &str, current: &ConnectStatus, account: &StripeAccount) {
        let status = ConnectStatus {
            stripe_account_id: current.stripe_account_id.clone(),
            onboarding_completed: account.ready_for_split(),
            charges_enabled: account.charges_enabled,
            payouts_enabled: account.payouts_enabled,
            details_submitted: account.details_submitted,
        };
        if status != *current
            && let Err(e) = self.store.save_connect_status(restaurant_id, &status).await
        {
            tracing::warn!(restaurant_id, error = %e, "Failed to store Connect flags");
        }
    }

    /// Self-heal: forget an account Stripe no longer recognises
    async fn clear_stale_account(&self, restaurant_id: &str, account_id: &str) {
        tracing::warn!(
            restaurant_id,
            account_id,
            "Connected account unavailable, clearing Connect state"
        );
        if let Err(e) = self
            .store
            .save_connect_status(restaurant_id, &ConnectStatus::default())
            .await
        {
            tracing::error!(restaurant_id, error = %e, "Failed to clear stale Connect account");
        }
    }

    async fn direct_fallback(
        &self,
        request: &PaymentRequest,
        reason: &str,
    ) -> Result<PaymentOutcome, PaymentError> {
        tracing::info!(
            order_id = %request.order_id,
            restaurant_id = %request.restaurant_id,
            reason,
            "Connect split not possible, charging platform account"
        );
        // The reason stays out of the intent: it can change between retries
        // that reuse the same idempotency key
        let params = intent_for(request, SettlementType::DirectFallback);
        let intent = self.api.create_payment_intent(&params).await?;
        Ok(PaymentOutcome {
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            redirect_url: None,
            settlement_type: SettlementType::DirectFallback,
            application_fee_minor: None,
            transfer_destination: None,
            warning: Some(DIRECT_FALLBACK_WARNING.to_string()),
        })
    }
}

#[async_trait]
impl PaymentProvider for StripeConnectProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    async fn process_payment(&self, request: &PaymentRequest) -> Result<PaymentOutcome, PaymentError> {
        let account_id = match self.route(&request.restaurant_id).await? {
            Route::Split(id) => id,
            Route::Fallback(reason) => return self.direct_fallback(request, reason).await,
        };

        let fee = percent_of_minor(request.amount_minor, self.fee_percent);
        let mut params = intent_for(request, SettlementType::ConnectSplit);
        params.application_fee_minor = Some(fee);
        params.transfer_destination = Some(account_id.clone());
        params
            .metadata
            .insert("connectedAccountId".into(), account_id.clone());
        params
            .metadata
            .insert("applicationFee".into(), fee.to_string());
        params.idempotency_key = format!("{}:{account_id}:{fee}", params.idempotency_key);

        match self.api.create_payment_intent(&params).await {
            Ok(intent) => Ok(PaymentOutcome {
                payment_intent_id: intent.id,
                client_secret: intent.client_secret,
                redirect_url: None,
                settlement_type: SettlementType::ConnectSplit,
                application_fee_minor: Some(fee),
                transfer_destination: Some(account_id),
                warning: None,
            }),
            Err(StripeError::AccountUnavailable(id)) => {
                self.clear_stale_account(&request.restaurant_id, &id).await;
                self.direct_fallback(request, "connected account unavailable")
                    .await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn confirm_payment(&self, intent_id: &str) -> Result<PaymentConfirmation, PaymentError> {
        confirm_with(self.api.as_ref(), intent_id).await
    }

    fn supported_payment_methods(&self, country: &str) -> Vec<&'static str> {
        super::payment_methods_for(country)
    }
}
