//! Stripe direct charges on the platform account

use super::api::{CreateIntent, StripeApi};
use crate::payment::port::{
    PaymentConfirmation, PaymentError, PaymentOutcome, PaymentProvider, PaymentRequest,
    ProviderKind,
};
use async_trait::async_trait;
use shared::order::SettlementType;
use std::sync::Arc;

/// Build the intent parameters shared by direct and Connect charges
pub(super) fn intent_for(request: &PaymentRequest, settlement: SettlementType) -> CreateIntent {
    let mut metadata = request.metadata.clone();
    metadata.insert("orderId".into(), request.order_id.clone());
    metadata.insert("orderNumber".into(), request.order_number.clone());
    metadata.insert("restaurantId".into(), request.restaurant_id.clone());
    metadata.insert("paymentType".into(), settlement.as_db().to_string());
    if request.tip_minor > 0 {
        metadata.insert("tipAmount".into(), request.tip_minor.to_string());
    }
    CreateIntent {
        amount_minor: request.amount_minor,
        currency: request.currency.clone(),
        metadata,
        application_fee_minor: None,
        transfer_destination: None,
        idempotency_key: format!(
            "{}:{}:{}",
            request.order_id,
            settlement.as_db(),
            request.amount_minor
        ),
    }
}

pub(super) async fn confirm_with(
    api: &dyn StripeApi,
    intent_id: &str,
) -> Result<PaymentConfirmation, PaymentError> {
    let intent = api.retrieve_payment_intent(intent_id).await?;
    Ok(PaymentConfirmation {
        succeeded: intent.status == "succeeded",
        status: intent.status,
        amount_minor: Some(intent.amount),
        currency: Some(intent.currency.to_ascii_uppercase()),
    })
}

pub struct StripeDirectProvider {
    api: Arc<dyn StripeApi>,
}

impl StripeDirectProvider {
    pub fn new(api: Arc<dyn StripeApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PaymentProvider for StripeDirectProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    async fn process_payment(&self, request: &PaymentRequest) -> Result<PaymentOutcome, PaymentError> {
        let intent = self
            .api
            .create_payment_intent(&intent_for(request, SettlementType::Direct))
            .await?;
        Ok(PaymentOutcome {
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            redirect_url: None,
            settlement_type: SettlementType::Direct,
            application_fee_minor: None,
            transfer_destination: None,
            warning: None,
        })
    }

    async fn confirm_payment(&self, intent_id: &str) -> Result<PaymentConfirmation, PaymentError> {
        confirm_with(self.api.as_ref(), intent_id).await
    }

    fn supported_payment_methods(&self, country: &str) -> Vec<&'static str> {
        super::payment_methods_for(country)
    }
}
