//! Stripe REST client
//!
//! [`StripeApi`] is the seam the providers and Connect onboarding talk to;
//! [`StripeRestClient`] is the form-encoded HTTP implementation.

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::payment::port::PaymentError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StripeError {
    #[error("stripe secret key is not configured")]
    NotConfigured,

    /// Connected account was deleted, revoked or never belonged to this platform
    #[error("connected account {0} is unavailable")]
    AccountUnavailable(String),

    #[error("stripe rejected the request ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("stripe unreachable: {0}")]
    Network(String),
}

impl From<StripeError> for PaymentError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::NotConfigured => PaymentError::Unavailable(err.to_string()),
            StripeError::AccountUnavailable(_) => PaymentError::Unavailable(err.to_string()),
            StripeError::Network(msg) => PaymentError::Transient(msg),
            StripeError::Api { status, .. } if status == 429 || status >= 500 => {
                PaymentError::Transient(err.to_string())
            }
            StripeError::Api { status: 401, .. } => PaymentError::Unavailable(err.to_string()),
            StripeError::Api { message, .. } => PaymentError::Declined(message),
        }
    }
}

/// PaymentIntent creation parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateIntent {
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
    pub application_fee_minor: Option<i64>,
    pub transfer_destination: Option<String>,
    /// Sent as `Idempotency-Key`
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    fn from_json(v: &Value) -> Result<Self, StripeError> {
        let id = v["id"].as_str().ok_or_else(|| StripeError::Api {
            status: 200,
            code: None,
            message: format!("payment intent without id: {v}"),
        })?;
        Ok(Self {
            id: id.to_string(),
            client_secret: v["client_secret"].as_str().map(String::from),
            status: v["status"].as_str().unwrap_or_default().to_string(),
            amount: v["amount"].as_i64().unwrap_or_default(),
            currency: v["currency"].as_str().unwrap_or_default().to_string(),
            metadata: string_map(&v["metadata"]),
        })
    }
}

/// Connected account capability flags
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StripeAccount {
    pub id: String,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub details_submitted: bool,
}

impl StripeAccount {
    pub fn from_json(v: &Value) -> Option<Self> {
        Some(Self {
            id: v["id"].as_str()?.to_string(),
            charges_enabled: v["charges_enabled"].as_bool().unwrap_or(false),
            payouts_enabled: v["payouts_enabled"].as_bool().unwrap_or(false),
            details_submitted: v["details_submitted"].as_bool().unwrap_or(false),
        })
    }

    /// Stripe accepts split charges for this account
    pub fn ready_for_split(&self) -> bool {
        self.charges_enabled && self.details_submitted
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLink {
    pub url: String,
    pub expires_at: Option<i64>,
}

#[async_trait]
pub trait StripeApi: Send + Sync {
    async fn create_payment_intent(&self, req: &CreateIntent) -> Result<PaymentIntent, StripeError>;

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, StripeError>;

    async fn retrieve_account(&self, account_id: &str) -> Result<StripeAccount, StripeError>;

    async fn create_express_account(
        &self,
        country: &str,
        restaurant_id: &str,
    ) -> Result<StripeAccount, StripeError>;

    async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<AccountLink, StripeError>;

    /// Register a web domain for Apple Pay on the connected account
    async fn register_apple_pay_domain(
        &self,
        account_id: &str,
        domain: &str,
    ) -> Result<(), StripeError>;
}

pub struct StripeRestClient {
    http: reqwest::Client,
    base: String,
    secret_key: Option<String>,
}

impl StripeRestClient {
    pub fn new(http: reqwest::Client, base: &str, secret_key: Option<String>) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            secret_key: secret_key.filter(|k| !k.is_empty()),
        }
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, StripeError> {
        let key = self.secret_key.as_deref().ok_or(StripeError::NotConfigured)?;
        Ok(self
            .http
            .post(format!("{}{path}", self.base))
            .basic_auth(key, None::<&str>))
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, StripeError> {
        let key = self.secret_key.as_deref().ok_or(StripeError::NotConfigured)?;
        Ok(self
            .http
            .get(format!("{}{path}", self.base))
            .basic_auth(key, None::<&str>))
    }

    async fn send(req: RequestBuilder) -> Result<Value, StripeError> {
        let resp = req
            .send()
            .await
            .map_err(|e| StripeError::Network(e.to_string()))?;
        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| StripeError::Network(format!("unreadable response: {e}")))?;

        if status.is_success() {
            return Ok(body);
        }
        Err(StripeError::Api {
            status: status.as_u16(),
            code: body["error"]["code"].as_str().map(String::from),
            message: body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
        })
    }
}

/// Stripe answers 403/404 (or `account_invalid`) for accounts the platform no longer reaches
fn account_gone(err: &StripeError) -> bool {
    match err {
        StripeError::Api { status, code, .. } => {
            *status == StatusCode::NOT_FOUND.as_u16()
                || *status == StatusCode::FORBIDDEN.as_u16()
                || matches!(
                    code.as_deref(),
                    Some("account_invalid") | Some("resource_missing")
                )
        }
        _ => false,
    }
}

fn string_map(v: &Value) -> HashMap<String, String> {
    v.as_object()
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl StripeApi for StripeRestClient {
    async fn create_payment_intent(&self, req: &CreateIntent) -> Result<PaymentIntent, StripeError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), req.amount_minor.to_string()),
            ("currency".into(), req.currency.to_ascii_lowercase()),
            ("automatic_payment_methods[enabled]".into(), "true".into()),
        ];
        for (k, v) in &req.metadata {
            form.push((format!("metadata[{k}]"), v.clone()));
        }
        if let Some(fee) = req.application_fee_minor {
            form.push(("application_fee_amount".into(), fee.to_string()));
        }
        if let Some(dest) = &req.transfer_destination {
            form.push(("transfer_data[destination]".into(), dest.clone()));
        }

        let builder = self
            .post("/v1/payment_intents")?
            .header("Idempotency-Key", &req.idempotency_key)
            .form(&form);
        match Self::send(builder).await {
            Ok(body) => PaymentIntent::from_json(&body),
            Err(e) if req.transfer_destination.is_some() && account_gone(&e) => Err(
                StripeError::AccountUnavailable(req.transfer_destination.clone().unwrap_or_default()),
            ),
            Err(e) => Err(e),
        }
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, StripeError> {
        let body = Self::send(self.get(&format!("/v1/payment_intents/{intent_id}"))?).await?;
        PaymentIntent::from_json(&body)
    }

    async fn retrieve_account(&self, account_id: &str) -> Result<StripeAccount, StripeError> {
        match Self::send(self.get(&format!("/v1/accounts/{account_id}"))?).await {
            Ok(body) => StripeAccount::from_json(&body)
                .ok_or_else(|| StripeError::AccountUnavailable(account_id.to_string())),
            Err(e) if account_gone(&e) => Err(StripeError::AccountUnavailable(account_id.to_string())),
            Err(e) => Err(e),
        }
    }

    async fn create_express_account(
        &self,
        country: &str,
        restaurant_id: &str,
    ) -> Result<StripeAccount, StripeError> {
        let builder = self.post("/v1/accounts")?.form(&[
            ("type", "express"),
            ("country", country),
            ("capabilities[card_payments][requested]", "true"),
            ("capabilities[transfers][requested]", "true"),
            ("metadata[restaurantId]", restaurant_id),
        ]);
        let body = Self::send(builder).await?;
        StripeAccount::from_json(&body).ok_or_else(|| StripeError::Api {
            status: 200,
            code: None,
            message: format!("account without id: {body}"),
        })
    }

    async fn create_account_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<AccountLink, StripeError> {
        let builder = self.post("/v1/account_links")?.form(&[
            ("account", account_id),
            ("refresh_url", refresh_url),
            ("return_url", return_url),
            ("type", "account_onboarding"),
        ]);
        let body = Self::send(builder).await?;
        let url = body["url"].as_str().ok_or_else(|| StripeError::Api {
            status: 200,
            code: None,
            message: format!("account link without url: {body}"),
        })?;
        Ok(AccountLink {
            url: url.to_string(),
            expires_at: body["expires_at"].as_i64(),
        })
    }

    async fn register_apple_pay_domain(
        &self,
        account_id: &str,
        domain: &str,
    ) -> Result<(), StripeError> {
        let builder = self
            .post("/v1/apple_pay/domains")?
            .header("Stripe-Account", account_id)
            .form(&[("domain_name", domain)]);
        Self::send(builder).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let transient = StripeError::Api {
            status: 503,
            code: None,
            message: "down".into(),
        };
        assert!(matches!(PaymentError::from(transient), PaymentError::Transient(_)));
        assert!(matches!(
            PaymentError::from(StripeError::Network("reset".into())),
            PaymentError::Transient(_)
        ));
        assert!(matches!(
            PaymentError::from(StripeError::NotConfigured),
            PaymentError::Unavailable(_)
        ));
        let declined = StripeError::Api {
            status: 402,
            code: Some("card_declined".into()),
            message: "Your card was declined.".into(),
        };
        assert_eq!(
            PaymentError::from(declined),
            PaymentError::Declined("Your card was declined.".into())
        );
    }

    #[test]
    fn test_account_gone() {
        let missing = StripeError::Api {
            status: 400,
            code: Some("account_invalid".into()),
            message: String::new(),
        };
        assert!(account_gone(&missing));
        assert!(!account_gone(&StripeError::Network("x".into())));
    }

    #[test]
    fn test_parse_intent_and_account() {
        let v = serde_json::json!({
            "id": "pi_1", "client_secret": "pi_1_secret", "status": "requires_payment_method",
            "amount": 5000, "currency": "eur", "metadata": { "orderId": "o1" }
        });
        let pi = PaymentIntent::from_json(&v).unwrap();
        assert_eq!(pi.metadata.get("orderId").map(String::as_str), Some("o1"));
        assert_eq!(pi.amount, 5000);

        let acct = StripeAccount::from_json(&serde_json::json!({
            "id": "acct_1", "charges_enabled": true, "details_submitted": false
        }))
        .unwrap();
        assert!(!acct.ready_for_split());
    }

    #[test]
    fn test_client_without_key_is_not_configured() {
        let client = StripeRestClient::new(reqwest::Client::new(), "https://api.stripe.com/", None);
        assert_eq!(client.base, "https://api.stripe.com");
        assert!(matches!(client.post("/v1/x"), Err(StripeError::NotConfigured)));
    }
}
