//! PayTabs hosted payment page (redirect flow)

use crate::config::Config;
use crate::money::from_minor_units;
use crate::payment::port::{
    PaymentConfirmation, PaymentError, PaymentOutcome, PaymentProvider, PaymentRequest,
    ProviderKind,
};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use shared::order::SettlementType;

/// Currencies accepted by PayTabs profiles
const CURRENCIES: &[&str] = &[
    "AED", "SAR", "BHD", "KWD", "OMR", "QAR", "JOD", "EGP", "IQD", "USD", "EUR", "GBP",
];

/// PayTabs `response_status` meaning authorised
pub const STATUS_AUTHORISED: &str = "A";

pub struct PayTabsProvider {
    http: reqwest::Client,
    base: String,
    profile_id: Option<String>,
    server_key: Option<String>,
    public_base_url: String,
}

impl PayTabsProvider {
    pub fn new(
        http: reqwest::Client,
        base: &str,
        profile_id: Option<String>,
        server_key: Option<String>,
        public_base_url: &str,
    ) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            profile_id: profile_id.filter(|s| !s.is_empty()),
            server_key: server_key.filter(|s| !s.is_empty()),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config, http: reqwest::Client) -> Self {
        Self::new(
            http,
            &config.paytabs_api_base,
            config.paytabs_profile_id.clone(),
            config.paytabs_server_key.clone(),
            &config.public_base_url,
        )
    }

    fn credentials(&self) -> Result<(&str, &str), PaymentError> {
        match (self.profile_id.as_deref(), self.server_key.as_deref()) {
            (Some(profile), Some(key)) => Ok((profile, key)),
            _ => Err(PaymentError::Unavailable(
                "PayTabs credentials are not configured".into(),
            )),
        }
    }

    /// Hosted page request; `cart_amount` is the exact decimal as a string
    fn payment_request_body(&self, profile_id: &str, request: &PaymentRequest) -> Value {
        let amount = from_minor_units(request.amount_minor, &request.currency);
        json!({
            "profile_id": profile_id,
            "tran_type": "sale",
            "tran_class": "ecom",
            "cart_id": request.order_id,
            "cart_currency": request.currency,
            "cart_amount": amount.to_string(),
            "cart_description": format!("Order {}", request.order_number),
            "callback": format!("{}/webhooks/paytabs", self.public_base_url),
            "return": format!("{}/orders/{}/return", self.public_base_url, request.order_id),
            "user_defined": {
                "udf1": request.order_id,
                "udf2": request.restaurant_id,
                "udf3": request.order_number,
            },
        })
    }

    async fn call(&self, path: &str, server_key: &str, body: &Value) -> Result<Value, PaymentError> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base))
            .header("authorization", server_key)
            .json(body)
            .send()
            .await
            .map_err(|e| PaymentError::Transient(e.to_string()))?;
        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| PaymentError::Transient(format!("unreadable PayTabs response: {e}")))?;

        if status.is_success() {
            return Ok(body);
        }
        let message = body["message"].as_str().unwrap_or("unknown error").to_string();
        Err(match status.as_u16() {
            401 | 403 => PaymentError::Unavailable(format!("PayTabs rejected credentials: {message}")),
            429 | 500..=599 => PaymentError::Transient(message),
            _ => PaymentError::Declined(message),
        })
    }
}

#[async_trait]
impl PaymentProvider for PayTabsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::PayTabs
    }

    fn supports_currency(&self, currency: &str) -> bool {
        CURRENCIES.contains(&currency.to_ascii_uppercase().as_str())
    }

    async fn process_payment(&self, request: &PaymentRequest) -> Result<PaymentOutcome, PaymentError> {
        let (profile_id, server_key) = self.credentials()?;
        let body = self.payment_request_body(profile_id, request);
        let resp = self.call("/payment/request", server_key, &body).await?;

        let (Some(tran_ref), Some(redirect)) = (resp["tran_ref"].as_str(), resp["redirect_url"].as_str())
        else {
            return Err(PaymentError::Declined(format!(
                "PayTabs returned no redirect: {resp}"
            )));
        };
        Ok(PaymentOutcome {
            payment_intent_id: tran_ref.to_string(),
            client_secret: None,
            redirect_url: Some(redirect.to_string()),
            settlement_type: SettlementType::Redirect,
            application_fee_minor: None,
            transfer_destination: None,
            warning: None,
        })
    }

    async fn confirm_payment(&self, intent_id: &str) -> Result<PaymentConfirmation, PaymentError> {
        let (profile_id, server_key) = self.credentials()?;
        let resp = self
            .call(
                "/payment/query",
                server_key,
                &json!({ "profile_id": profile_id, "tran_ref": intent_id }),
            )
            .await?;
        let status = resp["payment_result"]["response_status"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let currency = resp["cart_currency"].as_str().map(String::from);
        let amount_minor = currency.as_deref().and_then(|c| callback_amount_minor(&resp, c));
        Ok(PaymentConfirmation {
            succeeded: status == STATUS_AUTHORISED,
            status,
            amount_minor,
            currency,
        })
    }

    fn supported_payment_methods(&self, country: &str) -> Vec<&'static str> {
        let mut methods = vec!["card", "apple_pay"];
        match country.to_ascii_uppercase().as_str() {
            "SA" => methods.push("mada"),
            "KW" => methods.push("knet"),
            "BH" => methods.push("benefit"),
            "OM" => methods.push("omannet"),
            "EG" => methods.push("meeza"),
            _ => {}
        }
        methods
    }
}

/// `cart_amount` / `tran_total` of a PayTabs payload in minor units
pub fn callback_amount_minor(payload: &Value, currency: &str) -> Option<i64> {
    let raw = &payload["tran_total"];
    let raw = if raw.is_null() { &payload["cart_amount"] } else { raw };
    let amount: rust_decimal::Decimal = match raw {
        Value::String(s) => s.parse().ok()?,
        Value::Number(n) => n.to_string().parse().ok()?,
        _ => return None,
    };
    crate::money::to_minor_units(amount, currency)
}

/// Verify the `signature` header of a PayTabs callback (HMAC-SHA256 of the raw body)
pub fn verify_callback_signature(
    payload: &[u8],
    signature: &str,
    server_key: &str,
) -> Result<(), &'static str> {
    let sig_bytes = hex::decode(signature.trim()).map_err(|_| "Invalid signature hex")?;
    let mut mac =
        Hmac::<Sha256>::new_from_slice(server_key.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(payload);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "Callback signature mismatch")
}
