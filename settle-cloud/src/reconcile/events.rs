//! Provider callback payloads normalised into reconciler events

use crate::payment::paytabs::{STATUS_AUTHORISED, callback_amount_minor};
use crate::payment::stripe::StripeAccount;
use serde_json::Value;
use shared::models::SubscriptionInfo;

/// Identity of a payment referenced by a callback
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaymentSignal {
    /// Provider intent / transaction reference
    pub intent_id: String,
    /// `metadata.orderId`: an order id or a human order number
    pub order_ref: Option<String>,
    pub restaurant_id: Option<String>,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub provider: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    PaymentSucceeded(PaymentSignal),
    PaymentFailed(PaymentSignal),
    Refunded { intent_id: String },
    AccountUpdated(StripeAccount),
    SubscriptionChanged {
        customer_id: Option<String>,
        subscription: SubscriptionInfo,
    },
    /// Acknowledged without action
    Ignored,
}

/// A parsed, not yet applied callback
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// De-duplication key
    pub id: String,
    pub kind: String,
    pub event: ProviderEvent,
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v[key].as_str().filter(|s| !s.is_empty()).map(String::from)
}

fn stripe_signal(object: &Value, intent_key: &str) -> Option<PaymentSignal> {
    let metadata = &object["metadata"];
    Some(PaymentSignal {
        intent_id: str_field(object, intent_key)?,
        order_ref: str_field(metadata, "orderId"),
        restaurant_id: str_field(metadata, "restaurantId"),
        amount_minor: object["amount_received"]
            .as_i64()
            .or_else(|| object["amount_total"].as_i64())
            .or_else(|| object["amount"].as_i64()),
        currency: str_field(object, "currency").map(|c| c.to_ascii_uppercase()),
        provider: "stripe",
    })
}

/// Parse a verified Stripe event body
pub fn parse_stripe_event(payload: &[u8]) -> Result<InboundEvent, serde_json::Error> {
    let event: Value = serde_json::from_slice(payload)?;
    let id = event["id"].as_str().unwrap_or_default().to_string();
    let kind = event["type"].as_str().unwrap_or_default().to_string();
    let object = &event["data"]["object"];

    let parsed = match kind.as_str() {
        "payment_intent.succeeded" => stripe_signal(object, "id").map(ProviderEvent::PaymentSucceeded),
        "checkout.session.completed" if object["mode"].as_str() != Some("subscription") => {
            stripe_signal(object, "payment_intent").map(ProviderEvent::PaymentSucceeded)
        }
        "payment_intent.payment_failed" => stripe_signal(object, "id").map(ProviderEvent::PaymentFailed),
        // Partial refunds leave the order paid
        "charge.refunded" if object["refunded"].as_bool() == Some(true) => {
            str_field(object, "payment_intent").map(|intent_id| ProviderEvent::Refunded { intent_id })
        }
        "account.updated" => StripeAccount::from_json(object).map(ProviderEvent::AccountUpdated),
        "customer.subscription.updated" | "customer.subscription.deleted" => {
            str_field(object, "id").map(|subscription_id| ProviderEvent::SubscriptionChanged {
                customer_id: str_field(object, "customer"),
                subscription: SubscriptionInfo {
                    subscription_id,
                    status: if kind == "customer.subscription.deleted" {
                        "canceled".to_string()
                    } else {
                        str_field(object, "status").unwrap_or_default()
                    },
                    // Stripe sends seconds; we store millis
                    current_period_end: object["current_period_end"]
                        .as_i64()
                        .and_then(|s| s.checked_mul(1000)),
                    cancel_at_period_end: object["cancel_at_period_end"].as_bool().unwrap_or(false),
                },
            })
        }
        _ => None,
    };

    Ok(InboundEvent {
        id,
        kind,
        event: parsed.unwrap_or(ProviderEvent::Ignored),
    })
}

/// Parse a verified PayTabs callback body
///
/// PayTabs has no event id; the transaction reference plus result status is
/// unique per outcome.
pub fn parse_paytabs_callback(payload: &[u8]) -> Result<InboundEvent, serde_json::Error> {
    let body: Value = serde_json::from_slice(payload)?;
    let tran_ref = str_field(&body, "tran_ref").unwrap_or_default();
    let status = body["payment_result"]["response_status"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let currency = str_field(&body, "cart_currency").map(|c| c.to_ascii_uppercase());

    let signal = PaymentSignal {
        intent_id: tran_ref.clone(),
        order_ref: str_field(&body["user_defined"], "udf1").or_else(|| str_field(&body, "cart_id")),
        restaurant_id: str_field(&body["user_defined"], "udf2"),
        amount_minor: currency
            .as_deref()
            .and_then(|c| callback_amount_minor(&body, c)),
        currency,
        provider: "paytabs",
    };

    let event = if tran_ref.is_empty() || status.is_empty() {
        ProviderEvent::Ignored
    } else if status == STATUS_AUTHORISED {
        ProviderEvent::PaymentSucceeded(signal)
    } else {
        ProviderEvent::PaymentFailed(signal)
    };

    Ok(InboundEvent {
        id: format!("paytabs:{tran_ref}:{status}"),
        kind: format!("paytabs.{}", if status.is_empty() { "unknown" } else { status.as_str() }),
        event,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stripe(kind: &str, object: Value) -> InboundEvent {
        let body = json!({ "id": "evt_1", "type": kind, "data": { "object": object } });
        parse_stripe_event(body.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_payment_intent_succeeded() {
        let e = stripe(
            "payment_intent.succeeded",
            json!({ "id": "pi_1", "amount_received": 5000, "currency": "eur",
                    "metadata": { "orderId": "ORD-00007", "restaurantId": "r1" } }),
        );
        assert_eq!(e.id, "evt_1");
        let ProviderEvent::PaymentSucceeded(signal) = e.event else {
            panic!("expected success");
        };
        assert_eq!(signal.intent_id, "pi_1");
        assert_eq!(signal.order_ref.as_deref(), Some("ORD-00007"));
        assert_eq!(signal.amount_minor, Some(5000));
        assert_eq!(signal.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_checkout_session_uses_payment_intent() {
        let e = stripe(
            "checkout.session.completed",
            json!({ "id": "cs_1", "mode": "payment", "payment_intent": "pi_9", "metadata": {} }),
        );
        assert!(matches!(e.event, ProviderEvent::PaymentSucceeded(ref s) if s.intent_id == "pi_9"));

        let e = stripe("checkout.session.completed", json!({ "id": "cs_2", "mode": "subscription" }));
        assert_eq!(e.event, ProviderEvent::Ignored);
    }

    #[test]
    fn test_refund_and_subscription() {
        let e = stripe("charge.refunded", json!({ "payment_intent": "pi_1", "refunded": true }));
        assert_eq!(e.event, ProviderEvent::Refunded { intent_id: "pi_1".into() });
        let e = stripe("charge.refunded", json!({ "payment_intent": "pi_1", "refunded": false }));
        assert_eq!(e.event, ProviderEvent::Ignored);

        let e = stripe(
            "customer.subscription.deleted",
            json!({ "id": "sub_1", "customer": "cus_1", "status": "active", "current_period_end": 1700000000 }),
        );
        let ProviderEvent::SubscriptionChanged { customer_id, subscription } = e.event else {
            panic!("expected subscription change");
        };
        assert_eq!(customer_id.as_deref(), Some("cus_1"));
        assert_eq!(subscription.status, "canceled");
        assert_eq!(subscription.current_period_end, Some(1_700_000_000_000));
    }

    #[test]
    fn test_out_of_range_period_end_is_dropped() {
        let e = stripe(
            "customer.subscription.updated",
            json!({ "id": "sub_1", "status": "active", "current_period_end": i64::MAX }),
        );
        let ProviderEvent::SubscriptionChanged { subscription, .. } = e.event else {
            panic!("expected subscription change");
        };
        assert_eq!(subscription.status, "active");
        assert_eq!(subscription.current_period_end, None);
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        assert_eq!(stripe("invoice.paid", json!({})).event, ProviderEvent::Ignored);
        assert!(parse_stripe_event(b"not json").is_err());
    }

    #[test]
    fn test_paytabs_callback() {
        let body = json!({
            "tran_ref": "TST2", "cart_id": "o1", "cart_currency": "aed", "tran_total": "50.00",
            "payment_result": { "response_status": "A" },
            "user_defined": { "udf1": "o1", "udf2": "r1" }
        });
        let e = parse_paytabs_callback(body.to_string().as_bytes()).unwrap();
        assert_eq!(e.id, "paytabs:TST2:A");
        let ProviderEvent::PaymentSucceeded(signal) = e.event else {
            panic!("expected success");
        };
        assert_eq!(signal.provider, "paytabs");
        assert_eq!(signal.amount_minor, Some(5000));

        let declined = json!({ "tran_ref": "TST3", "payment_result": { "response_status": "D" } });
        let e = parse_paytabs_callback(declined.to_string().as_bytes()).unwrap();
        assert!(matches!(e.event, ProviderEvent::PaymentFailed(_)));
    }
}
