//! Stripe integration via REST API (no SDK dependency)

mod api;
mod connect;
mod direct;

pub use api::{
    AccountLink, CreateIntent, PaymentIntent, StripeAccount, StripeApi, StripeError,
    StripeRestClient,
};
pub use connect::{DIRECT_FALLBACK_WARNING, StripeConnectProvider};
pub use direct::StripeDirectProvider;

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Max age of a signed webhook payload, in seconds
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Card-family methods Stripe offers for a country
pub fn payment_methods_for(country: &str) -> Vec<&'static str> {
    let mut methods = vec!["card", "apple_pay", "google_pay"];
    match country.to_ascii_uppercase().as_str() {
        "NL" => methods.push("ideal"),
        "BE" => methods.push("bancontact"),
        "PL" => methods.push("blik"),
        "AT" | "DE" => methods.push("eps"),
        _ => {}
    }
    methods
}

/// Verify Stripe webhook signature (HMAC-SHA256)
///
/// Accepts any of the `v1=` entries, so secret rotation keeps working.
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now_secs: i64,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    if timestamp.is_empty() || signatures.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Constant-time comparison via hmac::verify_slice
    let matched = signatures.iter().any(|sig| match hex::decode(sig) {
        Ok(bytes) => mac.clone().verify_slice(&bytes).is_ok(),
        Err(_) => false,
    });
    if !matched {
        return Err("Webhook signature mismatch");
    }

    // Reject events older than 5 minutes to prevent replay attacks
    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    if (now_secs - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err("Webhook timestamp too old");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &str, secret: &str, ts: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{ts}.{payload}").as_bytes());
        format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature() {
        let header = sign("{\"id\":\"evt_1\"}", "whsec", 1_700_000_000);
        assert!(
            verify_webhook_signature(b"{\"id\":\"evt_1\"}", &header, "whsec", 1_700_000_100)
                .is_ok()
        );
    }

    #[test]
    fn test_rotated_secret_second_entry() {
        let header = sign("{}", "new", 1_700_000_000);
        let header = header.replace("v1=", "v1=00ff,v1=");
        assert!(verify_webhook_signature(b"{}", &header, "new", 1_700_000_000).is_ok());
    }

    #[test]
    fn test_rejects_tampered_payload() {
        let header = sign("{\"amount\":100}", "whsec", 1_700_000_000);
        assert_eq!(
            verify_webhook_signature(b"{\"amount\":999}", &header, "whsec", 1_700_000_000),
            Err("Webhook signature mismatch")
        );
    }

    #[test]
    fn test_rejects_stale_timestamp() {
        let header = sign("{}", "whsec", 1_700_000_000);
        assert_eq!(
            verify_webhook_signature(b"{}", &header, "whsec", 1_700_000_301),
            Err("Webhook timestamp too old")
        );
    }

    #[test]
    fn test_rejects_malformed_header() {
        assert!(verify_webhook_signature(b"{}", "garbage", "whsec", 0).is_err());
        assert!(verify_webhook_signature(b"{}", "t=1", "whsec", 0).is_err());
    }

    #[test]
    fn test_payment_methods() {
        assert!(payment_methods_for("nl").contains(&"ideal"));
        assert_eq!(payment_methods_for("FR"), vec!["card", "apple_pay", "google_pay"]);
    }
}
