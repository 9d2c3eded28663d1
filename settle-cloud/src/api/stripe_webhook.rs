//! Stripe webhook handler
//!
//! POST /webhooks/stripe (raw body, needed for signature verification)

use crate::payment::stripe;
use crate::reconcile::events::parse_stripe_event;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde_json::{Value, json};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verify, parse and reconcile a Stripe event
///
/// 400 when the event cannot be trusted or read, 500 when applying it failed
/// (Stripe retries), 200 otherwise, including duplicates.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let Some(sig_header) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        tracing::warn!("Missing Stripe-Signature header");
        return rejected("missing signature");
    };

    if let Err(e) = stripe::verify_webhook_signature(
        &body,
        sig_header,
        &state.config.stripe_webhook_secret,
        chrono::Utc::now().timestamp(),
    ) {
        tracing::warn!(error = e, "Webhook signature verification failed");
        return rejected("invalid signature");
    }

    let inbound = match parse_stripe_event(&body) {
        Ok(inbound) => inbound,
        Err(e) => {
            tracing::warn!(%e, "Failed to parse webhook JSON");
            return rejected("invalid payload");
        }
    };
    tracing::info!(event_id = %inbound.id, event_type = %inbound.kind, "Received Stripe webhook");

    match state.reconciler.handle("stripe", &inbound).await {
        Ok(outcome) => {
            tracing::debug!(event_id = %inbound.id, ?outcome, "Stripe webhook reconciled");
            (StatusCode::OK, Json(json!({ "received": true })))
        }
        Err(e) => {
            tracing::error!(event_id = %inbound.id, error = %e, "Failed to apply Stripe webhook");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "received": false })),
            )
        }
    }
}

pub(crate) fn rejected(reason: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "received": false, "error": reason })),
    )
}
