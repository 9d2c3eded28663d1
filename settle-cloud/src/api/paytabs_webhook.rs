//! PayTabs callback handler
//!
//! POST /webhooks/paytabs, signed with the profile's server key

use super::stripe_webhook::rejected;
use crate::payment::paytabs::verify_callback_signature;
use crate::reconcile::events::parse_paytabs_callback;
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde_json::{Value, json};

pub const SIGNATURE_HEADER: &str = "signature";

pub async fn handle_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let Some(server_key) = state.config.paytabs_server_key.as_deref() else {
        tracing::warn!("PayTabs callback received but PAYTABS_SERVER_KEY is not set");
        return rejected("paytabs not configured");
    };
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        tracing::warn!("Missing PayTabs signature header");
        return rejected("missing signature");
    };
    if let Err(e) = verify_callback_signature(&body, signature, server_key) {
        tracing::warn!(error = e, "PayTabs callback signature verification failed");
        return rejected("invalid signature");
    }

    let inbound = match parse_paytabs_callback(&body) {
        Ok(inbound) => inbound,
        Err(e) => {
            tracing::warn!(%e, "Failed to parse PayTabs callback");
            return rejected("invalid payload");
        }
    };
    tracing::info!(event_id = %inbound.id, kind = %inbound.kind, "Received PayTabs callback");

    match state.reconciler.handle("paytabs", &inbound).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "received": true }))),
        Err(e) => {
            tracing::error!(event_id = %inbound.id, error = %e, "Failed to apply PayTabs callback");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "received": false })),
            )
        }
    }
}
