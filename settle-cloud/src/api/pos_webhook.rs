//! Inbound POS events
//!
//! POST /webhooks/pos/{restaurant_id}, signed with the restaurant's POS API key

use super::stripe_webhook::rejected;
use crate::pos::inbound::{self, PosEvent, SIGNATURE_HEADER};
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use serde_json::{Value, json};

pub async fn handle_event(
    State(state): State<AppState>,
    Path(restaurant_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let restaurant = match state.store.restaurant(&restaurant_id).await {
        Ok(Some(r)) => r,
        Ok(None) => {
            tracing::warn!(restaurant_id, "POS event for unknown restaurant");
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "received": false, "error": "unknown restaurant" })),
            );
        }
        Err(e) => {
            tracing::error!(restaurant_id, error = %e, "Failed to load restaurant for POS event");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "received": false })),
            );
        }
    };

    let Some((vendor, api_key)) = restaurant
        .settings
        .as_ref()
        .and_then(|s| s.pos_credentials())
    else {
        tracing::warn!(restaurant_id, "POS event for restaurant without POS integration");
        return rejected("pos not configured");
    };
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return rejected("missing signature");
    };
    if let Err(e) = inbound::verify_signature(&body, signature, api_key) {
        tracing::warn!(restaurant_id, error = e, "POS event signature verification failed");
        return rejected("invalid signature");
    }

    let event: PosEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(restaurant_id, %e, "Failed to parse POS event");
            return rejected("invalid payload");
        }
    };

    match inbound::handle_event(state.store.as_ref(), &restaurant.id, vendor, &event).await {
        Ok(outcome) => {
            tracing::info!(restaurant_id, kind = event.kind(), ?outcome, "POS event handled");
            (StatusCode::OK, Json(json!({ "received": true })))
        }
        Err(e) => {
            tracing::error!(restaurant_id, error = %e, "Failed to apply POS event");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "received": false })),
            )
        }
    }
}
