//! Liveness plus a view of which payment providers have credentials

use axum::Json;
use axum::extract::State;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = &state.config;
    Json(serde_json::json!({
        "status": "ok",
        "service": "settle-cloud",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": config.environment,
        "providers": {
            "stripe": config.stripe_secret_key.is_some(),
            "stripe_connect": config.stripe_connect_enabled,
            "paytabs": config.paytabs_profile_id.is_some() && config.paytabs_server_key.is_some(),
        },
        "pos_vendors": config.pos_endpoints.len(),
    }))
}
