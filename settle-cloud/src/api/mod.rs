//! HTTP API for settle-cloud

pub mod connect;
pub mod cron;
pub mod health;
pub mod orders;
pub mod paytabs_webhook;
pub mod pos_webhook;
pub mod settlement;
pub mod stripe_webhook;

use crate::auth::rate_limit::webhook_rate_limit;
use crate::error::ServiceError;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use shared::error::AppError;
use tower_http::trace::TraceLayer;

pub type ApiResult<T> = Result<Json<T>, ServiceError>;

/// Malformed or mistyped JSON bodies are client errors (400), not 422
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::invalid_request(e.body_text()))
}

pub fn create_router(state: AppState) -> Router {
    let webhooks = Router::new()
        .route("/webhooks/stripe", post(stripe_webhook::handle_webhook))
        .route("/webhooks/paytabs", post(paytabs_webhook::handle_callback))
        .route("/webhooks/pos/{restaurant_id}", post(pos_webhook::handle_event))
        .layer(middleware::from_fn_with_state(state.clone(), webhook_rate_limit));

    let api = Router::new()
        .route("/api/restaurants/{restaurant}/orders", post(orders::create_order))
        .route(
            "/api/orders/{id}",
            get(orders::get_order)
                .delete(orders::delete_order)
                .patch(orders::update_order),
        )
        .route("/api/orders/{id}/settle", post(settlement::settle))
        .route("/api/orders/{id}/confirm-payment", post(settlement::confirm_payment))
        .route(
            "/api/restaurants/{id}/connect/onboarding",
            post(connect::start_onboarding),
        )
        .route("/api/restaurants/{id}/connect/refresh", post(connect::refresh_status))
        .route("/cron/pos-sync", post(cron::pos_sync));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(api)
        .merge(webhooks)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
