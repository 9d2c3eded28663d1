//! Settlement endpoints: create a provider payment, confirm it

use super::ApiResult;
use crate::settlement::{ConfirmResponse, SettleRequest, SettlementResponse};
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use shared::error::AppError;

/// POST /api/orders/{id}/settle, body optional
pub async fn settle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<SettlementResponse> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        SettleRequest::default()
    } else {
        serde_json::from_slice::<SettleRequest>(&body)
            .map_err(|e| AppError::invalid_request(format!("Invalid settle request: {e}")))?
    };
    Ok(Json(state.settlement.settle(&id, &request).await?))
}

/// POST /api/orders/{id}/confirm-payment
pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ConfirmResponse> {
    Ok(Json(state.settlement.confirm(&id, &state.reconciler).await?))
}
