//! Scheduled job triggers

use super::ApiResult;
use crate::auth;
use crate::error::ServiceError;
use crate::pos::sync_job::{SyncReport, run_menu_sync};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

/// POST /cron/pos-sync
pub async fn pos_sync(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<SyncReport> {
    auth::require_cron(&headers, &state.config)?;
    let report = run_menu_sync(
        state.store.as_ref(),
        state.pos.as_ref(),
        state.config.pos_sync_concurrency,
    )
    .await
    .map_err(ServiceError::from)?;
    Ok(Json(report))
}
