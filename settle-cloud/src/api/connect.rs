//! Stripe Connect onboarding endpoints

use super::ApiResult;
use crate::settlement::onboarding::{ConnectRefresh, OnboardingLink};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};

/// POST /api/restaurants/{id}/connect/onboarding
pub async fn start_onboarding(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<OnboardingLink> {
    Ok(Json(state.onboarding.start(&id).await?))
}

/// POST /api/restaurants/{id}/connect/refresh
pub async fn refresh_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ConnectRefresh> {
    Ok(Json(state.onboarding.refresh(&id).await?))
}
