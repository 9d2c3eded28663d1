//! Unified service-layer error type for settle-cloud
//!
//! `ServiceError` bridges store errors and the API-layer error (`AppError`),
//! so handlers and services can use `?` on both.

use crate::db::StoreError;
use crate::payment::PaymentError;
use crate::pos::PosError;
use crate::pricing::PricingError;
use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};
use shared::order::LifecycleError;

/// Service-layer error
///
/// - `Store`: persistence errors (logged, mapped to InternalError)
/// - `App`: business-rule errors (passed through to the client)
#[derive(Debug)]
pub enum ServiceError {
    Store(StoreError),
    App(AppError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        ServiceError::Store(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<PricingError> for ServiceError {
    fn from(e: PricingError) -> Self {
        ServiceError::App(e.into())
    }
}

impl From<LifecycleError> for ServiceError {
    fn from(e: LifecycleError) -> Self {
        ServiceError::App(e.into())
    }
}

impl From<PosError> for ServiceError {
    fn from(e: PosError) -> Self {
        ServiceError::App(e.into())
    }
}

impl From<PaymentError> for ServiceError {
    fn from(e: PaymentError) -> Self {
        ServiceError::App(e.into())
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Store(store_err) => {
                tracing::error!(error = %store_err, "Service store error");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Store(e) => write!(f, "{e}"),
            ServiceError::App(e) => write!(f, "{e}"),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;
