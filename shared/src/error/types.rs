//! AppError and the JSON error body it renders to

use super::category::ErrorCategory;
use super::codes::ErrorCode;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Error crossing the service boundary
///
/// The code decides the HTTP status; `details` carries the identifiers
/// a caller needs to act on it (order id, country, offending field).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<HashMap<String, Value>>,
}

impl AppError {
    /// Error with the code's default message
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            details: None,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn not_authenticated() -> Self {
        Self::new(ErrorCode::NotAuthenticated)
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::PermissionDenied, msg)
    }

    /// Malformed body or unknown request shape
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidRequest, msg)
    }

    pub fn rate_limited() -> Self {
        Self::new(ErrorCode::RateLimited)
    }

    pub fn order_not_found(order_id: impl Into<String>) -> Self {
        Self::new(ErrorCode::OrderNotFound).with_detail("order_id", order_id.into())
    }

    /// `key` is whatever the caller looked up by: id or slug
    pub fn restaurant_not_found(key: impl Into<String>) -> Self {
        Self::new(ErrorCode::RestaurantNotFound).with_detail("restaurant", key.into())
    }

    /// No payment provider could take the settlement for this region
    pub fn provider_unavailable(country: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderUnavailable).with_detail("country", country.into())
    }
}

/// Wire shape of every error response: `{code, message, details?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Value>>,
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code.code(),
            message: err.message.clone(),
            details: err.details.clone(),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.http_status();

        if self.code.category() == ErrorCategory::System {
            tracing::error!(code = %self.code, message = %self.message, "System error");
        }

        (status, axum::Json(ErrorBody::from(&self))).into_response()
    }
}
