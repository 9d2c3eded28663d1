//! Request authorization helpers: webhook rate limiting, cron bearer token
//! and the status override capability

pub mod rate_limit;

use crate::config::Config;
use crate::orders::UpdateCapabilities;
use axum::http::HeaderMap;
use shared::error::AppError;

/// Header granting the status override capability
pub const OVERRIDE_TOKEN_HEADER: &str = "x-override-token";

/// Compare secrets without short-circuiting on the first differing byte
fn secret_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Cron endpoints require `Authorization: Bearer <CRON_SECRET>` in production
pub fn require_cron(headers: &HeaderMap, config: &Config) -> Result<(), AppError> {
    if !config.is_production() {
        return Ok(());
    }
    match bearer(headers) {
        Some(token) if secret_eq(token, &config.cron_secret) => Ok(()),
        Some(_) => Err(AppError::permission_denied("Invalid cron token")),
        None => Err(AppError::not_authenticated()),
    }
}

/// Capabilities granted by the request headers
pub fn capabilities(headers: &HeaderMap, config: &Config) -> UpdateCapabilities {
    let status_override = headers
        .get(OVERRIDE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|token| {
            !config.status_override_token.is_empty()
                && secret_eq(token, &config.status_override_token)
        });
    UpdateCapabilities { status_override }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_override_capability() {
        let config = Config::default();
        let mut headers = HeaderMap::new();
        assert!(!capabilities(&headers, &config).status_override);

        headers.insert(OVERRIDE_TOKEN_HEADER, HeaderValue::from_static("wrong"));
        assert!(!capabilities(&headers, &config).status_override);

        headers.insert(
            OVERRIDE_TOKEN_HEADER,
            HeaderValue::from_str(&config.status_override_token).unwrap(),
        );
        assert!(capabilities(&headers, &config).status_override);
    }

    #[test]
    fn test_cron_token_enforced_in_production() {
        let config = Config {
            environment: "production".into(),
            cron_secret: "s3cret".into(),
            ..Config::default()
        };
        let mut headers = HeaderMap::new();
        assert!(require_cron(&headers, &config).is_err());
        headers.insert("authorization", HeaderValue::from_static("Bearer nope"));
        assert!(require_cron(&headers, &config).is_err());
        headers.insert("authorization", HeaderValue::from_static("Bearer s3cret"));
        assert!(require_cron(&headers, &config).is_ok());

        assert!(require_cron(&HeaderMap::new(), &Config::default()).is_ok());
    }
}
