//! Application-layer rate limiting for webhook routes
//!
//! Fixed one-minute windows keyed by the request's signature header (so a
//! replayed payload is throttled), falling back to the client IP. Runs
//! before any handler, so a limited request never touches the store.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Headers that carry a webhook signature, in lookup order
const SIGNATURE_HEADERS: &[&str] = &["stripe-signature", "signature", "x-pos-signature"];

const WINDOW_SECS: u64 = 60;

struct KeyEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    /// route name -> (key -> entry)
    inner: Arc<Mutex<HashMap<&'static str, HashMap<String, KeyEntry>>>>,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(max_requests: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
        }
    }

    /// Returns `true` if the request is allowed, `false` if rate-limited.
    pub async fn check(&self, route: &'static str, key: &str) -> bool {
        let mut map = self.inner.lock().await;
        let route_map = map.entry(route).or_default();
        let now = Instant::now();

        let entry = route_map.entry(key.to_owned()).or_insert_with(|| KeyEntry {
            count: 0,
            window_start: now,
        });

        // Reset window if expired
        if now.duration_since(entry.window_start).as_secs() >= WINDOW_SECS {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;
        entry.count <= self.max_requests
    }

    /// Remove entries older than 5 minutes
    pub async fn cleanup(&self) {
        let mut map = self.inner.lock().await;
        let cutoff = std::time::Duration::from_secs(300);
        let now = Instant::now();

        for route_map in map.values_mut() {
            route_map.retain(|_, entry| now.duration_since(entry.window_start) < cutoff);
        }

        // Remove empty route maps
        map.retain(|_, route_map| !route_map.is_empty());
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.inner.lock().await.values().map(HashMap::len).sum()
    }
}

/// Extract client IP: X-Forwarded-For header first (load balancer), then peer address.
fn extract_ip(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
    {
        // X-Forwarded-For can be comma-separated; first entry is the original client
        if let Some(first) = val.split(',').next() {
            let ip = first.trim();
            if !ip.is_empty() {
                return ip.to_owned();
            }
        }
    }

    // Fallback: peer address from extensions (ConnectInfo)
    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Signature header value, else client IP
fn limit_key(request: &Request) -> String {
    SIGNATURE_HEADERS
        .iter()
        .find_map(|name| {
            request
                .headers()
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(|v| format!("sig:{v}"))
        })
        .unwrap_or_else(|| format!("ip:{}", extract_ip(request)))
}

fn route_name(path: &str) -> &'static str {
    if path.starts_with("/webhooks/stripe") {
        "stripe"
    } else if path.starts_with("/webhooks/paytabs") {
        "paytabs"
    } else if path.starts_with("/webhooks/pos") {
        "pos"
    } else {
        "other"
    }
}

/// Rate limit middleware for provider and POS webhooks
pub async fn webhook_rate_limit(
    State(state): State<crate::state::AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let route = route_name(request.uri().path());
    let key = limit_key(&request);
    if !state.rate_limiter.check(route, &key).await {
        tracing::warn!(route, "Webhook rate limit exceeded");
        return Err(AppError::rate_limited().into_response());
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[tokio::test]
    async fn test_window_limit_per_key() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.check("stripe", "sig:a").await);
        assert!(limiter.check("stripe", "sig:a").await);
        assert!(!limiter.check("stripe", "sig:a").await);
        // Other keys and routes have their own windows
        assert!(limiter.check("stripe", "sig:b").await);
        assert!(limiter.check("pos", "sig:a").await);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_fresh_entries() {
        let limiter = RateLimiter::new(10);
        limiter.check("stripe", "k").await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked().await, 1);
    }

    #[test]
    fn test_limit_key_prefers_signature() {
        let req = Request::builder()
            .uri("/webhooks/stripe")
            .header("stripe-signature", "t=1,v1=ab")
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(limit_key(&req), "sig:t=1,v1=ab");

        let req = Request::builder()
            .uri("/webhooks/pos/r1")
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(limit_key(&req), "ip:10.0.0.1");
        assert_eq!(route_name("/webhooks/pos/r1"), "pos");
    }
}
