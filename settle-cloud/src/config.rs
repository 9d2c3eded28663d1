//! Settlement service configuration

use crate::pricing::UnknownItemPolicy;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Settlement service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL, or `memory` for the in-process store
    pub database_url: String,
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// Public URL of this service (Connect return links, PayTabs callbacks)
    pub public_base_url: String,
    /// Stripe secret key; absent means Stripe is unavailable
    pub stripe_secret_key: Option<String>,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    /// Route card payments through the restaurant's Connect account when ready
    pub stripe_connect_enabled: bool,
    /// Platform cut on Connect split payments, in percent
    pub platform_fee_percent: Decimal,
    /// PayTabs profile id; absent means PayTabs is unavailable
    pub paytabs_profile_id: Option<String>,
    /// PayTabs server key (API auth and callback signature)
    pub paytabs_server_key: Option<String>,
    pub paytabs_api_base: String,
    /// Client-side bound on every provider call
    pub provider_timeout: Duration,
    pub unknown_item_policy: UnknownItemPolicy,
    /// Bearer token for `/cron/*`
    pub cron_secret: String,
    /// Token granting the status override capability (`x-override-token`)
    pub status_override_token: String,
    /// POS vendor name -> base URL
    pub pos_endpoints: HashMap<String, String>,
    /// Scheduled POS menu sync period; zero disables the job
    pub pos_sync_interval: Duration,
    pub pos_sync_concurrency: usize,
    /// Max webhook requests per key per minute
    pub webhook_rate_limit: u32,
}

impl Default for Config {
    /// Development profile
    fn default() -> Self {
        Self {
            database_url: "memory".into(),
            http_port: 8080,
            environment: "development".into(),
            public_base_url: "http://localhost:8080".into(),
            stripe_secret_key: None,
            stripe_webhook_secret: "dev-STRIPE_WEBHOOK_SECRET-not-for-production".into(),
            stripe_api_base: "https://api.stripe.com".into(),
            stripe_connect_enabled: true,
            platform_fee_percent: Decimal::new(25, 1),
            paytabs_profile_id: None,
            paytabs_server_key: None,
            paytabs_api_base: "https://secure.paytabs.com".into(),
            provider_timeout: Duration::from_millis(10_000),
            unknown_item_policy: UnknownItemPolicy::Reject,
            cron_secret: "dev-CRON_SECRET-not-for-production".into(),
            status_override_token: "dev-STATUS_OVERRIDE_TOKEN-not-for-production".into(),
            pos_endpoints: HashMap::new(),
            pos_sync_interval: Duration::from_secs(900),
            pos_sync_concurrency: 4,
            webhook_rate_limit: 120,
        }
    }
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    fn optional(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|s| !s.is_empty())
    }

    fn parsed<T: FromStr>(name: &str, default: T) -> Result<T, BoxError> {
        match Self::optional(name) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| format!("{name} has an invalid value: {raw}").into()),
            None => Ok(default),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let defaults = Self::default();

        let unknown_item_policy = match Self::optional("UNKNOWN_ITEM_POLICY") {
            Some(raw) => UnknownItemPolicy::parse(&raw)
                .ok_or_else(|| format!("UNKNOWN_ITEM_POLICY must be reject or drop, got {raw}"))?,
            None => defaults.unknown_item_policy,
        };

        let platform_fee_percent = match Self::optional("PLATFORM_FEE_PERCENT") {
            Some(raw) => Decimal::from_str(raw.trim())
                .map_err(|_| format!("PLATFORM_FEE_PERCENT has an invalid value: {raw}"))?,
            None => defaults.platform_fee_percent,
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: Self::parsed("HTTP_PORT", defaults.http_port)?,
            public_base_url: Self::optional("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            stripe_secret_key: Self::optional("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: Self::require_secret("STRIPE_WEBHOOK_SECRET", &environment)?,
            stripe_api_base: Self::optional("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            stripe_connect_enabled: Self::parsed(
                "STRIPE_CONNECT_ENABLED",
                defaults.stripe_connect_enabled,
            )?,
            platform_fee_percent,
            paytabs_profile_id: Self::optional("PAYTABS_PROFILE_ID"),
            paytabs_server_key: Self::optional("PAYTABS_SERVER_KEY"),
            paytabs_api_base: Self::optional("PAYTABS_API_BASE")
                .unwrap_or(defaults.paytabs_api_base),
            provider_timeout: Duration::from_millis(Self::parsed("PROVIDER_TIMEOUT_MS", 10_000)?),
            unknown_item_policy,
            cron_secret: Self::require_secret("CRON_SECRET", &environment)?,
            status_override_token: Self::require_secret("STATUS_OVERRIDE_TOKEN", &environment)?,
            pos_endpoints: Self::optional("POS_ENDPOINTS")
                .map(|raw| parse_pos_endpoints(&raw))
                .unwrap_or_default(),
            pos_sync_interval: Duration::from_secs(Self::parsed("POS_SYNC_INTERVAL_SECS", 900)?),
            pos_sync_concurrency: Self::parsed("POS_SYNC_CONCURRENCY", 4_usize)?.max(1),
            webhook_rate_limit: Self::parsed("WEBHOOK_RATE_LIMIT", defaults.webhook_rate_limit)?,
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Parse `vendor=url,vendor=url` (vendor names are lowercased)
pub fn parse_pos_endpoints(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (vendor, url) = pair.split_once('=')?;
            let (vendor, url) = (vendor.trim(), url.trim());
            if vendor.is_empty() || url.is_empty() {
                return None;
            }
            Some((vendor.to_ascii_lowercase(), url.trim_end_matches('/').to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pos_endpoints() {
        let map = parse_pos_endpoints("Square=https://pos.example/sq/, toast = https://t.example ,bad,=x");
        assert_eq!(map.len(), 2);
        assert_eq!(map["square"], "https://pos.example/sq");
        assert_eq!(map["toast"], "https://t.example");
    }

    #[test]
    fn test_default_is_development() {
        let config = Config::default();
        assert_eq!(config.environment, "development");
        assert!(!config.is_production());
        assert_eq!(config.platform_fee_percent, Decimal::new(25, 1));
        assert!(config.stripe_secret_key.is_none());
    }
}
