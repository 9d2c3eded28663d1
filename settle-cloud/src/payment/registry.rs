//! Payment provider registry
//!
//! Built once per process from [`Config`] and injected through the app
//! state; tests build one from fake providers.

use super::paytabs::PayTabsProvider;
use super::port::{PaymentProvider, ProviderKind};
use super::stripe::{StripeApi, StripeConnectProvider, StripeDirectProvider, StripeRestClient};
use crate::config::Config;
use crate::db::Store;
use std::collections::HashMap;
use std::sync::Arc;

/// Countries routed to PayTabs first
const MIDDLE_EAST: &[&str] = &[
    "AE", "SA", "BH", "KW", "OM", "QA", "JO", "EG", "IQ", "LB", "PS", "YE",
];

pub fn is_middle_east(country: &str) -> bool {
    let upper = country.trim().to_ascii_uppercase();
    MIDDLE_EAST.contains(&upper.as_str())
}

/// Provider preference for a country, most preferred first
pub fn preference_for(country: &str) -> &'static [ProviderKind] {
    if is_middle_east(country) {
        &[ProviderKind::PayTabs, ProviderKind::Stripe]
    } else {
        &[ProviderKind::Stripe]
    }
}

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// Build the production registry
    ///
    /// Providers are always registered; missing credentials surface as
    /// `Unavailable` at settlement time so the fallback rule applies.
    pub fn from_config(
        config: &Config,
        http: reqwest::Client,
        stripe: Arc<dyn StripeApi>,
        store: Arc<dyn Store>,
    ) -> Self {
        let stripe_provider: Arc<dyn PaymentProvider> = if config.stripe_connect_enabled {
            Arc::new(StripeConnectProvider::new(
                stripe,
                store,
                config.platform_fee_percent,
            ))
        } else {
            Arc::new(StripeDirectProvider::new(stripe))
        };

        Self::new()
            .with_provider(stripe_provider)
            .with_provider(Arc::new(PayTabsProvider::from_config(config, http)))
    }

    /// Default Stripe REST client for `from_config`
    pub fn stripe_client(config: &Config, http: reqwest::Client) -> Arc<dyn StripeApi> {
        Arc::new(StripeRestClient::new(
            http,
            &config.stripe_api_base,
            config.stripe_secret_key.clone(),
        ))
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn PaymentProvider>> {
        self.providers.get(&kind).cloned()
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<dyn PaymentProvider>> {
        ProviderKind::parse(name).and_then(|k| self.get(k))
    }

    /// Registered providers able to settle `(country, currency)`, in preference order
    pub fn resolve(&self, country: &str, currency: &str) -> Vec<Arc<dyn PaymentProvider>> {
        preference_for(country)
            .iter()
            .filter_map(|kind| self.get(*kind))
            .filter(|p| p.supports_currency(currency))
            .collect()
    }
}
