//! Application state for settle-cloud

use crate::auth::rate_limit::RateLimiter;
use crate::config::Config;
use crate::db::{MemoryStore, PgStore, Store};
use crate::orders::OrderService;
use crate::payment::ProviderRegistry;
use crate::payment::stripe::StripeApi;
use crate::pos::{HttpPosConnectors, PosConnectors};
use crate::reconcile::Reconciler;
use crate::settlement::{ConnectOnboarding, SettlementOrchestrator};
use std::sync::Arc;
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub orders: OrderService,
    pub settlement: SettlementOrchestrator,
    pub reconciler: Reconciler,
    pub onboarding: ConnectOnboarding,
    pub pos: Arc<dyn PosConnectors>,
    /// Rate limiter for webhook routes
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Production wiring: store from `DATABASE_URL`, REST clients for providers and POS
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let store: Arc<dyn Store> = if config.database_url == "memory" {
            tracing::warn!("Using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(PgStore::connect(&config.database_url).await?)
        };

        let http = reqwest::Client::builder()
            .timeout(config.provider_timeout)
            .connect_timeout(config.provider_timeout.min(Duration::from_secs(5)))
            .build()?;

        if config.stripe_secret_key.is_none() {
            tracing::warn!("STRIPE_SECRET_KEY not set, Stripe payments are unavailable");
        }
        let stripe = ProviderRegistry::stripe_client(config, http.clone());
        let registry = ProviderRegistry::from_config(config, http.clone(), stripe.clone(), store.clone());
        let pos: Arc<dyn PosConnectors> =
            Arc::new(HttpPosConnectors::new(http, config.pos_endpoints.clone()));

        Ok(Self::from_parts(config.clone(), store, stripe, registry, pos))
    }

    /// Assemble the services from already built collaborators
    pub fn from_parts(
        config: Config,
        store: Arc<dyn Store>,
        stripe: Arc<dyn StripeApi>,
        registry: ProviderRegistry,
        pos: Arc<dyn PosConnectors>,
    ) -> Self {
        let onboarding = ConnectOnboarding::new(stripe, store.clone(), &config.public_base_url);
        let reconciler = Reconciler::new(store.clone(), pos.clone(), onboarding.clone());
        let settlement =
            SettlementOrchestrator::new(store.clone(), registry, config.provider_timeout);
        let orders = OrderService::new(store.clone(), pos.clone(), config.unknown_item_policy);
        let rate_limiter = RateLimiter::new(config.webhook_rate_limit);

        Self {
            config: Arc::new(config),
            store,
            orders,
            settlement,
            reconciler,
            onboarding,
            pos,
            rate_limiter,
        }
    }
}
