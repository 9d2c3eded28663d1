//! Test doubles and fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use settle_cloud::config::Config;
use settle_cloud::db::{MemoryStore, Store};
use settle_cloud::orders::CreateOrderRequest;
use settle_cloud::payment::paytabs::PayTabsProvider;
use settle_cloud::payment::stripe::{
    AccountLink, CreateIntent, PaymentIntent, StripeAccount, StripeApi, StripeConnectProvider,
    StripeError,
};
use settle_cloud::payment::ProviderRegistry;
use settle_cloud::pos::{
    MenuSnapshot, PosConnector, PosConnectors, PosError, PosOrder,
};
use settle_cloud::pricing::CartLine;
use settle_cloud::state::AppState;
use sha2::Sha256;
use shared::models::{ConnectStatus, MenuCategory, MenuItem, Restaurant, RestaurantSettings};
use shared::order::{OrderType, PaymentMethod};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const POS_KEY: &str = "pos-key-1";

// ── Stripe ──

#[derive(Default)]
struct StripeState {
    configured: bool,
    accounts: HashMap<String, StripeAccount>,
    /// Accounts Stripe no longer knows (deleted or revoked)
    gone: HashSet<String>,
    intents: Vec<CreateIntent>,
    intent_status: HashMap<String, String>,
    apple_pay: Vec<(String, String)>,
    created_accounts: Vec<String>,
    /// Idempotency key -> (params sent first, intent id returned)
    keyed: HashMap<String, (CreateIntent, String)>,
    /// Errors returned by the next intent creations, in order
    intent_failures: VecDeque<StripeError>,
    intent_delay: Option<Duration>,
}

/// In-memory Stripe that records every call
#[derive(Clone)]
pub struct FakeStripe {
    state: Arc<Mutex<StripeState>>,
}

impl FakeStripe {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StripeState {
                configured: true,
                ..StripeState::default()
            })),
        }
    }

    pub fn unconfigured() -> Self {
        let fake = Self::new();
        fake.state.lock().configured = false;
        fake
    }

    pub fn set_account(&self, id: &str, charges_enabled: bool, details_submitted: bool) {
        self.state.lock().accounts.insert(
            id.to_string(),
            StripeAccount {
                id: id.to_string(),
                charges_enabled,
                payouts_enabled: charges_enabled,
                details_submitted,
            },
        );
    }

    pub fn remove_account(&self, id: &str) {
        let mut state = self.state.lock();
        state.accounts.remove(id);
        state.gone.insert(id.to_string());
    }

    pub fn set_intent_status(&self, intent_id: &str, status: &str) {
        self.state
            .lock()
            .intent_status
            .insert(intent_id.to_string(), status.to_string());
    }

    /// Fail the next intent creation with `err`
    pub fn fail_next_intent(&self, err: StripeError) {
        self.state.lock().intent_failures.push_back(err);
    }

    /// Delay intent creation, `None` to answer immediately
    pub fn set_intent_delay(&self, delay: Option<Duration>) {
        self.state.lock().intent_delay = delay;
    }

    pub fn intents(&self) -> Vec<CreateIntent> {
        self.state.lock().intents.clone()
    }

    pub fn apple_pay_registrations(&self) -> Vec<(String, String)> {
        self.state.lock().apple_pay.clone()
    }

    pub fn created_accounts(&self) -> Vec<String> {
        self.state.lock().created_accounts.clone()
    }

    fn check_configured(&self) -> Result<(), StripeError> {
        if self.state.lock().configured {
            Ok(())
        } else {
            Err(StripeError::NotConfigured)
        }
    }
}

#[async_trait]
impl StripeApi for FakeStripe {
    async fn create_payment_intent(&self, req: &CreateIntent) -> Result<PaymentIntent, StripeError> {
        self.check_configured()?;
        let delay = self.state.lock().intent_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        if let Some(err) = state.intent_failures.pop_front() {
            return Err(err);
        }
        if let Some(dest) = req.transfer_destination.as_deref()
            && state.gone.contains(dest)
        {
            return Err(StripeError::AccountUnavailable(dest.to_string()));
        }
        // Stripe replays a reused key only when the parameters are identical
        if let Some((first, id)) = state.keyed.get(&req.idempotency_key) {
            if first != req {
                return Err(StripeError::Api {
                    status: 400,
                    code: Some("idempotency_error".into()),
                    message: "Keys for idempotent requests can only be used with the same parameters"
                        .into(),
                });
            }
            let status = state.intent_status.get(id).cloned().unwrap_or_default();
            return Ok(PaymentIntent {
                client_secret: Some(format!("{id}_secret")),
                id: id.clone(),
                status,
                amount: req.amount_minor,
                currency: req.currency.to_ascii_lowercase(),
                metadata: req.metadata.clone().into_iter().collect(),
            });
        }
        state.intents.push(req.clone());
        let id = format!("pi_{}", state.intents.len());
        state
            .keyed
            .insert(req.idempotency_key.clone(), (req.clone(), id.clone()));
        state
            .intent_status
            .insert(id.clone(), "requires_payment_method".to_string());
        Ok(PaymentIntent {
            client_secret: Some(format!("{id}_secret")),
            id,
            status: "requires_payment_method".to_string(),
            amount: req.amount_minor,
            currency: req.currency.to_ascii_lowercase(),
            metadata: req.metadata.clone().into_iter().collect(),
        })
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, StripeError> {
        self.check_configured()?;
        let state = self.state.lock();
        let status = state.intent_status.get(intent_id).cloned().ok_or(StripeError::Api {
            status: 404,
            code: Some("resource_missing".into()),
            message: "No such payment_intent".into(),
        })?;
        let created = intent_id
            .strip_prefix("pi_")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| state.intents.get(n - 1));
        Ok(PaymentIntent {
            id: intent_id.to_string(),
            client_secret: None,
            status,
            amount: created.map(|c| c.amount_minor).unwrap_or_default(),
            currency: created
                .map(|c| c.currency.to_ascii_lowercase())
                .unwrap_or_default(),
            metadata: HashMap::new(),
        })
    }

    async fn retrieve_account(&self, account_id: &str) -> Result<StripeAccount, StripeError> {
        self.check_configured()?;
        // Lets concurrent callers interleave between reading and writing
        tokio::task::yield_now().await;
        self.state
            .lock()
            .accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| StripeError::AccountUnavailable(account_id.to_string()))
    }

    async fn create_express_account(
        &self,
        _country: &str,
        _restaurant_id: &str,
    ) -> Result<StripeAccount, StripeError> {
        self.check_configured()?;
        let mut state = self.state.lock();
        let id = format!("acct_new_{}", state.created_accounts.len() + 1);
        let account = StripeAccount {
            id: id.clone(),
            ..StripeAccount::default()
        };
        state.accounts.insert(id.clone(), account.clone());
        state.created_accounts.push(id);
        Ok(account)
    }

    async fn create_account_link(
        &self,
        account_id: &str,
        _refresh_url: &str,
        _return_url: &str,
    ) -> Result<AccountLink, StripeError> {
        self.check_configured()?;
        Ok(AccountLink {
            url: format!("https://connect.stripe.test/setup/{account_id}"),
            expires_at: Some(1_900_000_000),
        })
    }

    async fn register_apple_pay_domain(&self, account_id: &str, domain: &str) -> Result<(), StripeError> {
        self.check_configured()?;
        self.state
            .lock()
            .apple_pay
            .push((account_id.to_string(), domain.to_string()));
        Ok(())
    }
}

// ── POS ──

#[derive(Default)]
struct PosState {
    snapshot: Option<MenuSnapshot>,
    fail_send: bool,
    sent: Vec<PosOrder>,
}

/// Connector factory whose connectors all share one recorded state
#[derive(Clone, Default)]
pub struct FakePos {
    state: Arc<Mutex<PosState>>,
}

impl FakePos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(self, snapshot: MenuSnapshot) -> Self {
        self.state.lock().snapshot = Some(snapshot);
        self
    }

    pub fn failing_send(self) -> Self {
        self.state.lock().fail_send = true;
        self
    }

    pub fn sent(&self) -> Vec<PosOrder> {
        self.state.lock().sent.clone()
    }
}

struct FakeConnector {
    vendor: String,
    state: Arc<Mutex<PosState>>,
}

#[async_trait]
impl PosConnector for FakeConnector {
    fn vendor(&self) -> &str {
        &self.vendor
    }

    async fn sync_menu(&self) -> Result<MenuSnapshot, PosError> {
        self.state
            .lock()
            .snapshot
            .clone()
            .ok_or_else(|| PosError::Network("menu endpoint down".into()))
    }

    async fn send_order(&self, order: &PosOrder) -> Result<Option<String>, PosError> {
        let mut state = self.state.lock();
        if state.fail_send {
            return Err(PosError::Rejected {
                status: 500,
                message: "pos offline".into(),
            });
        }
        state.sent.push(order.clone());
        Ok(Some(format!("pos-{}", state.sent.len())))
    }
}

impl PosConnectors for FakePos {
    fn for_restaurant(&self, restaurant: &Restaurant) -> Result<Box<dyn PosConnector>, PosError> {
        let (vendor, _) = restaurant
            .settings
            .as_ref()
            .and_then(|s| s.pos_credentials())
            .ok_or_else(|| PosError::NotConfigured(restaurant.id.clone()))?;
        Ok(Box::new(FakeConnector {
            vendor: vendor.to_string(),
            state: self.state.clone(),
        }))
    }
}

// ── Fixtures ──

pub fn test_config() -> Config {
    Config {
        stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
        platform_fee_percent: Decimal::new(25, 1),
        webhook_rate_limit: 1000,
        ..Config::default()
    }
}

pub fn restaurant(id: &str, country: &str, currency: &str) -> Restaurant {
    Restaurant {
        id: id.to_string(),
        slug: format!("{id}-slug"),
        name: format!("Restaurant {id}"),
        country: country.to_string(),
        domain: Some(format!("{id}.menu.test")),
        settings: Some(RestaurantSettings {
            currency: currency.to_string(),
            ..RestaurantSettings::default()
        }),
        connect: ConnectStatus::default(),
        stripe_customer_id: None,
        subscription: None,
        created_at: 0,
    }
}

pub fn with_pos(mut restaurant: Restaurant, vendor: &str) -> Restaurant {
    let mut settings = restaurant.settings_or_default();
    settings.pos_system = Some(vendor.to_string());
    settings.pos_api_key = Some(POS_KEY.to_string());
    settings.pos_sync_enabled = true;
    restaurant.settings = Some(settings);
    restaurant
}

pub fn onboarded(mut restaurant: Restaurant, account_id: &str) -> Restaurant {
    restaurant.connect = ConnectStatus {
        stripe_account_id: Some(account_id.to_string()),
        onboarding_completed: true,
        charges_enabled: true,
        payouts_enabled: true,
        details_submitted: true,
    };
    restaurant
}

/// Seed a restaurant with one category and a `burger` item priced `price`
pub async fn seed(store: &dyn Store, restaurant: &Restaurant, price: Decimal) {
    store.insert_restaurant(restaurant).await.unwrap();
    store
        .upsert_category(&MenuCategory {
            id: format!("{}-cat", restaurant.id),
            restaurant_id: restaurant.id.clone(),
            name: "Mains".into(),
            external_id: Some("cat-1".into()),
            sort_order: 0,
        })
        .await
        .unwrap();
    store
        .upsert_menu_item(&MenuItem {
            id: format!("{}-burger", restaurant.id),
            restaurant_id: restaurant.id.clone(),
            category_id: format!("{}-cat", restaurant.id),
            name: "Burger".into(),
            external_id: Some("burger-1".into()),
            price,
            available: true,
            variants: vec![],
            extras: vec![],
        })
        .await
        .unwrap();
}

pub fn card_cart(restaurant_id: &str, quantity: i32) -> CreateOrderRequest {
    CreateOrderRequest {
        order_type: OrderType::default(),
        payment_method: PaymentMethod::Card,
        items: vec![CartLine {
            menu_item_id: format!("{restaurant_id}-burger"),
            quantity,
            variant_id: None,
            extra_ids: vec![],
            notes: None,
        }],
        tip: Decimal::ZERO,
        customer_name: None,
        table_number: None,
    }
}

/// Wired service graph over a memory store
pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub stripe: FakeStripe,
    pub pos: FakePos,
}

impl Harness {
    pub fn new(stripe: FakeStripe, pos: FakePos) -> Self {
        Self::with_config(test_config(), stripe, pos)
    }

    /// Connect-enabled Stripe plus PayTabs built from `config`
    pub fn with_config(config: Config, stripe: FakeStripe, pos: FakePos) -> Self {
        let store = Arc::new(MemoryStore::new());
        let store_dyn: Arc<dyn Store> = store.clone();
        let stripe_api: Arc<dyn StripeApi> = Arc::new(stripe.clone());
        let registry = ProviderRegistry::new()
            .with_provider(Arc::new(StripeConnectProvider::new(
                stripe_api.clone(),
                store_dyn.clone(),
                config.platform_fee_percent,
            )))
            .with_provider(Arc::new(PayTabsProvider::from_config(
                &config,
                reqwest::Client::new(),
            )));
        let state = AppState::from_parts(
            config,
            store_dyn,
            stripe_api,
            registry,
            Arc::new(pos.clone()),
        );
        Self {
            state,
            store,
            stripe,
            pos,
        }
    }
}

// ── Signatures ──

pub fn hmac_hex(key: &str, parts: &[&[u8]]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).unwrap();
    for part in parts {
        mac.update(part);
    }
    hex::encode(mac.finalize().into_bytes())
}

/// `Stripe-Signature` header for `payload` signed now
pub fn stripe_signature(payload: &[u8], secret: &str) -> String {
    let t = chrono::Utc::now().timestamp().to_string();
    let v1 = hmac_hex(secret, &[t.as_bytes(), b".", payload]);
    format!("t={t},v1={v1}")
}

pub fn payment_succeeded_event(event_id: &str, intent_id: &str, order_id: &str, amount: i64) -> Vec<u8> {
    serde_json::json!({
        "id": event_id,
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": intent_id,
            "amount_received": amount,
            "currency": "eur",
            "metadata": { "orderId": order_id }
        }}
    })
    .to_string()
    .into_bytes()
}
