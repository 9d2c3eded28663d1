//! settle-cloud: order settlement core for multi-tenant restaurant ordering
//!
//! - Prices carts and allocates per-restaurant order numbers
//! - Routes payments to Stripe (direct or Connect split) or PayTabs
//! - Reconciles provider webhooks idempotently into order state
//! - Pushes orders to and syncs menus from restaurant POS systems

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod money;
pub mod orders;
pub mod payment;
pub mod pos;
pub mod pricing;
pub mod reconcile;
pub mod settlement;
pub mod state;
pub mod util;

pub use config::Config;
pub use state::AppState;
