//! Stripe Connect onboarding and account status refresh
//!
//! Apple Pay domain registration fires only on the incomplete -> complete
//! edge of `onboarding_completed`, as reported by the store write that made
//! it; repeated or concurrent refreshes never re-register.

use crate::db::Store;
use crate::error::ServiceResult;
use crate::payment::stripe::{AccountLink, StripeAccount, StripeApi, StripeError};
use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{ConnectStatus, Restaurant};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnboardingLink {
    pub account_id: String,
    pub url: String,
    pub expires_at: Option<i64>,
    /// A stale stored account was replaced by a new one
    pub recreated: bool,
}

/// Result of applying Stripe's view of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectRefresh {
    pub status: ConnectStatus,
    pub became_complete: bool,
    pub apple_pay_registered: bool,
}

fn stripe_failure(err: StripeError) -> AppError {
    match err {
        StripeError::NotConfigured => {
            AppError::with_message(ErrorCode::ProviderUnavailable, err.to_string())
        }
        StripeError::AccountUnavailable(_) => {
            AppError::with_message(ErrorCode::ConnectAccountUnavailable, err.to_string())
        }
        StripeError::Network(_) => AppError::with_message(ErrorCode::PaymentTransient, err.to_string()),
        StripeError::Api { .. } => {
            AppError::with_message(ErrorCode::ConnectOnboardingFailed, err.to_string())
        }
    }
}

#[derive(Clone)]
pub struct ConnectOnboarding {
    api: Arc<dyn StripeApi>,
    store: Arc<dyn Store>,
    public_base_url: String,
}

impl ConnectOnboarding {
    pub fn new(api: Arc<dyn StripeApi>, store: Arc<dyn Store>, public_base_url: &str) -> Self {
        Self {
            api,
            store,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn load(&self, restaurant_id: &str) -> ServiceResult<Restaurant> {
        Ok(self
            .store
            .restaurant(restaurant_id)
            .await?
            .ok_or_else(|| AppError::restaurant_not_found(restaurant_id))?)
    }

    /// Return an onboarding link, creating (or recreating) the Express account
    pub async fn start(&self, restaurant_id: &str) -> ServiceResult<OnboardingLink> {
        let restaurant = self.load(restaurant_id).await?;

        let mut recreated = false;
        let existing = match restaurant.connect.stripe_account_id.as_deref() {
            Some(id) if !id.is_empty() => match self.api.retrieve_account(id).await {
                Ok(account) => Some(account.id),
                Err(StripeError::AccountUnavailable(_)) => {
                    tracing::warn!(restaurant_id, account_id = id, "Stored Connect account is stale, recreating");
                    self.store
                        .save_connect_status(restaurant_id, &ConnectStatus::default())
                        .await?;
                    recreated = true;
                    None
                }
                Err(e) => return Err(stripe_failure(e).into()),
            },
            _ => None,
        };

        let account_id = match existing {
            Some(id) => id,
            None => {
                let account = self
                    .api
                    .create_express_account(&restaurant.country, restaurant_id)
                    .await
                    .map_err(stripe_failure)?;
                let status = ConnectStatus {
                    stripe_account_id: Some(account.id.clone()),
                    ..ConnectStatus::default()
                };
                self.store.save_connect_status(restaurant_id, &status).await?;
                tracing::info!(restaurant_id, account_id = %account.id, "Created Connect Express account");
                account.id
            }
        };

        let AccountLink { url, expires_at } = self
            .api
            .create_account_link(
                &account_id,
                &format!("{}/connect/refresh?restaurant={restaurant_id}", self.public_base_url),
                &format!("{}/connect/return?restaurant={restaurant_id}", self.public_base_url),
            )
            .await
            .map_err(stripe_failure)?;

        Ok(OnboardingLink {
            account_id,
            url,
            expires_at,
            recreated,
        })
    }

    /// Re-read the restaurant's account from Stripe and persist its flags
    pub async fn refresh(&self, restaurant_id: &str) -> ServiceResult<ConnectRefresh> {
        let restaurant = self.load(restaurant_id).await?;
        let Some(account_id) = restaurant
            .connect
            .stripe_account_id
            .clone()
            .filter(|id| !id.is_empty())
        else {
            return Err(AppError::with_message(
                ErrorCode::ConnectAccountUnavailable,
                "Restaurant has no Connect account",
            )
            .into());
        };

        match self.api.retrieve_account(&account_id).await {
            Ok(account) => self.apply(&restaurant, &account).await,
            Err(StripeError::AccountUnavailable(_)) => {
                tracing::warn!(restaurant_id, account_id = %account_id, "Connect account unavailable, clearing state");
                self.store
                    .save_connect_status(restaurant_id, &ConnectStatus::default())
                    .await?;
                Ok(ConnectRefresh {
                    status: ConnectStatus::default(),
                    became_complete: false,
                    apple_pay_registered: false,
                })
            }
            Err(e) => Err(stripe_failure(e).into()),
        }
    }

    /// `account.updated` webhook; unknown accounts are ignored
    pub async fn account_updated(&self, account: &StripeAccount) -> ServiceResult<Option<ConnectRefresh>> {
        match self.store.restaurant_by_stripe_account(&account.id).await? {
            Some(restaurant) => Ok(Some(self.apply(&restaurant, account).await?)),
            None => {
                tracing::info!(account_id = %account.id, "account.updated for unknown account ignored");
                Ok(None)
            }
        }
    }

    async fn apply(&self, restaurant: &Restaurant, account: &StripeAccount) -> ServiceResult<ConnectRefresh> {
        let status = ConnectStatus {
            stripe_account_id: Some(account.id.clone()),
            onboarding_completed: account.ready_for_split(),
            charges_enabled: account.charges_enabled,
            payouts_enabled: account.payouts_enabled,
            details_submitted: account.details_submitted,
        };
        // Concurrent refreshes may share a stale snapshot, so the store
        // decides which one observed the edge
        let became_complete = if status != restaurant.connect {
            self.store.save_connect_status(&restaurant.id, &status).await?
        } else {
            false
        };
        let apple_pay_registered = if became_complete {
            tracing::info!(restaurant_id = %restaurant.id, account_id = %account.id, "Connect onboarding completed");
            self.register_apple_pay(restaurant, &account.id).await
        } else {
            false
        };

        Ok(ConnectRefresh {
            status,
            became_complete,
            apple_pay_registered,
        })
    }

    /// Side effect: failures are logged only
    async fn register_apple_pay(&self, restaurant: &Restaurant, account_id: &str) -> bool {
        let Some(domain) = restaurant.domain.as_deref().filter(|d| !d.is_empty()) else {
            tracing::debug!(restaurant_id = %restaurant.id, "No domain, skipping Apple Pay registration");
            return false;
        };
        match self.api.register_apple_pay_domain(account_id, domain).await {
            Ok(()) => {
                tracing::info!(restaurant_id = %restaurant.id, domain, "Apple Pay domain registered");
                true
            }
            Err(e) => {
                tracing::warn!(restaurant_id = %restaurant.id, domain, error = %e, "Apple Pay domain registration failed");
                false
            }
        }
    }
}
