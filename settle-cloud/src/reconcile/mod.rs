//! Webhook reconciler
//!
//! Applies provider callbacks (and the synchronous confirmation path) to
//! orders at-least-once safely:
//!
//! - the PAID transition is a compare-and-set, so exactly one writer wins
//! - ledger rows are keyed by provider reference, invoices by order id
//! - event ids are recorded only after successful handling, so a failed
//!   attempt stays retryable and a redelivered success is a no-op

pub mod events;

pub use events::{InboundEvent, PaymentSignal, ProviderEvent, parse_paytabs_callback, parse_stripe_event};

use crate::db::Store;
use crate::error::ServiceResult;
use crate::money::to_minor_units;
use crate::orders::update_with_retry;
use crate::pos::PosConnectors;
use crate::pos::push::spawn_push;
use crate::settlement::onboarding::ConnectOnboarding;
use crate::util::{new_id, now_millis};
use shared::models::{Invoice, Order, Payment, PaymentKind, SubscriptionInfo, invoice_number_for};
use shared::order::{PaymentMethod, PaymentStatus, lifecycle};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Event id already processed
    Duplicate,
    Applied,
    /// Target state already reached (idempotent no-op)
    AlreadyApplied,
    /// Nothing to act on (unknown order, unhandled event type)
    Ignored,
}

/// Find the order a payment callback refers to
///
/// Intent id first; then `metadata.orderId`, which is either an order id
/// or a human order number scoped by `metadata.restaurantId`.
pub async fn locate_order(store: &dyn Store, signal: &PaymentSignal) -> ServiceResult<Option<Order>> {
    if !signal.intent_id.is_empty()
        && let Some(order) = store.order_by_intent(&signal.intent_id).await?
    {
        return Ok(Some(order));
    }
    let Some(order_ref) = signal.order_ref.as_deref() else {
        return Ok(None);
    };
    if let Some(order) = store.order(order_ref).await? {
        return Ok(Some(order));
    }
    match signal.restaurant_id.as_deref() {
        Some(restaurant_id) => Ok(store.order_by_number(restaurant_id, order_ref).await?),
        None => Ok(None),
    }
}

/// Ledger row and invoice for a paid order; both are create-once
pub async fn record_settlement(
    store: &dyn Store,
    order: &Order,
    provider: &str,
    reference: &str,
) -> ServiceResult<()> {
    let now = now_millis();
    let payment = Payment {
        id: new_id(),
        restaurant_id: order.restaurant_id.clone(),
        order_id: Some(order.id.clone()),
        amount: order.totals.total,
        currency: order.currency.clone(),
        kind: PaymentKind::Order,
        provider: provider.to_string(),
        provider_reference: reference.to_string(),
        created_at: now,
    };
    if !store.append_payment(&payment).await? {
        tracing::debug!(order_id = %order.id, reference, "Ledger row already present");
    }

    let invoice = Invoice {
        id: new_id(),
        order_id: order.id.clone(),
        restaurant_id: order.restaurant_id.clone(),
        invoice_number: invoice_number_for(&order.order_number),
        subtotal: order.totals.subtotal,
        tax: order.totals.tax,
        total: order.totals.total,
        currency: order.currency.clone(),
        created_at: now,
    };
    if store.create_invoice_once(&invoice).await? {
        tracing::info!(order_id = %order.id, invoice_number = %invoice.invoice_number, "Invoice created");
    }
    Ok(())
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn Store>,
    pos: Arc<dyn PosConnectors>,
    onboarding: ConnectOnboarding,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>, pos: Arc<dyn PosConnectors>, onboarding: ConnectOnboarding) -> Self {
        Self {
            store,
            pos,
            onboarding,
        }
    }

    /// Apply a parsed callback once per event id
    pub async fn handle(&self, source: &str, inbound: &InboundEvent) -> ServiceResult<ReconcileOutcome> {
        let has_id = !inbound.id.is_empty();
        if has_id && self.store.is_event_processed(&inbound.id).await? {
            tracing::info!(source, event_id = %inbound.id, kind = %inbound.kind, "Duplicate webhook event");
            return Ok(ReconcileOutcome::Duplicate);
        }

        let outcome = match &inbound.event {
            ProviderEvent::PaymentSucceeded(signal) => self.payment_succeeded(signal).await?,
            ProviderEvent::PaymentFailed(signal) => self.payment_failed(signal).await?,
            ProviderEvent::Refunded { intent_id } => self.refunded(intent_id).await?,
            ProviderEvent::AccountUpdated(account) => {
                match self.onboarding.account_updated(account).await? {
                    Some(_) => ReconcileOutcome::Applied,
                    None => ReconcileOutcome::Ignored,
                }
            }
            ProviderEvent::SubscriptionChanged {
                customer_id,
                subscription,
            } => self.subscription_changed(customer_id.as_deref(), subscription).await?,
            ProviderEvent::Ignored => {
                tracing::debug!(source, kind = %inbound.kind, "Unhandled webhook event type");
                ReconcileOutcome::Ignored
            }
        };

        if has_id {
            self.store
                .record_event(&inbound.id, source, &inbound.kind, now_millis())
                .await?;
        }
        Ok(outcome)
    }

    /// Mark the referenced order paid; shared by webhooks and confirm-payment
    pub async fn payment_succeeded(&self, signal: &PaymentSignal) -> ServiceResult<ReconcileOutcome> {
        let Some(order) = locate_order(self.store.as_ref(), signal).await? else {
            tracing::warn!(intent_id = %signal.intent_id, order_ref = ?signal.order_ref, "Payment for unknown order");
            return Ok(ReconcileOutcome::Ignored);
        };

        if let (Some(amount), Some(currency)) = (signal.amount_minor, signal.currency.as_deref()) {
            let expected = to_minor_units(order.totals.total, &order.currency);
            if expected != Some(amount) || !currency.eq_ignore_ascii_case(&order.currency) {
                tracing::error!(
                    order_id = %order.id,
                    amount,
                    currency,
                    expected = ?expected,
                    "Provider amount differs from order total"
                );
            }
        }

        let intent_id = signal.intent_id.clone();
        let (order, won) = update_with_retry(self.store.as_ref(), &order.id, |order| {
            let won = lifecycle::mark_paid(order, PaymentMethod::Card, now_millis());
            if won && order.payment_intent_id.is_none() && !intent_id.is_empty() {
                order.payment_intent_id = Some(intent_id.clone());
            }
            Ok((won, won))
        })
        .await?;

        // Runs on redelivery too, healing a crash between the two writes
        if order.payment_status == PaymentStatus::Paid {
            let reference = order
                .payment_intent_id
                .clone()
                .unwrap_or_else(|| signal.intent_id.clone());
            record_settlement(self.store.as_ref(), &order, signal.provider, &reference).await?;
        }

        if !won {
            tracing::info!(order_id = %order.id, "Order already paid, nothing to apply");
            return Ok(ReconcileOutcome::AlreadyApplied);
        }
        tracing::info!(order_id = %order.id, provider = signal.provider, "Order marked paid");
        spawn_push(self.store.clone(), self.pos.clone(), order.id.clone());
        Ok(ReconcileOutcome::Applied)
    }

    async fn payment_failed(&self, signal: &PaymentSignal) -> ServiceResult<ReconcileOutcome> {
        let Some(order) = locate_order(self.store.as_ref(), signal).await? else {
            return Ok(ReconcileOutcome::Ignored);
        };
        let (_, changed) = update_with_retry(self.store.as_ref(), &order.id, |order| {
            let changed = lifecycle::mark_payment_failed(order);
            Ok((changed, changed))
        })
        .await?;
        if changed {
            tracing::info!(order_id = %order.id, provider = signal.provider, "Payment failed");
            Ok(ReconcileOutcome::Applied)
        } else {
            Ok(ReconcileOutcome::AlreadyApplied)
        }
    }

    async fn refunded(&self, intent_id: &str) -> ServiceResult<ReconcileOutcome> {
        let Some(order) = self.store.order_by_intent(intent_id).await? else {
            return Ok(ReconcileOutcome::Ignored);
        };
        let (_, changed) = update_with_retry(self.store.as_ref(), &order.id, |order| {
            let changed = lifecycle::mark_refunded(order);
            Ok((changed, changed))
        })
        .await?;
        if changed {
            tracing::info!(order_id = %order.id, "Payment refunded");
            Ok(ReconcileOutcome::Applied)
        } else {
            Ok(ReconcileOutcome::AlreadyApplied)
        }
    }

    async fn subscription_changed(
        &self,
        customer_id: Option<&str>,
        subscription: &SubscriptionInfo,
    ) -> ServiceResult<ReconcileOutcome> {
        let mut restaurant = self
            .store
            .restaurant_by_subscription(&subscription.subscription_id)
            .await?;
        if restaurant.is_none()
            && let Some(customer) = customer_id
        {
            restaurant = self.store.restaurant_by_stripe_customer(customer).await?;
        }
        let Some(restaurant) = restaurant else {
            tracing::warn!(subscription_id = %subscription.subscription_id, "Subscription event for unknown restaurant");
            return Ok(ReconcileOutcome::Ignored);
        };
        if restaurant.subscription.as_ref() == Some(subscription) {
            return Ok(ReconcileOutcome::AlreadyApplied);
        }
        self.store.save_subscription(&restaurant.id, subscription).await?;
        tracing::info!(
            restaurant_id = %restaurant.id,
            status = %subscription.status,
            "Restaurant subscription updated"
        );
        Ok(ReconcileOutcome::Applied)
    }
}
