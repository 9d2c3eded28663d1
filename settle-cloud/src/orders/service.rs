//! Order service: checkout, reads, deletion and staff updates

use super::update_with_retry;
use crate::db::{DeleteOutcome, Store};
use crate::error::ServiceResult;
use crate::pos::PosConnectors;
use crate::pos::push::{push_order, spawn_push};
use crate::pricing::{CartLine, UnknownItemPolicy, calculate, resolve_cart};
use crate::reconcile::record_settlement;
use crate::util::{new_id, now_millis};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{Order, OrderTimestamps, Restaurant, format_order_number};
use shared::order::{
    OrderStatus, OrderType, PaymentMethod, PaymentStatus, PosSyncStatus, TransitionMode, lifecycle,
};
use std::sync::Arc;

/// Checkout payload
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub tip: Decimal,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub table_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    /// Out-of-band transition; needs the override capability
    #[serde(rename = "override", default)]
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CancelUpdate {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentUpdateStatus {
    Paid,
    Unpaid,
}

/// Staff settles (or gives up on) a payment outside the providers
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentUpdate {
    pub status: PaymentUpdateStatus,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
}

/// Admin update, one variant per kind of change
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OrderUpdateRequest {
    Status(StatusUpdate),
    Cancel(CancelUpdate),
    Payment(PaymentUpdate),
    PosResync,
}

/// Capabilities of the caller, resolved by the API layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateCapabilities {
    pub status_override: bool,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    pos: Arc<dyn PosConnectors>,
    unknown_item_policy: UnknownItemPolicy,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn Store>,
        pos: Arc<dyn PosConnectors>,
        unknown_item_policy: UnknownItemPolicy,
    ) -> Self {
        Self {
            store,
            pos,
            unknown_item_policy,
        }
    }

    /// Restaurant by slug, falling back to id
    async fn restaurant(&self, key: &str) -> ServiceResult<Restaurant> {
        if let Some(r) = self.store.restaurant_by_slug(key).await? {
            return Ok(r);
        }
        Ok(self
            .store
            .restaurant(key)
            .await?
            .ok_or_else(|| AppError::restaurant_not_found(key))?)
    }

    /// Price the cart, allocate an order number and insert the order
    pub async fn create_order(&self, restaurant_key: &str, request: CreateOrderRequest) -> ServiceResult<Order> {
        let restaurant = self.restaurant(restaurant_key).await?;
        let settings = restaurant.settings_or_default();

        let menu = self.store.menu_items(&restaurant.id).await?;
        let lines = resolve_cart(&request.items, &menu, self.unknown_item_policy)?;
        let priced = calculate(&lines, &settings, request.tip)?;

        let sequence = self.store.next_order_sequence(&restaurant.id).await?;
        let now = now_millis();
        let pos_enabled = settings.pos_credentials().is_some();
        let order = Order {
            id: new_id(),
            restaurant_id: restaurant.id.clone(),
            order_number: format_order_number(&settings.order_number_prefix, sequence),
            order_type: request.order_type,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: request.payment_method,
            payment_intent_id: None,
            payment_provider: None,
            settlement_type: None,
            currency: settings.currency.to_ascii_uppercase(),
            totals: priced.totals,
            items: priced.items,
            timestamps: OrderTimestamps::default(),
            cancel_reason: None,
            pos_sync_status: if pos_enabled {
                PosSyncStatus::Pending
            } else {
                PosSyncStatus::Disabled
            },
            pos_order_id: None,
            customer_name: request.customer_name,
            table_number: request.table_number,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_order(&order).await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            restaurant_id = %restaurant.id,
            total = %order.totals.total,
            payment_method = order.payment_method.as_db(),
            "Order created"
        );

        if pos_enabled {
            spawn_push(self.store.clone(), self.pos.clone(), order.id.clone());
        }
        Ok(order)
    }

    pub async fn get_order(&self, order_id: &str) -> ServiceResult<Order> {
        Ok(self
            .store
            .order(order_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(order_id))?)
    }

    /// Delete an unpaid order; paid orders are kept forever
    pub async fn delete_order(&self, order_id: &str) -> ServiceResult<()> {
        match self.store.delete_unpaid_order(order_id).await? {
            DeleteOutcome::Deleted => {
                tracing::info!(order_id, "Order deleted");
                Ok(())
            }
            DeleteOutcome::NotFound => Err(AppError::order_not_found(order_id).into()),
            DeleteOutcome::Paid => Err(AppError::with_message(
                ErrorCode::OrderAlreadyPaid,
                "Paid orders cannot be deleted",
            )
            .with_detail("order_id", order_id)
            .into()),
        }
    }

    pub async fn update_order(
        &self,
        order_id: &str,
        request: OrderUpdateRequest,
        caps: UpdateCapabilities,
    ) -> ServiceResult<Order> {
        match request {
            OrderUpdateRequest::Status(update) => self.update_status(order_id, update, caps).await,
            OrderUpdateRequest::Cancel(CancelUpdate { reason }) => {
                self.cancel_order(order_id, reason).await
            }
            OrderUpdateRequest::Payment(update) => self.update_payment(order_id, update).await,
            OrderUpdateRequest::PosResync => {
                let status = push_order(self.store.as_ref(), self.pos.as_ref(), order_id).await;
                tracing::info!(order_id, status = status.as_db(), "POS resync requested");
                self.get_order(order_id).await
            }
        }
    }

    async fn cancel_order(&self, order_id: &str, reason: Option<String>) -> ServiceResult<Order> {
        let (order, ()) = update_with_retry(self.store.as_ref(), order_id, |order| {
            lifecycle::cancel(order, reason.clone(), now_millis())?;
            Ok((true, ()))
        })
        .await?;
        tracing::info!(order_id, reason = ?order.cancel_reason, "Order cancelled");
        Ok(order)
    }

    async fn update_status(
        &self,
        order_id: &str,
        update: StatusUpdate,
        caps: UpdateCapabilities,
    ) -> ServiceResult<Order> {
        if update.status == OrderStatus::Cancelled {
            return self.cancel_order(order_id, None).await;
        }
        let mode = if update.force {
            if !caps.status_override {
                return Err(AppError::with_message(
                    ErrorCode::OverrideRequired,
                    "Status override capability required",
                )
                .into());
            }
            TransitionMode::Override
        } else {
            TransitionMode::Staff
        };

        let (order, changed) = update_with_retry(self.store.as_ref(), order_id, |order| {
            let changed = lifecycle::transition(order, update.status, mode, now_millis())?;
            Ok((changed, changed))
        })
        .await?;
        if changed {
            tracing::info!(order_id, status = %order.status, forced = update.force, "Order status changed");
        }
        Ok(order)
    }

    async fn update_payment(&self, order_id: &str, update: PaymentUpdate) -> ServiceResult<Order> {
        match update.status {
            PaymentUpdateStatus::Paid => {
                let (order, won) = update_with_retry(self.store.as_ref(), order_id, |order| {
                    if order.status == OrderStatus::Cancelled {
                        return Err(AppError::new(ErrorCode::OrderCancelled).into());
                    }
                    let method = update.method.unwrap_or(order.payment_method);
                    let won = lifecycle::mark_paid(order, method, now_millis());
                    Ok((won, won))
                })
                .await?;
                if won {
                    record_settlement(self.store.as_ref(), &order, "manual", &order.id).await?;
                    tracing::info!(order_id, method = order.payment_method.as_db(), "Order marked paid by staff");
                }
                Ok(order)
            }
            PaymentUpdateStatus::Unpaid => {
                let (order, _) = update_with_retry(self.store.as_ref(), order_id, |order| {
                    if matches!(order.payment_status, PaymentStatus::Paid | PaymentStatus::Refunded) {
                        return Err(AppError::new(ErrorCode::OrderAlreadyPaid)
                            .with_detail("order_id", order.id.as_str())
                            .into());
                    }
                    let changed = lifecycle::mark_unpaid(order);
                    Ok((changed, ()))
                })
                .await?;
                Ok(order)
            }
        }
    }
}
