//! Best-effort order push to the restaurant's POS
//!
//! Failures only mark `pos_sync_status`; they never reach the caller.

use super::port::{PosConnectors, PosOrder};
use crate::db::Store;
use crate::error::ServiceResult;
use crate::orders::update_with_retry;
use shared::order::PosSyncStatus;
use std::sync::Arc;

enum Push {
    Disabled,
    Sent(Option<String>),
}

async fn attempt(store: &dyn Store, connectors: &dyn PosConnectors, order_id: &str) -> ServiceResult<Push> {
    let Some(order) = store.order(order_id).await? else {
        return Ok(Push::Disabled);
    };
    let Some(restaurant) = store.restaurant(&order.restaurant_id).await? else {
        return Ok(Push::Disabled);
    };
    if restaurant.settings_or_default().pos_credentials().is_none() {
        return Ok(Push::Disabled);
    }

    let connector = connectors.for_restaurant(&restaurant)?;
    let pos_order_id = connector.send_order(&PosOrder::from(&order)).await?;
    tracing::info!(order_id, vendor = connector.vendor(), "Order pushed to POS");
    Ok(Push::Sent(pos_order_id))
}

/// Push an order and record the outcome on it
pub async fn push_order(
    store: &dyn Store,
    connectors: &dyn PosConnectors,
    order_id: &str,
) -> PosSyncStatus {
    let (status, pos_order_id) = match attempt(store, connectors, order_id).await {
        Ok(Push::Disabled) => (PosSyncStatus::Disabled, None),
        Ok(Push::Sent(id)) => (PosSyncStatus::Synced, id),
        Err(e) => {
            tracing::warn!(order_id, error = %e, "POS push failed");
            (PosSyncStatus::Failed, None)
        }
    };

    let write = update_with_retry(store, order_id, |order| {
        let mut changed = order.pos_sync_status != status;
        order.pos_sync_status = status;
        if order.pos_order_id.is_none() && pos_order_id.is_some() {
            order.pos_order_id = pos_order_id.clone();
            changed = true;
        }
        Ok((changed, ()))
    })
    .await;
    if let Err(e) = write {
        tracing::warn!(order_id, error = %e, "Failed to record POS sync status");
    }
    status
}

/// Fire-and-forget push on the runtime
pub fn spawn_push(store: Arc<dyn Store>, connectors: Arc<dyn PosConnectors>, order_id: String) {
    tokio::spawn(async move {
        push_order(store.as_ref(), connectors.as_ref(), &order_id).await;
    });
}
