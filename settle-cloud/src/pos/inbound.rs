//! Inbound POS callbacks
//!
//! Status changes feed the order state machine as a system writer (forward
//! only); inventory changes toggle item availability. Event ids are
//! recorded after successful handling so redeliveries become no-ops.

use super::status_map::map_status;
use crate::db::Store;
use crate::error::ServiceResult;
use crate::orders::update_with_retry;
use crate::util::now_millis;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use shared::models::Order;
use shared::order::{OrderStatus, TransitionMode, lifecycle};

/// Header carrying the hex HMAC-SHA256 of the body, keyed with the POS API key
pub const SIGNATURE_HEADER: &str = "x-pos-signature";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PosEvent {
    OrderStatusChanged {
        event_id: String,
        #[serde(default)]
        order_id: Option<String>,
        #[serde(default)]
        order_number: Option<String>,
        #[serde(default)]
        pos_order_id: Option<String>,
        status: String,
    },
    InventoryChanged {
        event_id: String,
        external_id: String,
        available: bool,
    },
}

impl PosEvent {
    pub fn event_id(&self) -> &str {
        match self {
            Self::OrderStatusChanged { event_id, .. } | Self::InventoryChanged { event_id, .. } => {
                event_id
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderStatusChanged { .. } => "order_status_changed",
            Self::InventoryChanged { .. } => "inventory_changed",
        }
    }
}

/// What a POS event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PosEventOutcome {
    Duplicate,
    Applied,
    /// Valid but nothing to change (unknown order or item, unmapped status, regression)
    Ignored,
}

pub fn verify_signature(payload: &[u8], signature: &str, api_key: &str) -> Result<(), &'static str> {
    let sig_bytes = hex::decode(signature.trim()).map_err(|_| "Invalid signature hex")?;
    let mut mac =
        Hmac::<Sha256>::new_from_slice(api_key.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(payload);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "POS signature mismatch")
}

async fn find_order(
    store: &dyn Store,
    restaurant_id: &str,
    order_id: Option<&str>,
    order_number: Option<&str>,
    pos_order_id: Option<&str>,
) -> ServiceResult<Option<Order>> {
    if let Some(id) = order_id
        && let Some(order) = store.order(id).await?
        && order.restaurant_id == restaurant_id
    {
        return Ok(Some(order));
    }
    if let Some(pos_id) = pos_order_id
        && let Some(order) = store.order_by_pos_id(restaurant_id, pos_id).await?
    {
        return Ok(Some(order));
    }
    if let Some(number) = order_number {
        return Ok(store.order_by_number(restaurant_id, number).await?);
    }
    Ok(None)
}

/// Apply a verified POS event for `restaurant_id`
pub async fn handle_event(
    store: &dyn Store,
    restaurant_id: &str,
    vendor: &str,
    event: &PosEvent,
) -> ServiceResult<PosEventOutcome> {
    let dedup_key = format!("pos:{restaurant_id}:{}", event.event_id());
    if store.is_event_processed(&dedup_key).await? {
        tracing::debug!(restaurant_id, event_id = event.event_id(), "Duplicate POS event");
        return Ok(PosEventOutcome::Duplicate);
    }

    let outcome = match event {
        PosEvent::OrderStatusChanged {
            order_id,
            order_number,
            pos_order_id,
            status,
            ..
        } => {
            apply_status(
                store,
                restaurant_id,
                vendor,
                find_order(
                    store,
                    restaurant_id,
                    order_id.as_deref(),
                    order_number.as_deref(),
                    pos_order_id.as_deref(),
                )
                .await?,
                pos_order_id.as_deref(),
                status,
            )
            .await?
        }
        PosEvent::InventoryChanged {
            external_id,
            available,
            ..
        } => {
            if store
                .set_item_availability(restaurant_id, external_id, *available)
                .await?
            {
                tracing::info!(restaurant_id, external_id = %external_id, available, "Menu item availability changed by POS");
                PosEventOutcome::Applied
            } else {
                tracing::warn!(restaurant_id, external_id = %external_id, "POS inventory event for unknown item");
                PosEventOutcome::Ignored
            }
        }
    };

    store
        .record_event(&dedup_key, "pos", event.kind(), now_millis())
        .await?;
    Ok(outcome)
}

async fn apply_status(
    store: &dyn Store,
    restaurant_id: &str,
    vendor: &str,
    order: Option<Order>,
    pos_order_id: Option<&str>,
    raw_status: &str,
) -> ServiceResult<PosEventOutcome> {
    let Some(order) = order else {
        tracing::warn!(restaurant_id, raw_status, "POS status event for unknown order");
        return Ok(PosEventOutcome::Ignored);
    };
    let Some(target) = map_status(vendor, raw_status) else {
        tracing::info!(order_id = %order.id, vendor, raw_status, "Unmapped POS status ignored");
        return Ok(PosEventOutcome::Ignored);
    };

    let (_, applied) = update_with_retry(store, &order.id, |order| {
        let now = now_millis();
        let mut changed = false;
        if order.pos_order_id.is_none()
            && let Some(pos_id) = pos_order_id
        {
            order.pos_order_id = Some(pos_id.to_string());
            changed = true;
        }
        // Terminal or regressing moves from the POS are ignored, never errors
        let moved = if target == OrderStatus::Cancelled {
            lifecycle::cancel(order, Some(format!("Cancelled in {vendor}")), now).is_ok()
        } else {
            lifecycle::transition(order, target, TransitionMode::System, now).unwrap_or(false)
        };
        Ok((changed || moved, moved))
    })
    .await?;

    if applied {
        tracing::info!(order_id = %order.id, status = %target, "Order status updated from POS");
        Ok(PosEventOutcome::Applied)
    } else {
        Ok(PosEventOutcome::Ignored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_events() {
        let e: PosEvent = serde_json::from_str(
            r#"{"type":"order_status_changed","event_id":"e1","pos_order_id":"sq-1","status":"READY"}"#,
        )
        .unwrap();
        assert_eq!(e.event_id(), "e1");
        assert_eq!(e.kind(), "order_status_changed");

        let e: PosEvent = serde_json::from_str(
            r#"{"type":"inventory_changed","event_id":"e2","external_id":"x","available":false}"#,
        )
        .unwrap();
        assert!(matches!(e, PosEvent::InventoryChanged { available: false, .. }));

        assert!(serde_json::from_str::<PosEvent>(r#"{"type":"menu_deleted","event_id":"e3"}"#).is_err());
    }

    #[test]
    fn test_signature() {
        let body = br#"{"type":"inventory_changed"}"#;
        let mut mac = Hmac::<Sha256>::new_from_slice(b"pos-key").unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());
        assert!(verify_signature(body, &sig, "pos-key").is_ok());
        assert!(verify_signature(body, &sig, "other").is_err());
    }
}
