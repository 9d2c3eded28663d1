//! Orders: creation, staff updates and the shared compare-and-set writer

pub mod service;

pub use service::{
    CreateOrderRequest, OrderService, OrderUpdateRequest, PaymentUpdate, StatusUpdate,
    UpdateCapabilities,
};

use crate::db::Store;
use crate::error::{ServiceError, ServiceResult};
use crate::util::now_millis;
use shared::error::{AppError, ErrorCode};
use shared::models::Order;

/// Attempts before a contended order write gives up
pub const MAX_WRITE_ATTEMPTS: usize = 5;

/// Load, mutate and compare-and-set an order, reloading on version conflicts
///
/// `apply` reports whether it changed the order; unchanged orders are not
/// written. It may run more than once and must be free of side effects.
pub async fn update_with_retry<T, F>(
    store: &dyn Store,
    order_id: &str,
    mut apply: F,
) -> ServiceResult<(Order, T)>
where
    F: FnMut(&mut Order) -> Result<(bool, T), ServiceError>,
{
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let mut order = store
            .order(order_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(order_id))?;
        let expected = order.version;

        let (changed, out) = apply(&mut order)?;
        if !changed {
            return Ok((order, out));
        }

        order.updated_at = now_millis();
        if store.update_order(&order, expected).await? {
            order.version = expected + 1;
            return Ok((order, out));
        }
        tracing::debug!(order_id, attempt, "Order version conflict, retrying");
    }

    tracing::warn!(order_id, "Order write kept conflicting, giving up");
    Err(AppError::new(ErrorCode::SystemBusy)
        .with_detail("order_id", order_id)
        .into())
}
