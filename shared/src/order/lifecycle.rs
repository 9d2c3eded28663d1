//! Order state machine
//!
//! Fulfillment follows a fixed forward table. Staff move one step at a time,
//! system writers (payment reconciliation, POS callbacks) only ever move
//! forward, and out-of-band moves need an explicit override.
//!
//! Every timestamp is stamped the first time its state is entered and never
//! rewritten.

use super::types::{OrderStatus, PaymentMethod, PaymentStatus};
use crate::error::{AppError, ErrorCode};
use crate::models::{Order, OrderTimestamps};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("order is cancelled")]
    Cancelled,

    #[error("no transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("transition from {from} to {to} requires override")]
    OverrideRequired { from: OrderStatus, to: OrderStatus },
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        let code = match &err {
            LifecycleError::Cancelled => ErrorCode::OrderCancelled,
            LifecycleError::InvalidTransition { .. } => ErrorCode::InvalidStatusTransition,
            LifecycleError::OverrideRequired { .. } => ErrorCode::OverrideRequired,
        };
        let app = AppError::with_message(code, err.to_string());
        match err {
            LifecycleError::InvalidTransition { from, to }
            | LifecycleError::OverrideRequired { from, to } => app
                .with_detail("from", from.as_db())
                .with_detail("to", to.as_db()),
            LifecycleError::Cancelled => app,
        }
    }
}

/// Who is driving a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionMode {
    /// Staff UI: exactly the next step of the table
    Staff,
    /// Payment / POS callbacks: forward only, skipping allowed, regressions ignored
    System,
    /// Explicit override capability: any non-cancel target
    Override,
}

/// Next status of the staff-driven flow
pub fn next_status(current: OrderStatus) -> Option<OrderStatus> {
    match current {
        OrderStatus::Pending => Some(OrderStatus::Confirmed),
        OrderStatus::Confirmed => Some(OrderStatus::Preparing),
        OrderStatus::Preparing => Some(OrderStatus::Ready),
        OrderStatus::Ready => Some(OrderStatus::Delivered),
        OrderStatus::Delivered => Some(OrderStatus::Paid),
        OrderStatus::Paid | OrderStatus::Cancelled => None,
    }
}

/// Stamp the timestamp that belongs to `status`, unless already set
fn stamp(ts: &mut OrderTimestamps, status: OrderStatus, now: i64) {
    let slot = match status {
        OrderStatus::Pending => return,
        OrderStatus::Confirmed => &mut ts.confirmed_at,
        OrderStatus::Preparing => &mut ts.prepared_at,
        OrderStatus::Ready => &mut ts.ready_at,
        OrderStatus::Delivered => &mut ts.delivered_at,
        OrderStatus::Paid => &mut ts.completed_at,
        OrderStatus::Cancelled => &mut ts.cancelled_at,
    };
    if slot.is_none() {
        *slot = Some(now);
    }
}

/// Move the fulfillment status of `order` to `to`
///
/// Returns `Ok(false)` when nothing changed (same status, or a regression
/// requested by a system writer). Cancellation goes through [`cancel`].
pub fn transition(
    order: &mut Order,
    to: OrderStatus,
    mode: TransitionMode,
    now: i64,
) -> Result<bool, LifecycleError> {
    let from = order.status;
    if from == OrderStatus::Cancelled {
        return Err(LifecycleError::Cancelled);
    }
    if to == from {
        return Ok(false);
    }
    if to == OrderStatus::Cancelled {
        return Err(LifecycleError::InvalidTransition { from, to });
    }

    match mode {
        TransitionMode::Staff => {
            if next_status(from) != Some(to) {
                return Err(if from.is_terminal() {
                    LifecycleError::InvalidTransition { from, to }
                } else {
                    LifecycleError::OverrideRequired { from, to }
                });
            }
        }
        TransitionMode::System => {
            if to.rank() <= from.rank() {
                return Ok(false);
            }
        }
        TransitionMode::Override => {}
    }

    order.status = to;
    stamp(&mut order.timestamps, to, now);
    Ok(true)
}

/// Cancel an order from any non-terminal status, recording the reason
pub fn cancel(order: &mut Order, reason: Option<String>, now: i64) -> Result<(), LifecycleError> {
    match order.status {
        OrderStatus::Cancelled => Err(LifecycleError::Cancelled),
        OrderStatus::Paid => Err(LifecycleError::InvalidTransition {
            from: OrderStatus::Paid,
            to: OrderStatus::Cancelled,
        }),
        _ => {
            order.status = OrderStatus::Cancelled;
            order.cancel_reason = reason;
            stamp(&mut order.timestamps, OrderStatus::Cancelled, now);
            Ok(())
        }
    }
}

/// Apply a successful payment
///
/// Returns `false` when the order was already paid or refunded (idempotent
/// no-op). A still-PENDING order is confirmed; a further-advanced status is
/// kept.
pub fn mark_paid(order: &mut Order, method: PaymentMethod, now: i64) -> bool {
    if matches!(order.payment_status, PaymentStatus::Paid | PaymentStatus::Refunded) {
        return false;
    }
    order.payment_status = PaymentStatus::Paid;
    order.payment_method = method;
    if order.timestamps.paid_at.is_none() {
        order.timestamps.paid_at = Some(now);
    }
    if order.status == OrderStatus::Pending {
        order.status = OrderStatus::Confirmed;
        stamp(&mut order.timestamps, OrderStatus::Confirmed, now);
    }
    true
}

/// Record a failed payment attempt; never overrides a settled payment
pub fn mark_payment_failed(order: &mut Order) -> bool {
    match order.payment_status {
        PaymentStatus::Paid | PaymentStatus::Refunded | PaymentStatus::Failed => false,
        _ => {
            order.payment_status = PaymentStatus::Failed;
            true
        }
    }
}

/// Record a refund; only a paid order can be refunded
pub fn mark_refunded(order: &mut Order) -> bool {
    if order.payment_status != PaymentStatus::Paid {
        return false;
    }
    order.payment_status = PaymentStatus::Refunded;
    true
}

/// Staff marks an unsettled order as not paid (e.g. guest left without paying)
pub fn mark_unpaid(order: &mut Order) -> bool {
    match order.payment_status {
        PaymentStatus::Paid | PaymentStatus::Refunded | PaymentStatus::Unpaid => false,
        _ => {
            order.payment_status = PaymentStatus::Unpaid;
            true
        }
    }
}

/// Paid orders are never deleted
pub fn can_delete(order: &Order) -> bool {
    order.payment_status != PaymentStatus::Paid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderTotals;
    use crate::order::types::{OrderType, PosSyncStatus};

    fn order(status: OrderStatus, payment_status: PaymentStatus) -> Order {
        Order {
            id: "o-1".to_string(),
            restaurant_id: "r-1".to_string(),
            order_number: "ORD-00001".to_string(),
            order_type: OrderType::DineIn,
            status,
            payment_status,
            payment_method: PaymentMethod::Card,
            payment_intent_id: None,
            payment_provider: None,
            settlement_type: None,
            currency: "EUR".to_string(),
            totals: OrderTotals::default(),
            items: vec![],
            timestamps: OrderTimestamps::default(),
            cancel_reason: None,
            pos_sync_status: PosSyncStatus::Pending,
            pos_order_id: None,
            customer_name: None,
            table_number: None,
            version: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_next_status_table() {
        let mut status = OrderStatus::Pending;
        let mut path = vec![status];
        while let Some(next) = next_status(status) {
            path.push(next);
            status = next;
        }
        assert_eq!(
            path,
            vec![
                OrderStatus::Pending,
                OrderStatus::Confirmed,
                OrderStatus::Preparing,
                OrderStatus::Ready,
                OrderStatus::Delivered,
                OrderStatus::Paid,
            ]
        );
        assert_eq!(next_status(OrderStatus::Cancelled), None);
    }

    #[test]
    fn test_staff_steps_forward_and_stamps_once() {
        let mut o = order(OrderStatus::Pending, PaymentStatus::Pending);
        assert!(transition(&mut o, OrderStatus::Confirmed, TransitionMode::Staff, 100).unwrap());
        assert_eq!(o.timestamps.confirmed_at, Some(100));

        // Override back and forward again keeps the first stamp
        transition(&mut o, OrderStatus::Pending, TransitionMode::Override, 200).unwrap();
        transition(&mut o, OrderStatus::Confirmed, TransitionMode::Staff, 300).unwrap();
        assert_eq!(o.timestamps.confirmed_at, Some(100));
    }

    #[test]
    fn test_staff_cannot_skip_or_regress() {
        let mut o = order(OrderStatus::Confirmed, PaymentStatus::Pending);
        let err = transition(&mut o, OrderStatus::Ready, TransitionMode::Staff, 1).unwrap_err();
        assert!(matches!(err, LifecycleError::OverrideRequired { .. }));

        let err = transition(&mut o, OrderStatus::Pending, TransitionMode::Staff, 1).unwrap_err();
        assert!(matches!(err, LifecycleError::OverrideRequired { .. }));
        assert_eq!(o.status, OrderStatus::Confirmed);

        let mut paid = order(OrderStatus::Paid, PaymentStatus::Paid);
        let err = transition(&mut paid, OrderStatus::Ready, TransitionMode::Staff, 1).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn test_override_allows_out_of_band() {
        let mut o = order(OrderStatus::Pending, PaymentStatus::Pending);
        assert!(transition(&mut o, OrderStatus::Ready, TransitionMode::Override, 5).unwrap());
        assert_eq!(o.status, OrderStatus::Ready);
        assert_eq!(o.timestamps.ready_at, Some(5));
        assert_eq!(o.timestamps.confirmed_at, None);
    }

    #[test]
    fn test_system_is_forward_only() {
        let mut o = order(OrderStatus::Ready, PaymentStatus::Pending);
        assert!(!transition(&mut o, OrderStatus::Confirmed, TransitionMode::System, 1).unwrap());
        assert_eq!(o.status, OrderStatus::Ready);
        assert!(transition(&mut o, OrderStatus::Delivered, TransitionMode::System, 2).unwrap());
        assert_eq!(o.timestamps.delivered_at, Some(2));
    }

    #[test]
    fn test_cancelled_blocks_everything() {
        let mut o = order(OrderStatus::Preparing, PaymentStatus::Pending);
        cancel(&mut o, Some("guest left".to_string()), 9).unwrap();
        assert_eq!(o.status, OrderStatus::Cancelled);
        assert_eq!(o.timestamps.cancelled_at, Some(9));
        assert_eq!(o.cancel_reason.as_deref(), Some("guest left"));

        for mode in [TransitionMode::Staff, TransitionMode::System, TransitionMode::Override] {
            assert_eq!(
                transition(&mut o, OrderStatus::Ready, mode, 10),
                Err(LifecycleError::Cancelled)
            );
        }
        assert_eq!(cancel(&mut o, None, 11), Err(LifecycleError::Cancelled));
        assert_eq!(o.timestamps.cancelled_at, Some(9));
    }

    #[test]
    fn test_cannot_cancel_completed_order() {
        let mut o = order(OrderStatus::Paid, PaymentStatus::Paid);
        assert!(matches!(
            cancel(&mut o, None, 1),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_mark_paid_confirms_pending_once() {
        let mut o = order(OrderStatus::Pending, PaymentStatus::Pending);
        assert!(mark_paid(&mut o, PaymentMethod::Card, 50));
        assert_eq!(o.status, OrderStatus::Confirmed);
        assert_eq!(o.payment_status, PaymentStatus::Paid);
        assert_eq!(o.timestamps.paid_at, Some(50));
        assert_eq!(o.timestamps.confirmed_at, Some(50));

        assert!(!mark_paid(&mut o, PaymentMethod::Card, 60));
        assert_eq!(o.timestamps.paid_at, Some(50));
    }

    #[test]
    fn test_mark_paid_keeps_advanced_status() {
        let mut o = order(OrderStatus::Ready, PaymentStatus::Pending);
        assert!(mark_paid(&mut o, PaymentMethod::Card, 1));
        assert_eq!(o.status, OrderStatus::Ready);
        assert_eq!(o.timestamps.confirmed_at, None);
    }

    #[test]
    fn test_failure_and_refund_guards() {
        let mut paid = order(OrderStatus::Confirmed, PaymentStatus::Paid);
        assert!(!mark_payment_failed(&mut paid));
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert!(!mark_unpaid(&mut paid));
        assert!(mark_refunded(&mut paid));
        assert_eq!(paid.payment_status, PaymentStatus::Refunded);
        assert!(!mark_paid(&mut paid, PaymentMethod::Card, 9));
        assert_eq!(paid.payment_status, PaymentStatus::Refunded);

        let mut pending = order(OrderStatus::Pending, PaymentStatus::Pending);
        assert!(!mark_refunded(&mut pending));
        assert!(mark_payment_failed(&mut pending));
        assert_eq!(pending.payment_status, PaymentStatus::Failed);
    }

    #[test]
    fn test_deletion_guard() {
        assert!(!can_delete(&order(OrderStatus::Confirmed, PaymentStatus::Paid)));
        assert!(can_delete(&order(OrderStatus::Pending, PaymentStatus::Pending)));
        assert!(can_delete(&order(OrderStatus::Cancelled, PaymentStatus::Failed)));
    }

    #[test]
    fn test_error_mapping() {
        let err: AppError = LifecycleError::OverrideRequired {
            from: OrderStatus::Pending,
            to: OrderStatus::Ready,
        }
        .into();
        assert_eq!(err.code, ErrorCode::OverrideRequired);
        assert_eq!(err.details.unwrap().get("to").unwrap(), "READY");

        let err: AppError = LifecycleError::Cancelled.into();
        assert_eq!(err.code, ErrorCode::OrderCancelled);
    }
}
