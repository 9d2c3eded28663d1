//! POS status vocabulary per vendor

use shared::order::OrderStatus;

/// Map a vendor's order status to ours; `None` for statuses we ignore
pub fn map_status(vendor: &str, raw: &str) -> Option<OrderStatus> {
    let raw = raw.trim().to_ascii_uppercase();
    let raw = raw.as_str();
    match vendor.to_ascii_lowercase().as_str() {
        "square" => match raw {
            "OPEN" | "ACCEPTED" => Some(OrderStatus::Confirmed),
            "IN_PROGRESS" => Some(OrderStatus::Preparing),
            "READY" => Some(OrderStatus::Ready),
            "COMPLETED" => Some(OrderStatus::Delivered),
            "CANCELED" => Some(OrderStatus::Cancelled),
            _ => None,
        },
        "toast" => match raw {
            "APPROVED" => Some(OrderStatus::Confirmed),
            "SENT" | "IN_PREPARATION" => Some(OrderStatus::Preparing),
            "READY_FOR_PICKUP" | "READY" => Some(OrderStatus::Ready),
            "FULFILLED" | "CLOSED" => Some(OrderStatus::Delivered),
            "VOIDED" => Some(OrderStatus::Cancelled),
            _ => None,
        },
        "lightspeed" => match raw {
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            "PROCESSING" | "PREPARING" => Some(OrderStatus::Preparing),
            "READY" => Some(OrderStatus::Ready),
            "DELIVERED" | "DONE" => Some(OrderStatus::Delivered),
            "CANCELLED" | "REJECTED" => Some(OrderStatus::Cancelled),
            _ => None,
        },
        // Generic vendors speak our vocabulary
        _ => OrderStatus::from_db(raw),
    }
}
