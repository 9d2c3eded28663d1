//! Order enums shared by every writer of the order aggregate
//!
//! All enums serialize as SCREAMING_SNAKE_CASE on the wire and are stored
//! with the same spelling (`as_db` / `from_db`).

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Order Type
// ============================================================================

/// How the order is served
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    #[default]
    DineIn,
    Takeaway,
    Delivery,
}

impl OrderType {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "DINE_IN" => Some(Self::DineIn),
            "TAKEAWAY" => Some(Self::Takeaway),
            "DELIVERY" => Some(Self::Delivery),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::DineIn => "DINE_IN",
            Self::Takeaway => "TAKEAWAY",
            Self::Delivery => "DELIVERY",
        }
    }
}

// ============================================================================
// Fulfillment Status
// ============================================================================

/// Fulfillment status of an order
///
/// `PENDING → CONFIRMED → PREPARING → READY → DELIVERED → PAID`, with
/// `CANCELLED` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Delivered,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "PREPARING" => Some(Self::Preparing),
            "READY" => Some(Self::Ready),
            "DELIVERED" => Some(Self::Delivered),
            "PAID" => Some(Self::Paid),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Preparing => "PREPARING",
            Self::Ready => "READY",
            Self::Delivered => "DELIVERED",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Position on the forward fulfillment path (`None` for CANCELLED)
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Preparing => Some(2),
            Self::Ready => Some(3),
            Self::Delivered => Some(4),
            Self::Paid => Some(5),
            Self::Cancelled => None,
        }
    }

    /// No transition leaves a terminal status in normal operation
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db())
    }
}

// ============================================================================
// Payment Status
// ============================================================================

/// Payment axis, orthogonal to fulfillment status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Paid,
    Failed,
    Refunded,
    Unpaid,
}

impl PaymentStatus {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "PAID" => Some(Self::Paid),
            "FAILED" => Some(Self::Failed),
            "REFUNDED" => Some(Self::Refunded),
            "UNPAID" => Some(Self::Unpaid),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Paid => "PAID",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
            Self::Unpaid => "UNPAID",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db())
    }
}

// ============================================================================
// Payment Method
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    #[default]
    Card,
    Paypal,
    Stripe,
}

impl PaymentMethod {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "CASH" => Some(Self::Cash),
            "CARD" => Some(Self::Card),
            "PAYPAL" => Some(Self::Paypal),
            "STRIPE" => Some(Self::Stripe),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Card => "CARD",
            Self::Paypal => "PAYPAL",
            Self::Stripe => "STRIPE",
        }
    }
}

// ============================================================================
// POS Sync Status
// ============================================================================

/// Outcome of the best-effort push to the restaurant's POS
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PosSyncStatus {
    /// Not pushed yet
    #[default]
    Pending,
    Synced,
    Failed,
    /// Restaurant has no POS integration enabled
    Disabled,
}

impl PosSyncStatus {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "SYNCED" => Some(Self::Synced),
            "FAILED" => Some(Self::Failed),
            "DISABLED" => Some(Self::Disabled),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Synced => "SYNCED",
            Self::Failed => "FAILED",
            Self::Disabled => "DISABLED",
        }
    }
}

// ============================================================================
// Settlement Type
// ============================================================================

/// How funds were routed for an order's payment intent
///
/// Also written to provider metadata as `paymentType`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementType {
    /// Platform account, Connect not enabled
    Direct,
    /// Funds transferred to the restaurant's connected account minus platform fee
    ConnectSplit,
    /// Connect enabled but account not ready: funds stay on the platform account
    DirectFallback,
    /// Hosted payment page (PayTabs)
    Redirect,
}

impl SettlementType {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "DIRECT" => Some(Self::Direct),
            "CONNECT_SPLIT" => Some(Self::ConnectSplit),
            "DIRECT_FALLBACK" => Some(Self::DirectFallback),
            "REDIRECT" => Some(Self::Redirect),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Direct => "DIRECT",
            Self::ConnectSplit => "CONNECT_SPLIT",
            Self::DirectFallback => "DIRECT_FALLBACK",
            Self::Redirect => "REDIRECT",
        }
    }
}
