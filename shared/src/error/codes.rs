//! Unified error codes for the settlement platform
//!
//! This module defines all error codes used across the settlement service and its clients.
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Restaurant errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Menu errors
//! - 7xxx: POS errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,
    /// Too many requests from the same source
    RateLimited = 9,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Out-of-band status transition without the override capability
    OverrideRequired = 2006,

    // ==================== 3xxx: Restaurant ====================
    /// Restaurant not found
    RestaurantNotFound = 3002,
    /// Subscription blocked (canceled or unpaid)
    SubscriptionBlocked = 3006,
    /// Stripe Connect account missing or inaccessible
    ConnectAccountUnavailable = 3101,
    /// Stripe Connect onboarding could not be started
    ConnectOnboardingFailed = 3102,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has already been paid
    OrderAlreadyPaid = 4002,
    /// Order is empty
    OrderEmpty = 4007,
    /// Order has been cancelled
    OrderCancelled = 4008,
    /// Status transition not allowed by the order lifecycle
    InvalidStatusTransition = 4009,
    /// Item quantity is zero, negative or too large
    InvalidQuantity = 4010,
    /// Settlement amount does not match the order total
    OrderAmountMismatch = 4011,

    // ==================== 5xxx: Payment ====================
    /// Payment processing failed
    PaymentFailed = 5001,
    /// Invalid payment method
    PaymentInvalidMethod = 5003,
    /// Payment has already been refunded
    PaymentAlreadyRefunded = 5004,
    /// Provider declined the payment
    PaymentDeclined = 5006,
    /// Order has no payment intent to confirm
    PaymentIntentMissing = 5007,
    /// No payment provider available for this region
    ProviderUnavailable = 5101,
    /// Provider temporarily unreachable, settlement can be retried
    PaymentTransient = 5102,
    /// Webhook signature could not be verified
    WebhookSignatureInvalid = 5201,

    // ==================== 6xxx: Menu ====================
    /// Menu item not found
    MenuItemNotFound = 6001,
    /// Menu item is currently unavailable
    MenuItemUnavailable = 6003,
    /// Menu category not found
    CategoryNotFound = 6101,
    /// Variant not found on menu item
    VariantNotFound = 6201,
    /// Extra not found on menu item
    ExtraNotFound = 6301,

    // ==================== 7xxx: POS ====================
    /// POS integration is not configured for this restaurant
    PosNotConfigured = 7001,
    /// POS vendor has no registered adapter
    PosVendorUnsupported = 7002,
    /// POS adapter call failed
    PosSyncFailed = 7003,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timeout
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
    /// System busy (concurrent modification, retry later)
    SystemBusy = 9404,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",
            ErrorCode::RateLimited => "Too many requests, try again later",

            // Auth
            ErrorCode::NotAuthenticated => "Caller is not authenticated",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::OverrideRequired => "Status override capability is required",

            // Restaurant
            ErrorCode::RestaurantNotFound => "Restaurant not found",
            ErrorCode::SubscriptionBlocked => "Subscription is blocked",
            ErrorCode::ConnectAccountUnavailable => "Stripe Connect account is unavailable",
            ErrorCode::ConnectOnboardingFailed => "Stripe Connect onboarding failed",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderAlreadyPaid => "Order has already been paid",
            ErrorCode::OrderEmpty => "Order is empty",
            ErrorCode::OrderCancelled => "Order has been cancelled",
            ErrorCode::InvalidStatusTransition => "Status transition is not allowed",
            ErrorCode::InvalidQuantity => "Invalid item quantity",
            ErrorCode::OrderAmountMismatch => "Amount does not match the order total",

            // Payment
            ErrorCode::PaymentFailed => "Payment processing failed",
            ErrorCode::PaymentInvalidMethod => "Invalid payment method",
            ErrorCode::PaymentAlreadyRefunded => "Payment has already been refunded",
            ErrorCode::PaymentDeclined => "Payment was declined by the provider",
            ErrorCode::PaymentIntentMissing => "Order has no payment intent",
            ErrorCode::ProviderUnavailable => "No payment provider for this region",
            ErrorCode::PaymentTransient => "Payment provider temporarily unavailable",
            ErrorCode::WebhookSignatureInvalid => "Webhook signature verification failed",

            // Menu
            ErrorCode::MenuItemNotFound => "Menu item not found",
            ErrorCode::MenuItemUnavailable => "Menu item is unavailable",
            ErrorCode::CategoryNotFound => "Category not found",
            ErrorCode::VariantNotFound => "Variant not found",
            ErrorCode::ExtraNotFound => "Extra not found",

            // POS
            ErrorCode::PosNotConfigured => "POS integration is not configured",
            ErrorCode::PosVendorUnsupported => "POS vendor is not supported",
            ErrorCode::PosSyncFailed => "POS synchronization failed",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::SystemBusy => "System busy, please retry later",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),
            9 => Ok(ErrorCode::RateLimited),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2006 => Ok(ErrorCode::OverrideRequired),

            // Restaurant
            3002 => Ok(ErrorCode::RestaurantNotFound),
            3006 => Ok(ErrorCode::SubscriptionBlocked),
            3101 => Ok(ErrorCode::ConnectAccountUnavailable),
            3102 => Ok(ErrorCode::ConnectOnboardingFailed),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderAlreadyPaid),
            4007 => Ok(ErrorCode::OrderEmpty),
            4008 => Ok(ErrorCode::OrderCancelled),
            4009 => Ok(ErrorCode::InvalidStatusTransition),
            4010 => Ok(ErrorCode::InvalidQuantity),
            4011 => Ok(ErrorCode::OrderAmountMismatch),

            // Payment
            5001 => Ok(ErrorCode::PaymentFailed),
            5003 => Ok(ErrorCode::PaymentInvalidMethod),
            5004 => Ok(ErrorCode::PaymentAlreadyRefunded),
            5006 => Ok(ErrorCode::PaymentDeclined),
            5007 => Ok(ErrorCode::PaymentIntentMissing),
            5101 => Ok(ErrorCode::ProviderUnavailable),
            5102 => Ok(ErrorCode::PaymentTransient),
            5201 => Ok(ErrorCode::WebhookSignatureInvalid),

            // Menu
            6001 => Ok(ErrorCode::MenuItemNotFound),
            6003 => Ok(ErrorCode::MenuItemUnavailable),
            6101 => Ok(ErrorCode::CategoryNotFound),
            6201 => Ok(ErrorCode::VariantNotFound),
            6301 => Ok(ErrorCode::ExtraNotFound),

            // POS
            7001 => Ok(ErrorCode::PosNotConfigured),
            7002 => Ok(ErrorCode::PosVendorUnsupported),
            7003 => Ok(ErrorCode::PosSyncFailed),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),
            9404 => Ok(ErrorCode::SystemBusy),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
