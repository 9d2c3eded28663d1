//! Money helpers
//!
//! Amounts are `Decimal` rounded half away from zero to the currency's
//! minor-unit precision (2 dp for EUR, 3 for KWD, 0 for JPY). Provider APIs
//! take integer minor units with the same exponent.

use rust_decimal::prelude::*;

/// Round to the currency's minor-unit precision, half away from zero
#[inline]
pub fn round_money(value: Decimal, currency: &str) -> Decimal {
    value.round_dp_with_strategy(
        currency_exponent(currency),
        RoundingStrategy::MidpointAwayFromZero,
    )
}

/// Number of minor-unit digits for an ISO-4217 currency
pub fn currency_exponent(currency: &str) -> u32 {
    match currency.to_ascii_uppercase().as_str() {
        "JPY" | "KRW" | "VND" | "CLP" | "ISK" | "UGX" | "XAF" | "XOF" => 0,
        "BHD" | "KWD" | "OMR" | "JOD" | "TND" | "IQD" | "LYD" => 3,
        _ => 2,
    }
}

/// Convert a major-unit amount to provider minor units
///
/// Returns `None` when the amount does not fit an `i64`.
pub fn to_minor_units(amount: Decimal, currency: &str) -> Option<i64> {
    let factor = Decimal::from(10_i64.pow(currency_exponent(currency)));
    (amount * factor)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Convert provider minor units back to a major-unit amount
pub fn from_minor_units(minor: i64, currency: &str) -> Decimal {
    Decimal::new(minor, currency_exponent(currency))
}

/// `round(amount × percent / 100)` in minor units
pub fn percent_of_minor(amount_minor: i64, percent: Decimal) -> i64 {
    (Decimal::from(amount_minor) * percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}
