//! Price Calculator
//!
//! Pure function from resolved cart lines plus restaurant fee/tax settings to
//! the order's line snapshots and totals. All arithmetic is `Decimal`.

use super::{PricingError, ResolvedLine};
use crate::money::round_money;
use rust_decimal::Decimal;
use shared::models::{OrderItem, OrderTotals, RestaurantSettings, ServiceFeeType};

/// Priced cart: immutable line snapshots plus totals
#[derive(Debug, Clone, PartialEq)]
pub struct PricedCart {
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
}

/// Price a resolved cart
///
/// - unit price = variant price (else base price) + sum of extras
/// - service fee = percent of subtotal, or a fixed amount
/// - tax-inclusive prices: tax is extracted from the subtotal, not added
/// - total = subtotal + (added tax) + service fee + tip
///
/// Every amount is rounded to the precision of `settings.currency`.
pub fn calculate(
    lines: &[ResolvedLine],
    settings: &RestaurantSettings,
    tip: Decimal,
) -> Result<PricedCart, PricingError> {
    if lines.is_empty() {
        return Err(PricingError::EmptyCart);
    }
    if tip < Decimal::ZERO {
        return Err(PricingError::NegativeTip);
    }

    let currency = settings.currency.as_str();
    let round = |value: Decimal| round_money(value, currency);

    let items: Vec<OrderItem> = lines.iter().map(|l| price_line(l, currency)).collect();
    let subtotal = round(items.iter().map(|i| i.line_total).sum());

    let service_fee = if settings.service_fee_enabled {
        match settings.service_fee_type {
            ServiceFeeType::Percent => {
                round(subtotal * settings.service_fee_percent / Decimal::ONE_HUNDRED)
            }
            ServiceFeeType::Fixed => round(settings.service_fee_amount),
        }
    } else {
        Decimal::ZERO
    };

    let rate = settings.tax_rate;
    let tax = if rate.is_zero() {
        Decimal::ZERO
    } else if settings.include_tax {
        // P - P / (1 + r/100) == P * r / (100 + r)
        round(subtotal * rate / (Decimal::ONE_HUNDRED + rate))
    } else {
        round(subtotal * rate / Decimal::ONE_HUNDRED)
    };

    let tip = round(tip);
    let added_tax = if settings.include_tax { Decimal::ZERO } else { tax };
    let total = subtotal + added_tax + service_fee + tip;

    Ok(PricedCart {
        items,
        totals: OrderTotals {
            subtotal,
            tax,
            service_fee,
            tip,
            total,
        },
    })
}

fn price_line(line: &ResolvedLine, currency: &str) -> OrderItem {
    let base = line
        .variant
        .as_ref()
        .map(|v| v.price)
        .unwrap_or(line.base_price);
    let extras: Decimal = line.extras.iter().map(|e| e.price).sum();
    let unit_price = round_money(base + extras, currency);
    let line_total = round_money(unit_price * Decimal::from(line.quantity), currency);

    OrderItem {
        menu_item_id: line.menu_item_id.clone(),
        name: line.name.clone(),
        quantity: line.quantity,
        unit_price,
        variant: line.variant.clone(),
        extras: line.extras.clone(),
        notes: line.notes.clone(),
        line_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{ChosenExtra, ChosenVariant};
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(price: &str, quantity: i32) -> ResolvedLine {
        ResolvedLine {
            menu_item_id: "item".to_string(),
            name: "Item".to_string(),
            base_price: d(price),
            variant: None,
            extras: vec![],
            quantity,
            notes: None,
        }
    }

    fn settings(include_tax: bool) -> RestaurantSettings {
        RestaurantSettings {
            service_fee_enabled: true,
            service_fee_type: ServiceFeeType::Percent,
            service_fee_percent: d("10"),
            tax_rate: d("19"),
            include_tax,
            ..RestaurantSettings::default()
        }
    }

    #[test]
    fn test_tax_inclusive_scenario() {
        let cart = calculate(&[line("25.00", 2)], &settings(true), Decimal::ZERO).unwrap();
        assert_eq!(cart.totals.subtotal, d("50.00"));
        assert_eq!(cart.totals.service_fee, d("5.00"));
        assert_eq!(cart.totals.tax, d("7.98"));
        assert_eq!(cart.totals.total, d("55.00"));
    }

    #[test]
    fn test_tax_exclusive_scenario() {
        let cart = calculate(&[line("25.00", 2)], &settings(false), Decimal::ZERO).unwrap();
        assert_eq!(cart.totals.tax, d("9.50"));
        assert_eq!(cart.totals.total, d("64.50"));
    }

    #[test]
    fn test_inclusive_total_excludes_tax() {
        let tip = d("3.00");
        for price in ["0.99", "7.77", "13.13", "120.00"] {
            let cart = calculate(&[line(price, 3)], &settings(true), tip).unwrap();
            let t = cart.totals;
            assert_eq!(t.total, t.subtotal + t.service_fee + t.tip);

            let cart = calculate(&[line(price, 3)], &settings(false), tip).unwrap();
            assert!(cart.totals.total >= cart.totals.subtotal);
        }
    }

    #[test]
    fn test_tax_extraction_round_trip() {
        let p = d("59.90");
        let cart = calculate(&[line("59.90", 1)], &settings(true), Decimal::ZERO).unwrap();
        let net = p - cart.totals.tax;
        assert!((net + cart.totals.tax - p).abs() <= d("0.01"));
        // 59.90 * 19 / 119 = 9.5638...
        assert_eq!(cart.totals.tax, d("9.56"));
    }

    #[test]
    fn test_variant_and_extras_in_unit_price() {
        let mut l = line("9.50", 3);
        l.variant = Some(ChosenVariant {
            id: "large".to_string(),
            name: "Large".to_string(),
            price: d("12.00"),
        });
        l.extras = vec![
            ChosenExtra {
                id: "a".to_string(),
                name: "A".to_string(),
                price: d("0.50"),
            },
            ChosenExtra {
                id: "b".to_string(),
                name: "B".to_string(),
                price: d("1.25"),
            },
        ];
        let cart = calculate(&[l], &RestaurantSettings::default(), Decimal::ZERO).unwrap();
        assert_eq!(cart.items[0].unit_price, d("13.75"));
        assert_eq!(cart.items[0].line_total, d("41.25"));
        assert_eq!(cart.totals.total, d("41.25"));
    }

    #[test]
    fn test_fixed_fee_and_tip() {
        let s = RestaurantSettings {
            service_fee_enabled: true,
            service_fee_type: ServiceFeeType::Fixed,
            service_fee_amount: d("2.00"),
            tax_rate: Decimal::ZERO,
            ..RestaurantSettings::default()
        };
        let cart = calculate(&[line("10.00", 1)], &s, d("1.50")).unwrap();
        assert_eq!(cart.totals.service_fee, d("2.00"));
        assert_eq!(cart.totals.tip, d("1.50"));
        assert_eq!(cart.totals.total, d("13.50"));
    }

    #[test]
    fn test_three_decimal_currency_keeps_fils() {
        let s = RestaurantSettings {
            currency: "KWD".to_string(),
            ..settings(false)
        };
        let cart = calculate(&[line("1.125", 1)], &s, Decimal::ZERO).unwrap();
        assert_eq!(cart.totals.subtotal, d("1.125"));
        // 10% fee and 19% tax on 1.125
        assert_eq!(cart.totals.service_fee, d("0.113"));
        assert_eq!(cart.totals.tax, d("0.214"));
        assert_eq!(cart.totals.total, d("1.452"));
    }

    #[test]
    fn test_disabled_fee_and_negative_tip() {
        let mut s = settings(false);
        s.service_fee_enabled = false;
        let cart = calculate(&[line("10.00", 1)], &s, Decimal::ZERO).unwrap();
        assert_eq!(cart.totals.service_fee, Decimal::ZERO);

        assert_eq!(
            calculate(&[line("10.00", 1)], &s, d("-1")),
            Err(PricingError::NegativeTip)
        );
        assert_eq!(
            calculate(&[], &s, Decimal::ZERO),
            Err(PricingError::EmptyCart)
        );
    }
}
