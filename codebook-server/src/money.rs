//! Money arithmetic using rust_decimal
//!
//! Prices are stored as `f64` currency units; all sums and comparisons go
//! through `Decimal`. The payment processor works in minor units (cents).

use rust_decimal::prelude::*;
use shared::models::CartItem;

const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// `None` for NaN, infinities and values outside `Decimal`'s range
#[inline]
pub fn to_decimal(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value)
}

/// Convert back to `f64`, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Σ price × quantity; `None` when a price is out of range or the sum overflows
pub fn cart_total(items: &[CartItem]) -> Option<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |total, i| {
        let line = to_decimal(i.price)?.checked_mul(Decimal::from(i.quantity))?;
        total.checked_add(line)
    })
}

/// `|a − b| < 0.01`
pub fn amounts_match(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < MONEY_TOLERANCE
}

/// Currency units → minor units, rounded half away from zero
pub fn to_minor_units(amount: f64) -> Option<i64> {
    to_decimal(amount)?
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

pub fn from_minor_units(minor: i64) -> f64 {
    to_f64(Decimal::new(minor, DECIMAL_PLACES))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: f64, quantity: i64) -> CartItem {
        CartItem {
            product_id: "p".into(),
            name: "Book".into(),
            price,
            quantity,
        }
    }

    #[test]
    fn test_cart_total_is_exact() {
        let items = vec![item(0.1, 3), item(19.99, 1)];
        assert_eq!(to_f64(cart_total(&items).unwrap()), 20.29);
    }

    #[test]
    fn test_cart_total_out_of_range() {
        assert_eq!(to_decimal(1e30), None);
        assert_eq!(to_decimal(f64::INFINITY), None);
        assert_eq!(cart_total(&[item(1e30, 1)]), None);
        assert_eq!(cart_total(&[item(1e20, 1_000_000_000)]), None);
        assert_eq!(cart_total(&[item(7e28, 1), item(7e28, 1)]), None);
    }

    #[test]
    fn test_amounts_match_tolerance() {
        let total = Decimal::from_str("20.00").unwrap();
        let d = |v: f64| to_decimal(v).unwrap();
        assert!(amounts_match(d(20.0), total));
        assert!(amounts_match(d(20.005), total));
        assert!(!amounts_match(d(20.02), total));
        assert!(!amounts_match(d(19.0), total));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(20.0), Some(2000));
        assert_eq!(to_minor_units(19.99), Some(1999));
        assert_eq!(to_minor_units(12.5), Some(1250));
        assert_eq!(to_minor_units(1e27), None);
        assert_eq!(from_minor_units(1250), 12.5);
    }
}
