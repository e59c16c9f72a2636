//! Money calculation utilities using rust_decimal for precision
//!
//! All calculations are done using `Decimal` internally, then converted to `f64`
//! for storage/serialization.

use rust_decimal::prelude::*;
use thiserror::Error;

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// A monetary result left the `Decimal` range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Monetary amount out of range")]
pub struct AmountOverflow;

pub type MoneyResult<T> = Result<T, AmountOverflow>;

/// Whether `value` survives conversion to `Decimal`
pub fn is_representable(value: f64) -> bool {
    Decimal::from_f64(value).is_some()
}

/// Convert f64 to Decimal for calculation
///
/// NaN/Infinity logs an error and becomes ZERO rather than poisoning a total.
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_else(|| {
        tracing::error!(value = ?value, "Non-finite f64 in monetary calculation, defaulting to zero");
        Decimal::ZERO
    })
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_else(|| {
            tracing::error!(value = %value, "Decimal out of f64 range, defaulting to zero");
            0.0
        })
}

/// `unit_price × quantity`, zero for free items
pub fn line_subtotal(unit_price: f64, quantity: i32, is_free: bool) -> MoneyResult<f64> {
    if is_free {
        return Ok(0.0);
    }
    to_decimal(unit_price)
        .checked_mul(Decimal::from(quantity))
        .map(to_f64)
        .ok_or(AmountOverflow)
}

/// Sum of monetary values with precise arithmetic
pub fn sum_amounts(values: impl IntoIterator<Item = f64>) -> MoneyResult<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(to_decimal(v)))
        .ok_or(AmountOverflow)
}

/// Compare two monetary values for equality (within 0.01 tolerance)
pub fn money_eq(a: f64, b: f64) -> bool {
    let diff = (to_decimal(a) - to_decimal(b)).abs();
    diff < MONEY_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_decimal_precision() {
        // Classic floating point problem: 0.1 + 0.2 != 0.3
        let sum_dec = to_decimal(0.1) + to_decimal(0.2);
        assert_eq!(to_f64(sum_dec), 0.3);
    }

    #[test]
    fn test_line_subtotal() {
        assert_eq!(line_subtotal(100.0, 2, false), Ok(200.0));
        assert_eq!(line_subtotal(19.99, 3, false), Ok(59.97));
        assert_eq!(line_subtotal(100.0, 2, true), Ok(0.0));
    }

    #[test]
    fn test_line_subtotal_overflow() {
        assert_eq!(line_subtotal(1e28, 100, false), Err(AmountOverflow));
        // free lines never multiply
        assert_eq!(line_subtotal(1e28, 100, true), Ok(0.0));
    }

    #[test]
    fn test_sum_amounts_overflow() {
        assert_eq!(sum_amounts([7e28, 7e28]), Err(AmountOverflow));
    }

    #[test]
    fn test_representable() {
        assert!(is_representable(1e28));
        assert!(!is_representable(1e30));
        assert!(!is_representable(f64::NAN));
    }

    #[test]
    fn test_non_finite_becomes_zero() {
        assert_eq!(to_decimal(f64::NAN), Decimal::ZERO);
        assert_eq!(to_decimal(f64::INFINITY), Decimal::ZERO);
    }

    #[test]
    fn test_sum_amounts_accumulates_exactly() {
        let total = sum_amounts(std::iter::repeat_n(0.01, 1000)).unwrap();
        assert_eq!(to_f64(total), 10.0);
    }

    #[test]
    fn test_money_eq_tolerance() {
        assert!(money_eq(10.0, 10.004));
        assert!(!money_eq(10.0, 10.02));
    }
}
