//! Conversions between the `f64` market-data domain and `Decimal` money.

use num_traits::ToPrimitive;
use rust_decimal::Decimal;

/// Convert a float price or ratio into a `Decimal`, mapping non-finite values to zero.
pub fn to_decimal(value: f64) -> Decimal {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::try_from(value).unwrap_or_default()
}

/// Convert a `Decimal` into `f64` for statistics.
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_trip_price() {
        assert_eq!(to_decimal(101.25), dec!(101.25));
        assert!((to_f64(dec!(101.25)) - 101.25).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_maps_to_zero() {
        assert_eq!(to_decimal(f64::NAN), Decimal::ZERO);
        assert_eq!(to_decimal(f64::INFINITY), Decimal::ZERO);
    }
}
