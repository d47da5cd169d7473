//! Fixed-fractional position sizing.

use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use trading_core::error::RiskError;

/// Whole shares such that a stop-out loses at most `max_risk_fraction` of equity.
///
/// `floor(equity * max_risk_fraction / (entry - stop))`
pub fn position_size_shares(
    equity: Decimal,
    entry: Decimal,
    stop: Decimal,
    max_risk_fraction: Decimal,
) -> Result<u64, RiskError> {
    if equity <= Decimal::ZERO {
        return Err(RiskError::InvalidInput(format!(
            "equity must be positive, got {equity}"
        )));
    }
    if entry <= Decimal::ZERO {
        return Err(RiskError::InvalidInput(format!(
            "entry price must be positive, got {entry}"
        )));
    }
    if stop >= entry {
        return Err(RiskError::InvalidInput(format!(
            "stop {stop} must be below entry {entry}"
        )));
    }
    if max_risk_fraction <= Decimal::ZERO || max_risk_fraction >= Decimal::ONE {
        return Err(RiskError::InvalidInput(format!(
            "risk fraction must be in (0, 1), got {max_risk_fraction}"
        )));
    }

    let risk_per_share = entry - stop;
    let shares = (equity * max_risk_fraction / risk_per_share).floor();
    Ok(shares.to_u64().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_risk_based_size() {
        // 1% of 100k = 1000 at risk, 2 per share
        let shares = position_size_shares(dec!(100000), dec!(100), dec!(98), dec!(0.01)).unwrap();
        assert_eq!(shares, 500);
    }

    #[test]
    fn test_size_rounds_down() {
        let shares = position_size_shares(dec!(10000), dec!(50), dec!(47), dec!(0.02)).unwrap();
        assert_eq!(shares, 66);
    }

    #[test]
    fn test_stop_at_or_above_entry_is_invalid() {
        assert!(matches!(
            position_size_shares(dec!(100000), dec!(100), dec!(100), dec!(0.01)),
            Err(RiskError::InvalidInput(_))
        ));
        assert!(matches!(
            position_size_shares(dec!(100000), dec!(100), dec!(101), dec!(0.01)),
            Err(RiskError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(position_size_shares(dec!(0), dec!(100), dec!(98), dec!(0.01)).is_err());
        assert!(position_size_shares(dec!(1000), dec!(0), dec!(-1), dec!(0.01)).is_err());
        assert!(position_size_shares(dec!(1000), dec!(100), dec!(98), dec!(0)).is_err());
        assert!(position_size_shares(dec!(1000), dec!(100), dec!(98), dec!(1)).is_err());
    }

    #[test]
    fn test_tiny_equity_gives_zero() {
        let shares = position_size_shares(dec!(10), dec!(100), dec!(50), dec!(0.5)).unwrap();
        assert_eq!(shares, 0);
    }
}
