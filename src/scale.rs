//! Fixed-point conversions between human-readable values and on-chain integers
//!
//! The program stores every amount and price as a u64 scaled by a decimal
//! precision: the quote asset at [`QUOTE_DECIMALS`](crate::pairs::QUOTE_DECIMALS),
//! base assets at the per-pair precision from the catalog. Encoding truncates
//! toward zero (floor), matching the arithmetic the on-chain program expects.

use crate::error::{EngineError, Result};
use crate::pairs::{self, QUOTE_DECIMALS};

// 10^20 overflows u64; 19 is the last precision with any representable values.
const MAX_DECIMALS: u8 = 19;

/// Convert a non-negative decimal value to its scaled u64 representation.
/// Truncates toward zero; values that cannot fit are rejected.
pub fn to_scaled(value: f64, decimals: u8) -> Result<u64> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::AmountOutOfRange(format!(
            "value {} is not a non-negative finite number",
            value
        )));
    }
    if decimals > MAX_DECIMALS {
        return Err(EngineError::AmountOutOfRange(format!(
            "precision {} exceeds the representable maximum",
            decimals
        )));
    }

    let scaled = (value * 10f64.powi(decimals as i32)).floor();
    if scaled >= u64::MAX as f64 {
        return Err(EngineError::AmountOutOfRange(format!(
            "value {} at precision {} overflows u64",
            value, decimals
        )));
    }

    Ok(scaled as u64)
}

/// Convert a scaled u64 back to a decimal value
pub fn from_scaled(raw: u64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

/// Scale a quote (USDT) amount
pub fn to_quote_units(value: f64) -> Result<u64> {
    to_scaled(value, QUOTE_DECIMALS)
}

/// Human-readable quote (USDT) amount
pub fn from_quote_units(raw: u64) -> f64 {
    from_scaled(raw, QUOTE_DECIMALS)
}

/// Scale a base-asset amount for the given pair
pub fn to_base_units(value: f64, pair_index: u8) -> Result<u64> {
    let pair = pairs::by_index(pair_index)?;
    to_scaled(value, pair.base_decimals)
}

/// Human-readable base-asset amount for the given pair
pub fn from_base_units(raw: u64, pair_index: u8) -> Result<f64> {
    let pair = pairs::by_index(pair_index)?;
    Ok(from_scaled(raw, pair.base_decimals))
}

/// Base-asset amount bought by `size_quote` at `price`, in scaled units.
/// Used when opening positions: the notional size is quoted in USDT.
pub fn base_amount_for_notional(size_quote: f64, price: f64, base_decimals: u8) -> Result<u64> {
    if !price.is_finite() || price <= 0.0 {
        return Err(EngineError::AmountOutOfRange(format!(
            "price {} must be positive",
            price
        )));
    }
    to_scaled(size_quote / price, base_decimals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_scaling() {
        assert_eq!(to_quote_units(100.0).unwrap(), 100_000_000);
        assert_eq!(to_quote_units(150.123456).unwrap(), 150_123_456);
        assert_eq!(to_quote_units(0.0).unwrap(), 0);
    }

    #[test]
    fn test_truncation_toward_zero() {
        assert_eq!(to_scaled(1.9999999, 2).unwrap(), 199);
        assert_eq!(to_scaled(0.1234567, 6).unwrap(), 123_456);
    }

    #[test]
    fn test_high_precision_base() {
        // ETH-style 18 decimals
        assert_eq!(to_scaled(1.5, 18).unwrap(), 1_500_000_000_000_000_000);
        // SOL-style 9 decimals
        assert_eq!(to_base_units(2.5, 0).unwrap(), 2_500_000_000);
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert!(to_scaled(-0.01, 6).is_err());
        assert!(to_scaled(f64::NAN, 6).is_err());
        assert!(to_scaled(f64::INFINITY, 6).is_err());
        assert!(to_scaled(1.0, 20).is_err());
        // 1e15 * 1e6 = 1e21, far past u64::MAX
        assert!(to_scaled(1e15, 6).is_err());
    }

    #[test]
    fn test_round_trip_within_truncation_error() {
        let values = [0.000001, 0.5, 1.0, 99.999999, 150.123456, 10_000.0];
        for value in values {
            let raw = to_quote_units(value).unwrap();
            let back = from_quote_units(raw);
            assert!(back <= value + 1e-9, "{} became {}", value, back);
            assert!(value - back < 1e-6 + 1e-9, "{} became {}", value, back);
        }
    }

    #[test]
    fn test_base_amount_for_notional() {
        // 1000 USDT at 250.0 buys exactly 4 SOL
        let amount = base_amount_for_notional(1000.0, 250.0, 9).unwrap();
        assert_eq!(amount, 4_000_000_000);

        assert!(base_amount_for_notional(1000.0, 0.0, 9).is_err());
        assert!(base_amount_for_notional(1000.0, -5.0, 9).is_err());
    }

    #[test]
    fn test_from_scaled() {
        assert!((from_scaled(150_123_456, 6) - 150.123456).abs() < 1e-9);
        assert_eq!(from_scaled(0, 6), 0.0);
        assert!((from_base_units(4_000_000_000, 0).unwrap() - 4.0).abs() < 1e-12);
    }
}
