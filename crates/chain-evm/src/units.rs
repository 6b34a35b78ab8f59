//! Conversions between human amounts, base units and JSON-RPC hex quantities.
//!
//! All arithmetic is exact: amounts are parsed as decimal strings and scaled
//! with integer math, never through floating point.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;

use crate::error::EvmError;

/// Decimal count of every EVM-style native currency (1 unit = 10^18 wei).
pub const NATIVE_DECIMALS: u8 = 18;

/// A non-negative decimal amount in human units, e.g. `12.5`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount {
    integer: String,
    fraction: String,
}

impl Amount {
    /// Parses a plain decimal string (`"12"`, `"12.5"`, `".5"`).
    ///
    /// Signs, exponents and separators are rejected.
    pub fn parse(input: &str) -> Result<Self, EvmError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(EvmError::InvalidAmount("empty amount".into()));
        }
        if s.starts_with('-') {
            return Err(EvmError::InvalidAmount(format!("negative amount: {s}")));
        }

        let (integer, fraction) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };

        if integer.is_empty() && fraction.is_empty() {
            return Err(EvmError::InvalidAmount(format!("no digits in amount: {s}")));
        }
        if !integer.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(EvmError::InvalidAmount(format!("not a decimal number: {s}")));
        }

        let integer = integer.trim_start_matches('0');
        let fraction = fraction.trim_end_matches('0');

        Ok(Self {
            integer: if integer.is_empty() { "0".into() } else { integer.into() },
            fraction: fraction.into(),
        })
    }

    /// Returns true when the amount is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.integer != "0" || !self.fraction.is_empty()
    }

    /// Scales the amount to base units: `floor(amount * 10^decimals)`.
    ///
    /// Fraction digits beyond `decimals` are truncated.
    pub fn to_base_units(&self, decimals: u8) -> Result<U256, EvmError> {
        let decimals = usize::from(decimals);
        let mut digits = String::with_capacity(self.integer.len() + decimals);
        digits.push_str(&self.integer);

        if self.fraction.len() >= decimals {
            digits.push_str(&self.fraction[..decimals]);
        } else {
            digits.push_str(&self.fraction);
            digits.extend(std::iter::repeat('0').take(decimals - self.fraction.len()));
        }

        U256::from_str_radix(&digits, 10)
            .map_err(|e| EvmError::InvalidAmount(format!("amount out of range: {e}")))
    }
}

impl FromStr for Amount {
    type Err = EvmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<f64> for Amount {
    type Error = EvmError;

    /// Uses the shortest round-trip rendering of the float, so `12.5`
    /// becomes exactly `"12.5"` rather than its binary expansion.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(EvmError::InvalidAmount(format!("non-finite amount: {value}")));
        }
        Self::parse(&value.to_string())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fraction.is_empty() {
            write!(f, "{}", self.integer)
        } else {
            write!(f, "{}.{}", self.integer, self.fraction)
        }
    }
}

/// Parses a JSON-RPC quantity: `0x`-prefixed or bare big-endian hex.
///
/// Empty strings and a bare `0x` decode to zero.
pub fn parse_quantity(raw: &str) -> Result<U256, EvmError> {
    let s = raw.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    if digits.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(digits, 16)
        .map_err(|e| EvmError::InvalidQuantity(format!("{raw}: {e}")))
}

/// Renders a value as a minimal `0x`-prefixed hex quantity (`0x0` for zero).
pub fn to_hex_quantity(value: U256) -> String {
    format!("0x{value:x}")
}

/// Renders `raw / 10^decimals` as an exact decimal string without trailing
/// fraction zeros, e.g. `1500000` with 6 decimals is `"1.5"`.
pub fn format_units(raw: U256, decimals: u8) -> Result<String, EvmError> {
    let divisor = pow10(decimals)?;
    let whole = raw / divisor;
    let remainder = raw % divisor;

    if remainder.is_zero() {
        return Ok(whole.to_string());
    }

    let frac = format!("{:0>width$}", remainder.to_string(), width = usize::from(decimals));
    Ok(format!("{whole}.{}", frac.trim_end_matches('0')))
}

/// Lossy `raw / 10^decimals` as a float, for display.
pub fn scale_to_f64(raw: U256, decimals: u8) -> Result<f64, EvmError> {
    let text = format_units(raw, decimals)?;
    text.parse::<f64>()
        .map_err(|e| EvmError::InvalidQuantity(format!("{text}: {e}")))
}

/// `10^exp` as a U256, failing on overflow.
pub fn pow10(exp: u8) -> Result<U256, EvmError> {
    let ten = U256::from(10u64);
    let mut acc = U256::from(1u64);
    for _ in 0..exp {
        acc = acc
            .checked_mul(ten)
            .ok_or_else(|| EvmError::InvalidAmount(format!("10^{exp} overflows uint256")))?;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_scales_with_token_decimals() {
        let amount = Amount::parse("12.5").unwrap();
        assert_eq!(amount.to_base_units(6).unwrap(), U256::from(12_500_000u64));
    }

    #[test]
    fn amount_truncates_excess_fraction() {
        let amount = Amount::parse("1.23456789").unwrap();
        assert_eq!(amount.to_base_units(6).unwrap(), U256::from(1_234_567u64));
    }

    #[test]
    fn amount_from_float_avoids_binary_noise() {
        // 0.29 * 100 is 28.999999999999996 in f64.
        let amount = Amount::try_from(0.29).unwrap();
        assert_eq!(amount.to_base_units(2).unwrap(), U256::from(29u64));
    }

    #[test]
    fn amount_one_ether_in_wei() {
        let amount = Amount::parse("1").unwrap();
        assert_eq!(
            amount.to_base_units(NATIVE_DECIMALS).unwrap(),
            U256::from(1_000_000_000_000_000_000u128)
        );
    }

    #[test]
    fn amount_rejects_negative_and_garbage() {
        assert!(Amount::parse("-1").is_err());
        assert!(Amount::parse("1e5").is_err());
        assert!(Amount::parse("").is_err());
        assert!(Amount::parse(".").is_err());
        assert!(Amount::try_from(f64::NAN).is_err());
    }

    #[test]
    fn amount_positivity() {
        assert!(!Amount::parse("0.000").unwrap().is_positive());
        assert!(!Amount::parse("0").unwrap().is_positive());
        assert!(Amount::parse(".5").unwrap().is_positive());
    }

    #[test]
    fn amount_display_is_normalized() {
        assert_eq!(Amount::parse("007.5000").unwrap().to_string(), "7.5");
        assert_eq!(Amount::parse("0.0").unwrap().to_string(), "0");
    }

    #[test]
    fn parse_quantity_accepts_prefixed_and_bare_hex() {
        assert_eq!(parse_quantity("0x0").unwrap(), U256::ZERO);
        assert_eq!(parse_quantity("0x").unwrap(), U256::ZERO);
        assert_eq!(parse_quantity("").unwrap(), U256::ZERO);
        assert_eq!(parse_quantity("ff").unwrap(), U256::from(255u64));
        assert_eq!(
            parse_quantity("0xde0b6b3a7640000").unwrap(),
            U256::from(1_000_000_000_000_000_000u128)
        );
    }

    #[test]
    fn parse_quantity_rejects_non_hex() {
        assert!(parse_quantity("0xnothex").is_err());
    }

    #[test]
    fn hex_quantity_is_minimal() {
        assert_eq!(to_hex_quantity(U256::ZERO), "0x0");
        assert_eq!(to_hex_quantity(U256::from(100_000u64)), "0x186a0");
    }

    #[test]
    fn format_units_exact() {
        assert_eq!(format_units(U256::from(1_500_000u64), 6).unwrap(), "1.5");
        assert_eq!(format_units(U256::from(5u64), 6).unwrap(), "0.000005");
        assert_eq!(format_units(U256::from(42u64), 0).unwrap(), "42");
    }

    #[test]
    fn scale_one_ether() {
        let raw = parse_quantity("0xde0b6b3a7640000").unwrap();
        assert_eq!(scale_to_f64(raw, 18).unwrap(), 1.0);
    }

    #[test]
    fn pow10_overflow_is_reported() {
        assert!(pow10(77).is_ok());
        assert!(pow10(78).is_err());
    }
}
