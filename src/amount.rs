//! Token amounts in atomic units.
//!
//! Amounts travel as base-10 strings at protocol boundaries, as [`BigUint`]
//! internally and as even-length big-endian hex inside transfer arguments.

use crate::errors::{Result, X402Error};
use num_bigint::BigUint;
use std::cmp::Ordering;

/// Decimals of the native EGLD asset.
pub const EGLD_DECIMALS: u32 = 18;

/// Parses a base-10 string of atomic units.
///
/// Only ASCII digits are accepted: no sign, no separators, no whitespace.
///
/// # Examples
///
/// ```
/// use x402_multiversx::amount::parse_amount;
///
/// let value = parse_amount("1000000000000000000").unwrap();
/// assert_eq!(value.to_string(), "1000000000000000000");
/// assert!(parse_amount("-1").is_err());
/// ```
pub fn parse_amount(s: &str) -> Result<BigUint> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(X402Error::InvalidAmount(format!(
            "Cannot parse '{}' as an unsigned integer",
            s
        )));
    }
    BigUint::parse_bytes(s.as_bytes(), 10)
        .ok_or_else(|| X402Error::InvalidAmount(format!("Cannot parse '{}'", s)))
}

/// Encodes an amount as big-endian hex, zero-padded to an even number of nibbles.
///
/// # Examples
///
/// ```
/// use num_bigint::BigUint;
/// use x402_multiversx::amount::amount_to_hex;
///
/// assert_eq!(amount_to_hex(&BigUint::from(100u32)), "64");
/// assert_eq!(amount_to_hex(&BigUint::from(256u32)), "0100");
/// assert_eq!(amount_to_hex(&BigUint::from(0u32)), "00");
/// ```
pub fn amount_to_hex(value: &BigUint) -> String {
    let hex = format!("{:x}", value);
    if hex.len() % 2 == 0 {
        hex
    } else {
        format!("0{}", hex)
    }
}

/// Decodes a big-endian hex amount. The empty string decodes to zero.
pub fn amount_from_hex(s: &str) -> Result<BigUint> {
    let bytes = hex::decode(s)
        .map_err(|e| X402Error::InvalidAmount(format!("Invalid amount hex '{}': {}", s, e)))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

/// Compares two decimal amount strings numerically.
pub fn compare_amounts(a: &str, b: &str) -> Result<Ordering> {
    Ok(parse_amount(a)?.cmp(&parse_amount(b)?))
}

/// Converts a human-readable decimal such as `"0.01"` into atomic units.
///
/// # Examples
///
/// ```
/// use x402_multiversx::amount::parse_units;
///
/// assert_eq!(parse_units("0.01", 18).unwrap().to_string(), "10000000000000000");
/// assert_eq!(parse_units("1.5", 6).unwrap().to_string(), "1500000");
/// assert!(parse_units("0.0000001", 6).is_err());
/// ```
pub fn parse_units(human: &str, decimals: u32) -> Result<BigUint> {
    let (whole, fraction) = match human.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (human, ""),
    };

    if fraction.len() > decimals as usize {
        return Err(X402Error::InvalidAmount(format!(
            "'{}' has more than {} decimal places",
            human, decimals
        )));
    }
    if whole.is_empty() && fraction.is_empty() {
        return Err(X402Error::InvalidAmount("empty amount".to_string()));
    }

    let padded = format!(
        "{}{}{}",
        if whole.is_empty() { "0" } else { whole },
        fraction,
        "0".repeat(decimals as usize - fraction.len())
    );
    parse_amount(&padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("0").unwrap(), BigUint::from(0u32));
        assert_eq!(parse_amount("100").unwrap(), BigUint::from(100u32));
        // beyond u128
        let big = "340282366920938463463374607431768211456";
        assert_eq!(parse_amount(big).unwrap().to_string(), big);
    }

    #[test]
    fn test_parse_amount_rejects_non_numeric() {
        for input in ["", "abc", "-5", "+5", "1_000", "1.5", " 1", "0x10"] {
            let err = parse_amount(input).unwrap_err();
            assert!(matches!(err, X402Error::InvalidAmount(_)), "{input}");
        }
    }

    #[test]
    fn test_amount_hex_is_even_length() {
        assert_eq!(amount_to_hex(&BigUint::from(1u32)), "01");
        assert_eq!(amount_to_hex(&BigUint::from(0xfffu32)), "0fff");
        assert_eq!(
            amount_to_hex(&parse_amount("1000000000000000000").unwrap()),
            "0de0b6b3a7640000"
        );
    }

    #[test]
    fn test_amount_from_hex() {
        assert_eq!(amount_from_hex("64").unwrap(), BigUint::from(100u32));
        assert_eq!(amount_from_hex("").unwrap(), BigUint::from(0u32));
        assert!(amount_from_hex("6").is_err());
        assert!(amount_from_hex("zz").is_err());
    }

    #[test]
    fn test_compare_amounts() {
        assert_eq!(compare_amounts("101", "100").unwrap(), Ordering::Greater);
        assert_eq!(compare_amounts("100", "100").unwrap(), Ordering::Equal);
        assert_eq!(compare_amounts("99", "100").unwrap(), Ordering::Less);
        assert_eq!(compare_amounts("0100", "100").unwrap(), Ordering::Equal);
        assert!(compare_amounts("x", "1").is_err());
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1", 18).unwrap().to_string(), "1000000000000000000");
        assert_eq!(parse_units(".5", 2).unwrap().to_string(), "50");
        assert_eq!(parse_units("2.", 2).unwrap().to_string(), "200");
        assert!(parse_units(".", 2).is_err());
        assert!(parse_units("1.2.3", 6).is_err());
    }

    proptest! {
        #[test]
        fn prop_hex_round_trip(n in any::<u128>()) {
            let value = BigUint::from(n);
            let hex = amount_to_hex(&value);
            prop_assert_eq!(hex.len() % 2, 0);
            prop_assert_eq!(amount_from_hex(&hex).unwrap(), value.clone());
            prop_assert_eq!(parse_amount(&value.to_string()).unwrap(), value);
        }
    }
}
