//! Canonical hex encoding for JSON-RPC integer fields.
//!
//! Relay endpoints exchange every numeric field as a `0x`-prefixed,
//! big-endian, minimal hex string: no leading zero digits, and a bare `0x0`
//! for zero. This module is a `#[serde(with = ...)]` adapter enforcing that
//! form on both directions.

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serializer};

/// Encode a quantity in canonical minimal hex.
pub fn encode(value: U256) -> String {
    format!("0x{value:x}")
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("quantity must be 0x-prefixed")]
    MissingPrefix,
    #[error("quantity must not be empty")]
    Empty,
    #[error("quantity must not carry leading zero digits")]
    LeadingZeros,
    #[error("invalid hex digits in quantity")]
    InvalidDigits,
}

/// Decode a canonical minimal-hex quantity, rejecting non-canonical forms.
pub fn decode(input: &str) -> Result<U256, QuantityError> {
    let digits = input
        .strip_prefix("0x")
        .ok_or(QuantityError::MissingPrefix)?;
    if digits.is_empty() {
        return Err(QuantityError::Empty);
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(QuantityError::LeadingZeros);
    }
    U256::from_str_radix(digits, 16).map_err(|_| QuantityError::InvalidDigits)
}

pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&encode(*value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    decode(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_a_single_digit() {
        assert_eq!(encode(U256::ZERO), "0x0");
        assert_eq!(decode("0x0"), Ok(U256::ZERO));
    }

    #[test]
    fn encoding_is_minimal() {
        assert_eq!(encode(U256::from(255u64)), "0xff");
        assert_eq!(encode(U256::from(1_000_000u64)), "0xf4240");
    }

    #[test]
    fn round_trips() {
        for value in [0u64, 1, 16, 255, 1 << 32, u64::MAX] {
            let value = U256::from(value);
            assert_eq!(decode(&encode(value)), Ok(value));
        }
    }

    #[test]
    fn rejects_non_canonical_input() {
        assert_eq!(decode("ff"), Err(QuantityError::MissingPrefix));
        assert_eq!(decode("0x"), Err(QuantityError::Empty));
        assert_eq!(decode("0x0ff"), Err(QuantityError::LeadingZeros));
        assert_eq!(decode("0xzz"), Err(QuantityError::InvalidDigits));
    }
}
