use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::ToPrimitive;

pub use alloy_primitives::{keccak256, Address};

use crate::error::ClientError;

/// Parses a hex address with or without the `0x` prefix. Mixed-case input
/// must carry a valid EIP-55 checksum; all-lower or all-upper input is
/// taken as-is.
pub fn parse_address(value: &str) -> Result<Address, ClientError> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        Address::parse_checksummed(format!("0x{digits}"), None)
            .map_err(|e| ClientError::InvalidInput(format!("address {trimmed:?}: {e}")))
    } else {
        Address::from_str(digits)
            .map_err(|e| ClientError::InvalidInput(format!("address {trimmed:?}: {e}")))
    }
}

/// Serde adapter writing addresses in EIP-55 form and reading them through
/// [`parse_address`].
pub mod checksummed {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{parse_address, Address};

    pub fn serialize<S: Serializer>(value: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_checksum(None))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let value = String::deserialize(deserializer)?;
        parse_address(&value).map_err(serde::de::Error::custom)
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Address>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|value| parse_address(&value).map_err(serde::de::Error::custom))
            .transpose()
    }

    pub fn serialize_option<S: Serializer>(
        value: &Option<Address>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(address) => serialize(address, serializer),
            None => serializer.serialize_none(),
        }
    }
}

/// Parses a base-10 integer string into a `BigUint`. Token amounts and
/// sqrt prices travel as decimal strings in every file format.
pub fn parse_decimal_biguint(value: &str) -> Result<BigUint, ClientError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ClientError::InvalidInput(format!(
            "{trimmed:?} is not a base-10 integer"
        )));
    }
    BigUint::parse_bytes(trimmed.as_bytes(), 10)
        .ok_or_else(|| ClientError::InvalidInput(format!("{trimmed:?} is not a base-10 integer")))
}

pub fn parse_decimal_u128(value: &str) -> Result<u128, ClientError> {
    parse_decimal_biguint(value)?
        .to_u128()
        .ok_or_else(|| ClientError::AmountOverflow(format!("{} exceeds u128", value.trim())))
}

/// Serde adapter writing `u128` as a decimal string, the only lossless
/// form for JSON consumers without big integers.
pub mod u128_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::parse_decimal_u128(&value).map_err(serde::de::Error::custom)
    }
}
