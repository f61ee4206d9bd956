//! Quantity encoding and gas configuration values.
//!
//! Integer quantities travel over JSON-RPC as `0x`-prefixed hexadecimal
//! strings without leading zeros (`0x0` for zero).

use std::fmt::{self, Display};
use std::str::FromStr;

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::RpcError;

/// Encode an integer as a JSON-RPC quantity.
///
/// # Example
///
/// ```
/// use chain_connect::{to_quantity, U256};
///
/// assert_eq!(to_quantity(U256::ZERO), "0x0");
/// assert_eq!(to_quantity(U256::from(4096u64)), "0x1000");
/// ```
pub fn to_quantity(value: U256) -> String {
    let encoded = hex::encode(value.to_be_bytes::<32>());
    let digits = encoded.trim_start_matches('0');
    if digits.is_empty() {
        "0x0".to_string()
    } else {
        format!("0x{digits}")
    }
}

/// Encode a `u64` as a JSON-RPC quantity.
pub fn u64_to_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

/// Decode a `0x`-prefixed hexadecimal quantity.
pub fn parse_quantity(s: &str) -> Result<U256, RpcError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| RpcError::InvalidQuantity(s.to_string()))?;
    if digits.is_empty() {
        return Err(RpcError::InvalidQuantity(s.to_string()));
    }
    U256::from_str_radix(digits, 16).map_err(|_| RpcError::InvalidQuantity(s.to_string()))
}

/// Decode a quantity that must fit in a `u64`.
pub fn parse_u64_quantity(s: &str) -> Result<u64, RpcError> {
    let value = parse_quantity(s)?;
    u64::try_from(value).map_err(|_| RpcError::InvalidQuantity(s.to_string()))
}

/// Decode an integer given as a JSON number, a decimal string, or a
/// `0x`-prefixed hex string.
///
/// Nodes disagree on how `net_version` is encoded, so this accepts all of
/// them.
pub fn parse_integer_value(value: &Value) -> Result<U256, RpcError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| RpcError::InvalidQuantity(n.to_string())),
        Value::String(s) if s.starts_with("0x") || s.starts_with("0X") => parse_quantity(s),
        Value::String(s) => {
            U256::from_str_radix(s, 10).map_err(|_| RpcError::InvalidQuantity(s.clone()))
        }
        other => Err(RpcError::InvalidQuantity(other.to_string())),
    }
}

/// Like [`parse_integer_value`], bounded to `u64`.
pub fn parse_u64_value(value: &Value) -> Result<u64, RpcError> {
    let parsed = parse_integer_value(value)?;
    u64::try_from(parsed).map_err(|_| RpcError::InvalidQuantity(value.to_string()))
}

// ============================================================================
// GasValue
// ============================================================================

/// Gas or gas-price policy for a network.
///
/// `Auto` asks the node for an estimate; `Fixed` always uses the given value.
///
/// # Parsing
///
/// ```
/// use chain_connect::{GasValue, U256};
///
/// assert_eq!("auto".parse::<GasValue>().unwrap(), GasValue::Auto);
/// assert_eq!("21000".parse::<GasValue>().unwrap(), GasValue::Fixed(U256::from(21000u64)));
/// assert_eq!("0x5208".parse::<GasValue>().unwrap(), GasValue::Fixed(U256::from(21000u64)));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum GasValue {
    #[default]
    Auto,
    Fixed(U256),
}

impl GasValue {
    /// Returns true for the automatic policy.
    pub fn is_auto(&self) -> bool {
        matches!(self, GasValue::Auto)
    }

    /// The fixed amount, if any.
    pub fn fixed(&self) -> Option<U256> {
        match self {
            GasValue::Auto => None,
            GasValue::Fixed(v) => Some(*v),
        }
    }
}

impl From<u64> for GasValue {
    fn from(value: u64) -> Self {
        GasValue::Fixed(U256::from(value))
    }
}

impl From<U256> for GasValue {
    fn from(value: U256) -> Self {
        GasValue::Fixed(value)
    }
}

impl FromStr for GasValue {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "auto" {
            return Ok(GasValue::Auto);
        }
        parse_integer_value(&Value::String(s.to_string())).map(GasValue::Fixed)
    }
}

impl Display for GasValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasValue::Auto => f.write_str("auto"),
            GasValue::Fixed(v) => f.write_str(&to_quantity(*v)),
        }
    }
}

impl Serialize for GasValue {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GasValue {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(d)?;
        match &value {
            Value::String(s) if s == "auto" => Ok(GasValue::Auto),
            other => parse_integer_value(other)
                .map(GasValue::Fixed)
                .map_err(serde::de::Error::custom),
        }
    }
}

// ============================================================================
// Serde helpers
// ============================================================================

/// Serde adapter for `U256` fields: accepts numbers, decimal strings and hex
/// strings; always writes a hex quantity.
pub mod u256_serde {
    use super::*;

    pub fn serialize<S: Serializer>(value: &U256, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&to_quantity(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
        let value = Value::deserialize(d)?;
        parse_integer_value(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_quantity() {
        assert_eq!(to_quantity(U256::ZERO), "0x0");
        assert_eq!(to_quantity(U256::from(1u64)), "0x1");
        assert_eq!(to_quantity(U256::from(10u64)), "0xa");
        assert_eq!(to_quantity(U256::from(1234u64)), "0x4d2");
        assert_eq!(to_quantity(U256::MAX), format!("0x{}", "f".repeat(64)));
    }

    #[test]
    fn test_u64_to_quantity() {
        assert_eq!(u64_to_quantity(0), "0x0");
        assert_eq!(u64_to_quantity(31337), "0x7a69");
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), U256::ZERO);
        assert_eq!(parse_quantity("0xa").unwrap(), U256::from(10u64));
        assert_eq!(parse_quantity("0X1000").unwrap(), U256::from(4096u64));
        assert!(parse_quantity("10").is_err());
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_parse_u64_quantity_overflow() {
        assert_eq!(parse_u64_quantity("0x5208").unwrap(), 21000);
        assert!(parse_u64_quantity(&to_quantity(U256::MAX)).is_err());
    }

    #[test]
    fn test_parse_integer_value_forms() {
        assert_eq!(parse_u64_value(&json!(5)).unwrap(), 5);
        assert_eq!(parse_u64_value(&json!("5")).unwrap(), 5);
        assert_eq!(parse_u64_value(&json!("0x2")).unwrap(), 2);
        assert!(parse_u64_value(&json!(-1)).is_err());
        assert!(parse_u64_value(&json!(1.5)).is_err());
        assert!(parse_u64_value(&json!(null)).is_err());
        assert!(parse_u64_value(&json!("two")).is_err());
    }

    #[test]
    fn test_gas_value_serde() {
        let auto: GasValue = serde_json::from_value(json!("auto")).unwrap();
        assert_eq!(auto, GasValue::Auto);

        let fixed: GasValue = serde_json::from_value(json!(1234)).unwrap();
        assert_eq!(fixed, GasValue::from(1234));
        assert_eq!(serde_json::to_value(fixed).unwrap(), json!("0x4d2"));

        let from_hex: GasValue = serde_json::from_value(json!("0x4d2")).unwrap();
        assert_eq!(from_hex, fixed);

        assert!(serde_json::from_value::<GasValue>(json!("automatic")).is_err());
        assert!(serde_json::from_value::<GasValue>(json!(true)).is_err());
    }

    #[test]
    fn test_gas_value_accessors() {
        assert!(GasValue::Auto.is_auto());
        assert_eq!(GasValue::Auto.fixed(), None);
        assert_eq!(GasValue::from(7).fixed(), Some(U256::from(7u64)));
        assert_eq!(GasValue::default(), GasValue::Auto);
    }
}
