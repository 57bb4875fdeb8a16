//! Decimal-string serde for `U256`.
//!
//! JSON numbers lose precision past 2^53, and the default `U256` encoding is
//! hex. Cached values and CLI output use base-10 strings instead.

use ethers::types::U256;
use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    let raw = String::deserialize(deserializer)?;
    U256::from_dec_str(&raw).map_err(|e| D::Error::custom(format!("invalid decimal u256 {raw:?}: {e}")))
}

/// Same encoding for optional values
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<U256>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            U256::from_dec_str(&s)
                .map_err(|e| D::Error::custom(format!("invalid decimal u256 {s:?}: {e}")))
        })
        .transpose()
    }
}
