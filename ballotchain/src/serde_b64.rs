//! Single-purpose module for use in `#[serde(with = "serde_b64")]`.
//!
//! Byte buffers travel as standard-alphabet base64 strings.

use serde::{de, Deserialize, Deserializer, Serializer};

pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&base64::encode(bytes))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    base64::decode(&encoded).map_err(|e| de::Error::custom(format!("invalid base64: {}", e)))
}
