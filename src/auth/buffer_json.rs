//! Binary-safe JSON encoding for credential blobs.
//!
//! Byte buffers are written as `{"type": "Buffer", "data": "<base64>"}`.
//! Reading also accepts the older form where `data` is an array of byte
//! values.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::errors::{StoreError, StoreResult};

const BUFFER_TAG: &str = "Buffer";

/// Opaque bytes that survive a JSON round trip exactly.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BufferBytes(pub Vec<u8>);

impl BufferBytes {
    /// Borrow the bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for BufferBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferBytes({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for BufferBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

#[derive(Serialize, Deserialize)]
struct Tagged<D> {
    #[serde(rename = "type")]
    tag: String,
    data: D,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Base64(String),
    Raw(Vec<u8>),
}

impl Serialize for BufferBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Tagged {
            tag: BUFFER_TAG.to_string(),
            data: STANDARD.encode(&self.0),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BufferBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tagged = Tagged::<Payload>::deserialize(deserializer)?;
        if tagged.tag != BUFFER_TAG {
            return Err(de::Error::custom(format!(
                "expected a {BUFFER_TAG} object, got type {:?}",
                tagged.tag
            )));
        }
        match tagged.data {
            Payload::Base64(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(Self)
                .map_err(de::Error::custom),
            Payload::Raw(bytes) => Ok(Self(bytes)),
        }
    }
}

/// Encode bytes as a buffer object.
#[must_use]
pub fn encode_bytes(bytes: &[u8]) -> Value {
    json!({"type": BUFFER_TAG, "data": STANDARD.encode(bytes)})
}

/// Decode a buffer object.
///
/// # Errors
/// Returns an error if the value is not a buffer object or its payload is
/// not valid base64.
pub fn decode_bytes(value: &Value) -> StoreResult<Vec<u8>> {
    let tag = value.get("type").and_then(Value::as_str);
    if tag != Some(BUFFER_TAG) {
        return Err(StoreError::InvalidDocument(
            "not a buffer object".to_string(),
        ));
    }
    match value.get("data") {
        Some(Value::String(encoded)) => Ok(STANDARD.decode(encoded.as_bytes())?),
        Some(data @ Value::Array(_)) => Ok(serde_json::from_value(data.clone())?),
        _ => Err(StoreError::InvalidDocument(
            "buffer object without data".to_string(),
        )),
    }
}
