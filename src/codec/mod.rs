//! Record codec
//!
//! Encoding and decoding of attribute values and attribute maps.
//!
//! ## Format
//! ```text
//! ┌────────────┬──────────────────────────────────┐
//! │ Version(1) │ bincode(Value | Attributes)      │
//! └────────────┴──────────────────────────────────┘
//! ```
//!
//! bincode writes the `Value` variant tag ahead of every value, which keeps
//! the bytes self-describing. Encoding is deterministic, so an encoded value
//! doubles as an index key.

mod value;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{KvError, Result};
use crate::record::Attributes;

pub use value::Value;

/// Current codec format version
pub const FORMAT_VERSION: u8 = 1;

/// Encode any serializable value with the version prefix
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let size = bincode::serialized_size(value).map_err(|e| KvError::Codec(e.to_string()))?;
    let mut bytes = Vec::with_capacity(1 + size as usize);
    bytes.push(FORMAT_VERSION);
    bincode::serialize_into(&mut bytes, value).map_err(|e| KvError::Codec(e.to_string()))?;
    Ok(bytes)
}

/// Decode bytes produced by `encode`
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (version, body) = bytes
        .split_first()
        .ok_or_else(|| KvError::Codec("empty payload".to_string()))?;

    if *version != FORMAT_VERSION {
        return Err(KvError::Codec(format!(
            "unsupported format version {}",
            version
        )));
    }

    bincode::deserialize(body).map_err(|e| KvError::Codec(e.to_string()))
}

/// Encode a single attribute value
pub fn encode_value(value: &Value) -> Result<Vec<u8>> {
    encode(value)
}

pub fn decode_value(bytes: &[u8]) -> Result<Value> {
    decode(bytes)
}

/// Encode a record's attribute map (the id is not part of the payload)
pub fn encode_attributes(attributes: &Attributes) -> Result<Vec<u8>> {
    encode(attributes)
}

pub fn decode_attributes(bytes: &[u8]) -> Result<Attributes> {
    decode(bytes)
}
