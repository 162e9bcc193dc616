//! Pluggable wire formats.
//!
//! A `WireFormat` is a bijective pair `T <-> bytes`. Two implementations are
//! provided, both backed by `serde`: [`Json`], convenient for debugging and
//! cross-language interop, and [`Binary`], a compact `bincode` encoding for
//! production traffic. Either satisfies the round-trip law
//! `decode(encode(x)) == x` required by `spec.md` §6 / §8 invariant 6.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Failure to encode or decode a value on the wire.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// JSON encoding/decoding failed.
    #[error("json (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    /// Bincode encoding/decoding failed.
    #[error("binary (de)serialization failed: {0}")]
    Binary(#[from] bincode::Error),
}

/// A serialization format usable to move typed values across the wire.
pub trait WireFormat {
    /// Encodes `value` to bytes.
    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError>;
    /// Decodes bytes produced by [`WireFormat::encode`] back into `T`.
    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError>;
}

/// JSON wire format.
pub struct Json;

impl WireFormat for Json {
    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Packed binary wire format (bincode).
pub struct Binary;

impl WireFormat for Binary {
    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
        Ok(bincode::serialize(value)?)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[test]
    fn json_round_trips() {
        let sample = Sample { a: 7, b: "hello".into() };
        let bytes = Json::encode(&sample).unwrap();
        let back: Sample = Json::decode(&bytes).unwrap();
        assert_eq!(sample, back);
    }

    #[test]
    fn binary_round_trips() {
        let sample = Sample { a: 7, b: "hello".into() };
        let bytes = Binary::encode(&sample).unwrap();
        let back: Sample = Binary::decode(&bytes).unwrap();
        assert_eq!(sample, back);
    }

    #[test]
    fn malformed_bytes_are_rejected() {
        let err = Json::decode::<Sample>(b"not json").unwrap_err();
        assert!(matches!(err, SerializationError::Json(_)));
    }
}
