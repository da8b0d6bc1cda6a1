//! Serialization framework for payloads crossing the service boundary.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::RelayError;

/// Trait for data converters/serializers.
///
/// Converts activity arguments, results, and marker details to and from the
/// bytes carried on the wire. The worker core is agnostic to the encoding;
/// the default is JSON.
pub trait DataConverter: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, RelayError>;
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, RelayError>;
}

/// Default JSON data converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDataConverter;

impl DataConverter for JsonDataConverter {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, RelayError> {
        serde_json::to_vec(value).map_err(|e| RelayError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, RelayError> {
        serde_json::from_slice(data).map_err(|e| RelayError::Serialization(e.to_string()))
    }
}
