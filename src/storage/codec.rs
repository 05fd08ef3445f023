//! Whole-collection codecs.
//!
//! A codec turns the ordered record sequence of a collection into the bytes of
//! its backing file and back. The order of the sequence is the collection order.

use super::finite::ensure_finite;
use crate::core::{Result, StoreError};
use serde::{Serialize, de::DeserializeOwned};

pub trait RecordCodec: Send + Sync + 'static {
    /// Extension (without the dot) used for backing files written by this codec.
    fn file_extension(&self) -> &'static str;

    fn encode<R: Serialize>(&self, records: &[R]) -> Result<Vec<u8>>;

    fn decode<R: DeserializeOwned>(&self, bytes: &[u8]) -> Result<Vec<R>>;
}

/// JSON array of record objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonCodec {
    pub pretty: bool,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordCodec for JsonCodec {
    fn file_extension(&self) -> &'static str {
        "json"
    }

    /// Fails with `EncodingFailed` on NaN and infinities, which JSON cannot
    /// represent.
    fn encode<R: Serialize>(&self, records: &[R]) -> Result<Vec<u8>> {
        ensure_finite(records).map_err(|err| StoreError::EncodingFailed(err.to_string()))?;
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(records)
        } else {
            serde_json::to_vec(records)
        };
        encoded.map_err(|err| StoreError::EncodingFailed(err.to_string()))
    }

    fn decode<R: DeserializeOwned>(&self, bytes: &[u8]) -> Result<Vec<R>> {
        serde_json::from_slice(bytes).map_err(|err| StoreError::DecodingFailed(err.to_string()))
    }
}

/// MessagePack array of records, field names included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessagePackCodec;

impl RecordCodec for MessagePackCodec {
    fn file_extension(&self) -> &'static str {
        "msgpack"
    }

    fn encode<R: Serialize>(&self, records: &[R]) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(records).map_err(|err| StoreError::EncodingFailed(err.to_string()))
    }

    fn decode<R: DeserializeOwned>(&self, bytes: &[u8]) -> Result<Vec<R>> {
        rmp_serde::from_slice(bytes).map_err(|err| StoreError::DecodingFailed(err.to_string()))
    }
}
