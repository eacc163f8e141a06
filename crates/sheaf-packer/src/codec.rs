//! Bucket codec: the stored byte representation of one shard.
//!
//! Frame layout:
//! ```text
//! [4 bytes: magic "SHFB"]
//! [4 bytes: format version (big-endian u32)]
//! [4 bytes: CRC32 of the compressed payload (big-endian u32)]
//! [N bytes: zstd-compressed bincode of ShardContents]
//! ```
//!
//! The size threshold that drives splitting applies to the exact framed
//! bytes `encode` returns: growth detection is encode-then-measure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::item::Item;

const MAGIC: &[u8; 4] = b"SHFB";
const VERSION: u32 = 1;
/// Magic + version + CRC.
const HEADER_SIZE: usize = 12;
const COMPRESSION_LEVEL: i32 = 3;

/// One shard's item collection: id to payload.
///
/// A sorted map, so the encoded form of a given collection is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardContents {
    items: BTreeMap<String, Vec<u8>>,
}

impl ShardContents {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if no items are held.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert or overwrite an item. Returns the previous payload, if any.
    pub fn insert(&mut self, id: &str, payload: &[u8]) -> Option<Vec<u8>> {
        self.items.insert(id.to_string(), payload.to_vec())
    }

    /// Remove an item by id. Returns its payload, if it was present.
    pub fn remove(&mut self, id: &str) -> Option<Vec<u8>> {
        self.items.remove(id)
    }

    /// Payload of the item with this id, if present.
    pub fn get(&self, id: &str) -> Option<&[u8]> {
        self.items.get(id).map(Vec::as_slice)
    }

    /// Whether an item with this id is held.
    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Iterate `(id, payload)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.items.iter().map(|(id, p)| (id.as_str(), p.as_slice()))
    }

    /// Consume the collection into owned items, in id order.
    pub fn into_items(self) -> Vec<Item> {
        self.items
            .into_iter()
            .map(|(id, payload)| Item { id, payload })
            .collect()
    }
}

/// Errors from encoding or decoding a shard frame.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("shard frame too short: {len} bytes")]
    TooShort { len: usize },

    #[error("bad shard magic")]
    BadMagic,

    #[error("unsupported shard format version: {0}")]
    UnsupportedVersion(u32),

    #[error("shard checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("compression failed: {0}")]
    Compression(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

/// Encode a shard's contents into the framed stored form.
///
/// The returned length is the shard's `SizeBytes` for the split decision.
pub fn encode(contents: &ShardContents) -> Result<Vec<u8>, CodecError> {
    let payload =
        bincode::serialize(contents).map_err(|e| CodecError::Serialization(e.to_string()))?;
    let compressed = zstd::encode_all(payload.as_slice(), COMPRESSION_LEVEL)
        .map_err(|e| CodecError::Compression(e.to_string()))?;

    let mut out = Vec::with_capacity(HEADER_SIZE + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.extend_from_slice(&crc32fast::hash(&compressed).to_be_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Decode a stored shard frame back into its contents.
///
/// Every failure mode is a distinct variant; the packer surfaces them all as
/// corruption of the shard's key.
pub fn decode(bytes: &[u8]) -> Result<ShardContents, CodecError> {
    if bytes.len() < HEADER_SIZE {
        return Err(CodecError::TooShort { len: bytes.len() });
    }
    if &bytes[..4] != MAGIC {
        return Err(CodecError::BadMagic);
    }
    let version = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let expected = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

    let compressed = &bytes[HEADER_SIZE..];
    let actual = crc32fast::hash(compressed);
    if actual != expected {
        return Err(CodecError::ChecksumMismatch { expected, actual });
    }

    let payload =
        zstd::decode_all(compressed).map_err(|e| CodecError::Decompression(e.to_string()))?;
    bincode::deserialize(&payload).map_err(|e| CodecError::Deserialization(e.to_string()))
}
