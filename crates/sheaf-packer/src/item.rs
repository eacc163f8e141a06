use serde::{Deserialize, Serialize};

/// A logical record stored through the packer.
///
/// The id is unique across the whole packer and stable for the item's
/// lifetime; it is the only handle for later reads and deletes. The payload
/// is opaque bytes -- encoding and decoding of the caller's domain object is
/// entirely the caller's concern.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier; addressing hashes these bytes.
    pub id: String,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
}

impl Item {
    /// Create an item from an id and payload.
    pub fn new(id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }
}

impl std::fmt::Debug for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Item")
            .field("id", &self.id)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
