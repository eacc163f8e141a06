use thiserror::Error;

use sheaf_view::ViewError;

use crate::codec::CodecError;

/// Errors from packer operations.
///
/// Absence is not an error: `get_item` returns `Ok(None)` for an unknown id,
/// never a variant of this enum.
#[derive(Debug, Error)]
pub enum PackerError {
    /// Invalid configuration, rejected at construction time.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The item itself is unusable (e.g. an empty id).
    #[error("invalid item: {0}")]
    InvalidItem(&'static str),

    /// The underlying storage view failed. Propagated with the operation and
    /// key for context; never retried by the packer.
    #[error("storage {op} failed for key {key:?}: {source}")]
    Storage {
        op: &'static str,
        key: String,
        #[source]
        source: ViewError,
    },

    /// A stored shard failed to decode. Fatal for the call; the packer does
    /// not attempt partial recovery of a corrupt shard.
    #[error("corrupt shard at key {key:?}: {source}")]
    Corruption {
        key: String,
        #[source]
        source: CodecError,
    },

    /// Resharding ran out of hash bits (or hit the configured split cap)
    /// without bringing a shard under the size limit. Definite and
    /// non-retryable.
    #[error("cannot split shard {key:?} further (depth {depth})")]
    SplitExhausted { key: String, depth: usize },
}

/// Result alias for packer operations.
pub type PackerResult<T> = Result<T, PackerError>;
