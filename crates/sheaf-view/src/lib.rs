//! Storage view boundary for the Sheaf bucket packer.
//!
//! The packer aggregates many small logical records into larger physical
//! entries; this crate defines the key-value surface those entries are
//! written through. A [`StorageView`] is a plain string-keyed byte store
//! with `get`, `put`, `delete`, and prefix `list`. It offers no
//! compare-and-swap and no multi-key atomicity -- callers that need ordering
//! guarantees build them from locks above this boundary.
//!
//! # Implementations
//!
//! - [`InMemoryView`] -- `BTreeMap`-based view for tests and embedding
//! - [`FileView`] -- one file per key under a root directory
//!
//! # Semantics
//!
//! 1. Reading an absent key is `Ok(None)`, never an error.
//! 2. `delete` is idempotent: removing an absent key succeeds.
//! 3. `list(prefix)` returns full keys, sorted ascending.
//! 4. Values are opaque bytes; the view never interprets them.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{ViewError, ViewResult};
pub use file::FileView;
pub use memory::InMemoryView;
pub use traits::StorageView;
