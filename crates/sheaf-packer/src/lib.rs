//! Sheaf packer: aggregates many small logical records into size-bounded
//! physical shards stored through a key-value [`StorageView`].
//!
//! Backends that charge per-object overhead (rate limits, per-call latency,
//! transaction cost) should not pay one physical write per logical record.
//! The packer hashes each item id to one of a fixed number of buckets,
//! serializes a bucket's contents as compressed shard blobs, and splits a
//! shard in two whenever its encoded form crosses the configured size limit,
//! in the manner of an extendible hash table whose directory is rebuilt from
//! the view's key listing. A fixed lock pool serializes conflicting
//! read-modify-write cycles per bucket while leaving distinct buckets fully
//! parallel; the view needs no compare-and-swap.
//!
//! # Modules
//!
//! - [`address`] -- hashes item ids to buckets and shard path seeds
//! - [`codec`] -- the framed, compressed stored form of one shard
//! - [`directory`] -- per-bucket split depth and live shard paths
//! - [`locks`] -- the fixed pool of bucket locks
//! - [`packer`] -- the engine combining the above over a view
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sheaf_packer::{Item, PackerConfig, StoragePacker};
//! use sheaf_view::InMemoryView;
//!
//! let view = Arc::new(InMemoryView::new());
//! let packer = StoragePacker::new(view, PackerConfig::default())?;
//!
//! packer.put_item(&Item::new("user/1", b"profile".to_vec()))?;
//! let item = packer.get_item("user/1")?.expect("just inserted");
//! assert_eq!(item.payload, b"profile");
//!
//! packer.delete_item("user/1")?;
//! assert!(packer.get_item("user/1")?.is_none());
//! # Ok::<(), sheaf_packer::PackerError>(())
//! ```
//!
//! # Guarantees
//!
//! 1. Exactly one live copy of an item exists per id at any time.
//! 2. Every stored shard fits `bucket_max_size`, unless it holds a single
//!    item that alone exceeds the limit.
//! 3. Addressing is deterministic: the same id always maps to the same
//!    bucket and, at a fixed depth, the same shard key.
//! 4. Absence is `Ok(None)`, never an error; all failures surface
//!    synchronously to the caller with no background repair.

pub mod address;
pub mod codec;
pub mod config;
pub mod directory;
pub mod error;
pub mod item;
pub mod locks;
pub mod packer;

// Re-export primary types at crate root for ergonomic imports.
pub use address::{AddressResolver, ItemAddress, ShardPathSeed};
pub use codec::{CodecError, ShardContents};
pub use config::PackerConfig;
pub use directory::ShardDirectory;
pub use error::{PackerError, PackerResult};
pub use item::Item;
pub use locks::LockPool;
pub use packer::StoragePacker;
