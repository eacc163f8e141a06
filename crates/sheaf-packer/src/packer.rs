//! The packing engine: item operations over a storage view.
//!
//! `StoragePacker` combines the address resolver, lock pool, bucket codec,
//! and shard directory into one read-modify-write protocol. Each operation
//! takes the owning bucket's pool lock, lazily reconciles the bucket's
//! directory entry from the view's key listing, routes the item's seed to
//! its active shard, and performs the fetch-decode-mutate-encode-store cycle
//! inside the critical section. Writes that push a shard past the size limit
//! trigger a split before the operation completes.

use std::sync::Arc;

use tracing::{debug, warn};

use sheaf_view::StorageView;

use crate::address::{AddressResolver, ShardPathSeed};
use crate::codec::{self, ShardContents};
use crate::config::PackerConfig;
use crate::directory::ShardDirectory;
use crate::error::{PackerError, PackerResult};
use crate::item::Item;
use crate::locks::LockPool;

/// Key namespace for all shard entries written by the packer.
const KEY_PREFIX: &str = "buckets";

/// Packs many small items into size-bounded shards behind a [`StorageView`].
///
/// All methods take `&self`; the packer is safe to share across threads via
/// `Arc`. Operations on items in distinct buckets run fully parallel
/// (subject to lock-pool slot collisions); operations within one bucket are
/// serialized by the bucket's lock.
pub struct StoragePacker {
    view: Arc<dyn StorageView>,
    config: PackerConfig,
    resolver: AddressResolver,
    locks: LockPool,
    directory: ShardDirectory,
}

impl StoragePacker {
    /// Create a packer over `view`. Validates the configuration; performs
    /// no I/O.
    pub fn new(view: Arc<dyn StorageView>, config: PackerConfig) -> PackerResult<Self> {
        config.validate()?;
        let resolver = AddressResolver::new(config.bucket_count);
        let locks = LockPool::new(config.lock_pool_size);
        let directory = ShardDirectory::new(config.static_bits());
        Ok(Self {
            view,
            config,
            resolver,
            locks,
            directory,
        })
    }

    /// Insert or overwrite an item. Returns the key of the shard that holds
    /// it after the write (splits included).
    ///
    /// Put is idempotent per id: writing the same id twice leaves one live
    /// copy with the latest payload.
    pub fn put_item(&self, item: &Item) -> PackerResult<String> {
        if item.id.is_empty() {
            return Err(PackerError::InvalidItem("item id must not be empty"));
        }
        let addr = self.resolver.resolve(&item.id);
        let _guard = self.locks.write(addr.bucket);
        self.reconcile_bucket(addr.bucket)?;

        let path = self.route(addr.bucket, &addr.seed);
        let key = self.shard_key_at(addr.bucket, &path);
        let mut contents = self.load_contents(&key)?;
        contents.insert(&item.id, &item.payload);

        let held = self.store_shard(addr.bucket, path, contents, &item.id)?;
        // The inserted item is in exactly one stored group.
        Ok(held.unwrap_or(key))
    }

    /// Look up an item by id. Absence is `Ok(None)`, never an error.
    pub fn get_item(&self, item_id: &str) -> PackerResult<Option<Item>> {
        if item_id.is_empty() {
            return Ok(None);
        }
        let addr = self.resolver.resolve(item_id);
        let _guard = self.locks.read(addr.bucket);
        self.reconcile_bucket(addr.bucket)?;

        let path = self.route(addr.bucket, &addr.seed);
        let key = self.shard_key_at(addr.bucket, &path);
        let Some(bytes) = self.view_get(&key)? else {
            return Ok(None);
        };
        let contents = self.decode(&key, &bytes)?;
        Ok(contents
            .get(item_id)
            .map(|payload| Item::new(item_id, payload.to_vec())))
    }

    /// Remove an item by id. Idempotent: deleting an absent id succeeds.
    ///
    /// A shard whose collection becomes empty is deleted from the view, not
    /// stored as a zero-item entry.
    pub fn delete_item(&self, item_id: &str) -> PackerResult<()> {
        if item_id.is_empty() {
            return Ok(());
        }
        let addr = self.resolver.resolve(item_id);
        let _guard = self.locks.write(addr.bucket);
        self.reconcile_bucket(addr.bucket)?;

        let path = self.route(addr.bucket, &addr.seed);
        let key = self.shard_key_at(addr.bucket, &path);
        let Some(bytes) = self.view_get(&key)? else {
            return Ok(());
        };
        let mut contents = self.decode(&key, &bytes)?;
        if contents.remove(item_id).is_none() {
            return Ok(());
        }
        if contents.is_empty() {
            self.view_delete(&key)?;
            self.directory.remove_live(addr.bucket, &path);
            return Ok(());
        }
        // Write back the shrunk collection. Compression output is not
        // strictly monotone in the input, so the store path keeps the size
        // bound here too.
        self.store_shard(addr.bucket, path, contents, item_id)?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------

    /// Bucket index an item id resolves to. Pure.
    pub fn bucket_index(&self, item_id: &str) -> usize {
        self.resolver.resolve(item_id).bucket
    }

    /// Storage key the item would currently be read from or written to.
    pub fn shard_key(&self, item_id: &str) -> PackerResult<String> {
        let addr = self.resolver.resolve(item_id);
        let _guard = self.locks.read(addr.bucket);
        self.reconcile_bucket(addr.bucket)?;
        let path = self.route(addr.bucket, &addr.seed);
        Ok(self.shard_key_at(addr.bucket, &path))
    }

    /// Fetch and decode one shard by its storage key. An absent key yields
    /// an empty list. Takes no lock; callers that need a write-consistent
    /// read should use [`get_item`](Self::get_item).
    pub fn read_shard(&self, key: &str) -> PackerResult<Vec<Item>> {
        let Some(bytes) = self.view_get(key)? else {
            return Ok(Vec::new());
        };
        Ok(self.decode(key, &bytes)?.into_items())
    }

    /// Every item currently packed, across all buckets.
    ///
    /// Locks one bucket at a time, so the result is a point-in-time sweep,
    /// not a transactional snapshot.
    pub fn all_items(&self) -> PackerResult<Vec<Item>> {
        let mut items = Vec::new();
        for bucket in 0..self.config.bucket_count {
            let _guard = self.locks.read(bucket);
            self.reconcile_bucket(bucket)?;
            for path in self.directory.live_paths(bucket) {
                let key = self.shard_key_at(bucket, &path);
                let Some(bytes) = self.view_get(&key)? else {
                    continue;
                };
                items.extend(self.decode(&key, &bytes)?.into_items());
            }
        }
        Ok(items)
    }

    /// The configuration this packer was built with.
    pub fn config(&self) -> &PackerConfig {
        &self.config
    }

    // ---------------------------------------------------------------
    // Store / split protocol
    // ---------------------------------------------------------------

    /// Write `contents` at `path`, splitting as needed to keep every stored
    /// shard within the size limit. Returns the key of the shard that ended
    /// up holding `target_id`, if it is present in `contents`.
    ///
    /// A split is planned in full before the view is touched, so an
    /// exhausted split fails with zero mutations. Leaf shards are then
    /// written before the old entry at `path` is deleted; if any write
    /// fails, the leaves written so far are removed again and the old entry
    /// stays the only copy. The directory is updated only once every view
    /// write has succeeded.
    fn store_shard(
        &self,
        bucket: usize,
        path: String,
        contents: ShardContents,
        target_id: &str,
    ) -> PackerResult<Option<String>> {
        let key = self.shard_key_at(bucket, &path);
        let encoded = self.encode(&key, &contents)?;

        if encoded.len() <= self.config.bucket_max_size || contents.len() == 1 {
            if encoded.len() > self.config.bucket_max_size {
                warn!(
                    key = %key,
                    size = encoded.len(),
                    max = self.config.bucket_max_size,
                    "single item exceeds the shard size limit; storing as-is"
                );
            }
            self.view_put(&key, &encoded)?;
            let holds_target = contents.contains(target_id);
            self.directory.record_live(bucket, &path);
            return Ok(holds_target.then_some(key));
        }

        let mut leaves = Vec::new();
        self.plan_split(bucket, &path, contents, &mut leaves)?;
        debug!(key = %key, leaves = leaves.len(), "splitting oversized shard");

        let mut written = Vec::with_capacity(leaves.len());
        for leaf in &leaves {
            let leaf_key = self.shard_key_at(bucket, &leaf.path);
            if let Err(err) = self.view_put(&leaf_key, &leaf.encoded) {
                self.unwind_split(&written);
                return Err(err);
            }
            written.push(leaf_key);
        }
        // All leaves are durable; retire the parent entry.
        if let Err(err) = self.view_delete(&key) {
            self.unwind_split(&written);
            return Err(err);
        }

        let mut held = None;
        for (leaf, leaf_key) in leaves.iter().zip(written) {
            self.directory.record_live(bucket, &leaf.path);
            if leaf.contents.contains(target_id) {
                held = Some(leaf_key);
            }
        }
        self.directory.remove_live(bucket, &path);
        Ok(held)
    }

    /// Partition oversized `contents` into leaf groups that each fit the
    /// limit (or hold a single item), recursing while a group still
    /// over-encodes. Pure planning, no view I/O: `SplitExhausted` surfaces
    /// before anything is mutated.
    fn plan_split(
        &self,
        bucket: usize,
        path: &str,
        contents: ShardContents,
        leaves: &mut Vec<SplitLeaf>,
    ) -> PackerResult<()> {
        if path.len() + 1 > self.split_ceiling() {
            return Err(PackerError::SplitExhausted {
                key: self.shard_key_at(bucket, path),
                depth: path.len().saturating_sub(self.config.static_bits()),
            });
        }
        let (zeros, ones) = self.partition(contents, path.len());
        for (bit, group) in [('0', zeros), ('1', ones)] {
            if group.is_empty() {
                // A shard never exists empty; the sibling path comes into
                // existence when an item first routes to it.
                continue;
            }
            let mut child = path.to_string();
            child.push(bit);
            let child_key = self.shard_key_at(bucket, &child);
            let encoded = self.encode(&child_key, &group)?;
            if encoded.len() <= self.config.bucket_max_size || group.len() == 1 {
                if encoded.len() > self.config.bucket_max_size {
                    warn!(
                        key = %child_key,
                        size = encoded.len(),
                        max = self.config.bucket_max_size,
                        "single item exceeds the shard size limit; storing as-is"
                    );
                }
                leaves.push(SplitLeaf {
                    path: child,
                    contents: group,
                    encoded,
                });
            } else {
                self.plan_split(bucket, &child, group, leaves)?;
            }
        }
        Ok(())
    }

    /// Best-effort removal of leaves written before a split failed.
    fn unwind_split(&self, written: &[String]) {
        for key in written {
            if let Err(error) = self.view.delete(key) {
                warn!(key = %key, %error, "failed to remove partially written split shard");
            }
        }
    }

    /// Split `contents` into two groups by each item's seed bit at
    /// `bit_index`.
    fn partition(
        &self,
        contents: ShardContents,
        bit_index: usize,
    ) -> (ShardContents, ShardContents) {
        let mut zeros = ShardContents::new();
        let mut ones = ShardContents::new();
        for item in contents.into_items() {
            let addr = self.resolver.resolve(&item.id);
            if addr.seed.bit(bit_index) {
                ones.insert(&item.id, &item.payload);
            } else {
                zeros.insert(&item.id, &item.payload);
            }
        }
        (zeros, ones)
    }

    /// Longest permitted shard path: static bits plus the configured split
    /// cap, clamped to the seed bits the hash can supply.
    fn split_ceiling(&self) -> usize {
        let configured = match self.config.max_split_depth {
            Some(depth) => self.config.static_bits().saturating_add(depth),
            None => usize::MAX,
        };
        configured.min(self.resolver.seed_bits())
    }

    // ---------------------------------------------------------------
    // Directory reconciliation and routing
    // ---------------------------------------------------------------

    /// Initialize the bucket's directory entry from the view on first touch.
    fn reconcile_bucket(&self, bucket: usize) -> PackerResult<()> {
        if self.directory.is_initialized(bucket) {
            return Ok(());
        }
        let root = self.bucket_root(bucket);
        let keys = self
            .view
            .list(&root)
            .map_err(|source| PackerError::Storage {
                op: "list",
                key: root.clone(),
                source,
            })?;
        let mut paths = Vec::with_capacity(keys.len());
        for key in keys {
            match parse_shard_path(&root, &key, self.resolver.seed_bits()) {
                Some(path) => paths.push(path),
                None => warn!(key = %key, "skipping key that is not a shard path"),
            }
        }
        debug!(bucket, shards = paths.len(), "reconciled bucket from view");
        self.directory.initialize(bucket, paths);
        Ok(())
    }

    /// Active shard path for a seed at the bucket's current depth.
    fn route(&self, bucket: usize, seed: &ShardPathSeed) -> String {
        let depth = self.directory.depth(bucket);
        let full = seed.prefix(self.config.static_bits() + depth);
        self.directory.route(bucket, &full)
    }

    // ---------------------------------------------------------------
    // Keys and codec plumbing
    // ---------------------------------------------------------------

    /// Root key of a bucket: `buckets/<hex>`, fixed-width so no bucket root
    /// is a prefix of another.
    fn bucket_root(&self, bucket: usize) -> String {
        let width = (self.resolver.bucket_bits() + 7) / 8;
        let bytes = bucket.to_be_bytes();
        let hex = hex::encode(&bytes[bytes.len() - width.max(1)..]);
        format!("{KEY_PREFIX}/{hex}")
    }

    /// Storage key of the shard at `path` under `bucket`.
    fn shard_key_at(&self, bucket: usize, path: &str) -> String {
        let root = self.bucket_root(bucket);
        if path.is_empty() {
            root
        } else {
            format!("{root}/{path}")
        }
    }

    fn load_contents(&self, key: &str) -> PackerResult<ShardContents> {
        match self.view_get(key)? {
            Some(bytes) => self.decode(key, &bytes),
            None => Ok(ShardContents::new()),
        }
    }

    fn decode(&self, key: &str, bytes: &[u8]) -> PackerResult<ShardContents> {
        codec::decode(bytes).map_err(|source| PackerError::Corruption {
            key: key.to_string(),
            source,
        })
    }

    fn encode(&self, key: &str, contents: &ShardContents) -> PackerResult<Vec<u8>> {
        codec::encode(contents).map_err(|source| PackerError::Corruption {
            key: key.to_string(),
            source,
        })
    }

    fn view_get(&self, key: &str) -> PackerResult<Option<Vec<u8>>> {
        self.view.get(key).map_err(|source| PackerError::Storage {
            op: "get",
            key: key.to_string(),
            source,
        })
    }

    fn view_put(&self, key: &str, value: &[u8]) -> PackerResult<()> {
        self.view
            .put(key, value)
            .map_err(|source| PackerError::Storage {
                op: "put",
                key: key.to_string(),
                source,
            })
    }

    fn view_delete(&self, key: &str) -> PackerResult<()> {
        self.view
            .delete(key)
            .map_err(|source| PackerError::Storage {
                op: "delete",
                key: key.to_string(),
                source,
            })
    }
}

impl std::fmt::Debug for StoragePacker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoragePacker")
            .field("config", &self.config)
            .finish()
    }
}

/// One planned split output: a leaf group and its encoded form.
struct SplitLeaf {
    path: String,
    contents: ShardContents,
    encoded: Vec<u8>,
}

/// Parse a listed key back into a shard path under `root`. The root key
/// itself is the zero-bit path; anything else must be `root/<bitstring>`
/// with no more bits than the seed can supply -- a longer suffix cannot
/// have been written by the packer and would push routing past the hash.
fn parse_shard_path(root: &str, key: &str, max_bits: usize) -> Option<String> {
    if key == root {
        return Some(String::new());
    }
    let rest = key.strip_prefix(root)?.strip_prefix('/')?;
    if !rest.is_empty()
        && rest.len() <= max_bits
        && rest.bytes().all(|b| b == b'0' || b == b'1')
    {
        Some(rest.to_string())
    } else {
        None
    }
}
