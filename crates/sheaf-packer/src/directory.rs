//! In-memory bucket/shard directory.
//!
//! Tracks, per bucket, how deep its keyspace has split and which shard paths
//! currently hold data. This is pure bookkeeping: hashing lives in
//! [`address`](crate::address) and I/O in [`packer`](crate::packer), so
//! routing and split accounting are testable without a storage backend. The
//! view's key listing remains the source of truth; entries here are rebuilt
//! lazily from it, and mutated only by a caller holding the owning bucket's
//! pool lock, after the corresponding view write succeeded.
//!
//! Paths are `0`/`1` bitstrings of consumed seed bits, static bits included.
//! The live set of a bucket is kept prefix-free: no live path is a proper
//! prefix of another. Depth is monotone; shards are never merged back.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use tracing::warn;

/// Per-bucket split state.
#[derive(Clone, Debug, Default)]
struct BucketState {
    /// Dynamic splits beyond the static partition.
    depth: usize,
    /// Shard paths that currently hold data.
    live: BTreeSet<String>,
}

/// Directory over all buckets of one packer.
#[derive(Debug)]
pub struct ShardDirectory {
    static_bits: usize,
    buckets: RwLock<HashMap<usize, BucketState>>,
}

impl ShardDirectory {
    /// Directory for buckets whose static partition consumes `static_bits`
    /// leading seed bits.
    pub fn new(static_bits: usize) -> Self {
        Self {
            static_bits,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Whether the bucket has been reconciled from the view.
    pub fn is_initialized(&self, bucket: usize) -> bool {
        self.buckets
            .read()
            .expect("lock poisoned")
            .contains_key(&bucket)
    }

    /// Install the shard paths discovered in the view. A bucket initialized
    /// concurrently keeps its existing entry; both reconciliations read the
    /// same view state.
    pub fn initialize(&self, bucket: usize, paths: Vec<String>) {
        let static_bits = self.static_bits;
        let mut map = self.buckets.write().expect("lock poisoned");
        map.entry(bucket).or_insert_with(|| {
            let live: BTreeSet<String> = paths.into_iter().collect();
            let depth = live
                .iter()
                .map(|p| p.len().saturating_sub(static_bits))
                .max()
                .unwrap_or(0);
            warn_on_overlap(bucket, &live);
            BucketState { depth, live }
        });
    }

    /// Current split depth of the bucket; 0 if never touched.
    pub fn depth(&self, bucket: usize) -> usize {
        self.buckets
            .read()
            .expect("lock poisoned")
            .get(&bucket)
            .map_or(0, |s| s.depth)
    }

    /// Route a seed to its active shard path.
    ///
    /// `seed_prefix` must be the seed rendered at the bucket's full current
    /// length (static bits + depth). The deepest live prefix wins; a seed
    /// with no live prefix routes to its canonical path at the full length,
    /// which keeps the live set prefix-free.
    pub fn route(&self, bucket: usize, seed_prefix: &str) -> String {
        let map = self.buckets.read().expect("lock poisoned");
        if let Some(state) = map.get(&bucket) {
            for len in (self.static_bits..=seed_prefix.len()).rev() {
                if state.live.contains(&seed_prefix[..len]) {
                    return seed_prefix[..len].to_string();
                }
            }
        }
        seed_prefix.to_string()
    }

    /// Mark `path` live, raising the bucket's depth if the path is deeper
    /// than anything recorded so far.
    pub fn record_live(&self, bucket: usize, path: &str) {
        let static_bits = self.static_bits;
        let mut map = self.buckets.write().expect("lock poisoned");
        let state = map.entry(bucket).or_default();
        state.depth = state.depth.max(path.len().saturating_sub(static_bits));
        state.live.insert(path.to_string());
    }

    /// Forget a path whose shard was deleted. Depth stays: it is monotone
    /// for the process lifetime.
    pub fn remove_live(&self, bucket: usize, path: &str) {
        let mut map = self.buckets.write().expect("lock poisoned");
        if let Some(state) = map.get_mut(&bucket) {
            state.live.remove(path);
        }
    }

    /// Snapshot of the bucket's live shard paths, sorted.
    pub fn live_paths(&self, bucket: usize) -> Vec<String> {
        self.buckets
            .read()
            .expect("lock poisoned")
            .get(&bucket)
            .map_or_else(Vec::new, |s| s.live.iter().cloned().collect())
    }
}

/// A live path that is a proper prefix of another can only appear after a
/// crash between split child writes and the parent delete. Routing prefers
/// the deeper path, so the post-split children win; repair is left to the
/// operator.
fn warn_on_overlap(bucket: usize, live: &BTreeSet<String>) {
    let mut prev: Option<&String> = None;
    for path in live {
        if let Some(parent) = prev {
            if path.len() > parent.len() && path.starts_with(parent.as_str()) {
                warn!(
                    bucket,
                    parent = %parent,
                    child = %path,
                    "overlapping live shard paths; routing prefers the deeper path"
                );
            }
        }
        prev = Some(path);
    }
}
