use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Fixed pool of reader-writer locks guarding buckets.
///
/// Slot `bucket % len` guards every shard of that bucket, at any depth:
/// resharding mutates the bucket's shard set, so anything finer than bucket
/// granularity would race with splits. The pool size is independent of the
/// bucket count -- distinct buckets may share a slot, which costs contention
/// but never correctness. The pool is owned by its packer instance, never
/// process-global, so multiple packers in one process stay independent.
pub struct LockPool {
    slots: Vec<RwLock<()>>,
}

impl LockPool {
    /// Pool with `size` slots. Size must be positive; `PackerConfig::validate`
    /// enforces this upstream.
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..size).map(|_| RwLock::new(())).collect(),
        }
    }

    /// Exclusive guard for `bucket`'s slot. Blocks until available; the
    /// guard releases on drop, on every exit path.
    pub fn write(&self, bucket: usize) -> RwLockWriteGuard<'_, ()> {
        self.slots[bucket % self.slots.len()]
            .write()
            .expect("lock poisoned")
    }

    /// Shared guard for `bucket`'s slot.
    pub fn read(&self, bucket: usize) -> RwLockReadGuard<'_, ()> {
        self.slots[bucket % self.slots.len()]
            .read()
            .expect("lock poisoned")
    }

    /// Number of slots in the pool.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the pool has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Debug for LockPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockPool")
            .field("slots", &self.slots.len())
            .finish()
    }
}
