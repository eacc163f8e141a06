use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::ViewResult;
use crate::traits::StorageView;

/// In-memory, BTreeMap-based storage view.
///
/// Intended for tests and embedding. All entries are held in memory behind a
/// `RwLock` for safe concurrent access. Values are cloned on read.
pub struct InMemoryView {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryView {
    /// Create a new empty in-memory view.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the view holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored values.
    pub fn total_bytes(&self) -> usize {
        self.entries
            .read()
            .expect("lock poisoned")
            .values()
            .map(|v| v.len())
            .sum()
    }

    /// Remove all entries from the view.
    pub fn clear(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }

    /// Return a sorted list of every key in the view.
    pub fn keys(&self) -> Vec<String> {
        let map = self.entries.read().expect("lock poisoned");
        map.keys().cloned().collect()
    }
}

impl Default for InMemoryView {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageView for InMemoryView {
    fn get(&self, key: &str) -> ViewResult<Option<Vec<u8>>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> ViewResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> ViewResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        map.remove(key);
        Ok(())
    }

    fn list(&self, prefix: &str) -> ViewResult<Vec<String>> {
        let map = self.entries.read().expect("lock poisoned");
        // BTreeMap iterates in key order, so the result is already sorted.
        Ok(map
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

impl std::fmt::Debug for InMemoryView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryView")
            .field("key_count", &count)
            .finish()
    }
}
