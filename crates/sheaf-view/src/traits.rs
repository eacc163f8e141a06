use crate::error::ViewResult;

/// String-keyed byte storage underneath the packer.
///
/// All implementations must satisfy these invariants:
/// - Reading an absent key is `Ok(None)`, never an error.
/// - `put` creates or overwrites; there is no compare-and-swap.
/// - `delete` is idempotent: removing an absent key succeeds.
/// - `list` enumerates full keys, sorted ascending.
/// - No multi-key atomicity: callers build whatever ordering they need
///   from locks above this boundary.
/// - Values are opaque bytes; the view never interprets them.
/// - All I/O errors are propagated, never silently ignored.
pub trait StorageView: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &str) -> ViewResult<Option<Vec<u8>>>;

    /// Create or overwrite the value under `key`.
    fn put(&self, key: &str, value: &[u8]) -> ViewResult<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> ViewResult<()>;

    /// All keys beginning with `prefix`, in ascending order.
    ///
    /// An empty prefix enumerates every key in the view.
    fn list(&self, prefix: &str) -> ViewResult<Vec<String>>;
}
