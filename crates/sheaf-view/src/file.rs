use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ViewError, ViewResult};
use crate::traits::StorageView;

/// File-backed storage view: one file per key under a root directory.
///
/// Key segments map to directories, and the final segment is stored as a
/// file named with a `_` prefix. The prefix keeps a key and keys extending
/// it (`buckets/0a` and `buckets/0a/01`) from colliding on one filesystem
/// path; the packer's split protocol has both alive transiently.
pub struct FileView {
    root: PathBuf,
}

impl FileView {
    /// Open a view rooted at `root`, creating the directory if needed.
    pub fn open(root: &Path) -> ViewResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Root directory of this view.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to its on-disk path (`a/b/c` becomes `<root>/a/b/_c`).
    fn file_path(&self, key: &str) -> ViewResult<PathBuf> {
        validate_key(key)?;
        let mut path = self.root.clone();
        let mut segments = key.split('/').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                path.push(format!("_{segment}"));
            }
        }
        Ok(path)
    }

    /// Recursively collect keys below `dir`, reconstructing each key from
    /// the directory prefix and the `_`-stripped file name.
    fn collect_keys(&self, dir: &Path, key_prefix: &str, out: &mut Vec<String>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!(path = %entry.path().display(), "skipping non-UTF-8 entry");
                continue;
            };
            if entry.file_type()?.is_dir() {
                let child_prefix = join_key(key_prefix, name);
                self.collect_keys(&entry.path(), &child_prefix, out)?;
            } else if let Some(leaf) = name.strip_prefix('_') {
                out.push(join_key(key_prefix, leaf));
            } else {
                // Not written by this view; leave it alone.
                warn!(path = %entry.path().display(), "skipping foreign file");
            }
        }
        Ok(())
    }
}

impl StorageView for FileView {
    fn get(&self, key: &str) -> ViewResult<Option<Vec<u8>>> {
        let path = self.file_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> ViewResult<()> {
        let path = self.file_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> ViewResult<()> {
        let path = self.file_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        // Prune now-empty parent directories up to the root. Best effort: a
        // concurrent writer may be repopulating them.
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == self.root || fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
        Ok(())
    }

    fn list(&self, prefix: &str) -> ViewResult<Vec<String>> {
        // Walk only the deepest directory the prefix fully names; the final
        // (possibly partial) segment is matched against reconstructed keys.
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };

        let mut start = self.root.clone();
        if !dir_part.is_empty() {
            for segment in dir_part.split('/') {
                if segment.is_empty() || segment == "." || segment == ".." {
                    return Err(ViewError::InvalidKey {
                        key: prefix.to_string(),
                        reason: "invalid path segment in prefix",
                    });
                }
                start.push(segment);
            }
        }

        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        self.collect_keys(&start, dir_part, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

impl std::fmt::Debug for FileView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileView").field("root", &self.root).finish()
    }
}

fn join_key(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}/{segment}")
    }
}

fn validate_key(key: &str) -> ViewResult<()> {
    let invalid = |reason: &'static str| {
        Err(ViewError::InvalidKey {
            key: key.to_string(),
            reason,
        })
    };
    if key.is_empty() {
        return invalid("empty key");
    }
    if key.starts_with('/') {
        return invalid("absolute path");
    }
    for segment in key.split('/') {
        if segment.is_empty() {
            return invalid("empty path segment");
        }
        if segment == "." || segment == ".." {
            return invalid("path traversal segment");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_view() -> (TempDir, FileView) {
        let dir = TempDir::new().unwrap();
        let view = FileView::open(dir.path()).unwrap();
        (dir, view)
    }

    // -----------------------------------------------------------------------
    // Core operations
    // -----------------------------------------------------------------------

    #[test]
    fn put_and_get_roundtrip() {
        let (_dir, view) = open_view();
        view.put("buckets/0a", b"payload").unwrap();

        let value = view.get("buckets/0a").unwrap().expect("should exist");
        assert_eq!(value, b"payload");
    }

    #[test]
    fn get_missing_key_returns_none() {
        let (_dir, view) = open_view();
        assert!(view.get("buckets/ff").unwrap().is_none());
    }

    #[test]
    fn put_overwrites_existing_value() {
        let (_dir, view) = open_view();
        view.put("k", b"first").unwrap();
        view.put("k", b"second").unwrap();
        assert_eq!(view.get("k").unwrap().unwrap(), b"second");
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, view) = open_view();
        view.put("buckets/0a", b"x").unwrap();

        view.delete("buckets/0a").unwrap();
        assert!(view.get("buckets/0a").unwrap().is_none());

        view.delete("buckets/0a").unwrap();
        view.delete("never/written").unwrap();
    }

    // -----------------------------------------------------------------------
    // Key layout
    // -----------------------------------------------------------------------

    #[test]
    fn key_and_extending_key_coexist() {
        // A shard key and its split children share a path spine; the `_`
        // file naming must keep them from colliding.
        let (_dir, view) = open_view();
        view.put("buckets/0a", b"parent").unwrap();
        view.put("buckets/0a/0", b"left").unwrap();
        view.put("buckets/0a/1", b"right").unwrap();

        assert_eq!(view.get("buckets/0a").unwrap().unwrap(), b"parent");
        assert_eq!(view.get("buckets/0a/0").unwrap().unwrap(), b"left");
        assert_eq!(view.get("buckets/0a/1").unwrap().unwrap(), b"right");
    }

    #[test]
    fn delete_prunes_empty_directories() {
        let (dir, view) = open_view();
        view.put("a/b/c", b"x").unwrap();
        view.delete("a/b/c").unwrap();

        assert!(!dir.path().join("a").exists());
        // The root itself must survive.
        assert!(dir.path().is_dir());
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    #[test]
    fn list_finds_nested_keys_sorted() {
        let (_dir, view) = open_view();
        view.put("buckets/0a/1", b"x").unwrap();
        view.put("buckets/0a", b"x").unwrap();
        view.put("buckets/0a/01", b"x").unwrap();
        view.put("buckets/0b", b"x").unwrap();
        view.put("other", b"x").unwrap();

        let keys = view.list("buckets/0a").unwrap();
        assert_eq!(keys, vec!["buckets/0a", "buckets/0a/01", "buckets/0a/1"]);
    }

    #[test]
    fn list_with_empty_prefix_returns_all_keys() {
        let (_dir, view) = open_view();
        view.put("b", b"x").unwrap();
        view.put("a/x", b"x").unwrap();

        assert_eq!(view.list("").unwrap(), vec!["a/x", "b"]);
    }

    #[test]
    fn list_under_missing_directory_is_empty() {
        let (_dir, view) = open_view();
        assert!(view.list("no/such/prefix").unwrap().is_empty());
    }

    #[test]
    fn list_matches_partial_final_segment() {
        let (_dir, view) = open_view();
        view.put("buckets/0a", b"x").unwrap();
        view.put("buckets/0b", b"x").unwrap();
        view.put("buckets/1a", b"x").unwrap();

        let keys = view.list("buckets/0").unwrap();
        assert_eq!(keys, vec!["buckets/0a", "buckets/0b"]);
    }

    // -----------------------------------------------------------------------
    // Key validation
    // -----------------------------------------------------------------------

    #[test]
    fn rejects_malformed_keys() {
        let (_dir, view) = open_view();
        for bad in ["", "/abs", "a//b", "a/../b", "./a", "a/"] {
            let err = view.put(bad, b"x").unwrap_err();
            assert!(matches!(err, ViewError::InvalidKey { .. }), "key {bad:?}");
        }
    }

    // -----------------------------------------------------------------------
    // Durability
    // -----------------------------------------------------------------------

    #[test]
    fn values_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let view = FileView::open(dir.path()).unwrap();
            view.put("buckets/0a/010", b"durable").unwrap();
        }
        let view = FileView::open(dir.path()).unwrap();
        assert_eq!(view.get("buckets/0a/010").unwrap().unwrap(), b"durable");
        assert_eq!(view.list("buckets").unwrap(), vec!["buckets/0a/010"]);
    }
}
