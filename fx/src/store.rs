//! Key/value persistence backends for cached rate tables.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{FxError, FxResult};

/// A string key/value store.
///
/// Writes replace the previous value for a key as a whole; a reader sees
/// either the old value or the new one, never a mix.
pub trait KeyValueStore: Send + Sync {
    /// Read the value for `key`. Unreadable values are reported as absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Replace the value for `key`.
    fn put(&self, key: &str, value: String) -> FxResult<()>;

    /// Delete `key` if present.
    fn remove(&self, key: &str);
}

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.clone())
    }

    fn put(&self, key: &str, value: String) -> FxResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// One JSON file per key under a directory.
///
/// Reads and writes are blocking `std::fs` calls made on the caller's thread,
/// including from inside async resolution, where the resolver also holds its
/// in-flight lock across `put`. Entries are small files.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    fn write_atomic(&self, path: &Path, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, value)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(value) => Some(value),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable store entry");
                None
            }
        }
    }

    fn put(&self, key: &str, value: String) -> FxResult<()> {
        let path = self.path_for(key);
        self.write_atomic(&path, &value)
            .map_err(|e| FxError::Storage(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "Stored entry");
        Ok(())
    }

    fn remove(&self, key: &str) {
        let path = self.path_for(key);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove store entry");
            }
        }
    }
}

/// Shared store handle.
pub type SharedStore = Arc<dyn KeyValueStore>;
