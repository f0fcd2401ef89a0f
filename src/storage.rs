//! Storage layer for kb
//!
//! The board persists as one string value under a key in a key-value store.
//! On disk every key is its own file under the board directory:
//!
//! ```text
//! <root>/                       # --dir, KB_DIR, or the per-user data dir
//!   kb.toml                     # Configuration
//!   store/
//!     kanbanTasks_v2.json       # Board snapshot
//!     kanbanTasks_v2.json.lock  # fs2 lock guarding the snapshot
//!     kanbanTasks_v2.bak.json   # Unreadable snapshot set aside on load
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::config::CONFIG_FILE;
use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};

/// Environment variable overriding the board directory
pub const DIR_ENV: &str = "KB_DIR";

/// Name of the store subdirectory
pub const STORE_DIR: &str = "store";

/// String key-value persistence the board writes its snapshot to
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
        && !key.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("invalid storage key '{key}'")))
    }
}

/// File-backed store: one JSON file per key, written atomically under a lock
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    lock_timeout_ms: u64,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        lock::read_locked_str(self.path_for(key), self.lock_timeout_ms)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.path_for(key);
        lock::write_atomic_locked(&path, value.as_bytes(), self.lock_timeout_ms)?;
        tracing::debug!(key, path = %path.display(), bytes = value.len(), "store write");
        Ok(())
    }
}

/// In-memory store with a write counter
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    writes: usize,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let mut store = Self::default();
        store.values.insert(key.to_string(), value.to_string());
        store
    }

    /// Number of successful `set` calls
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Make every following `set` fail with an I/O error
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory store is read-only",
            )));
        }
        self.values.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }
}

/// Board directory layout
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the board directory: explicit path, then `KB_DIR`, then the per-user data dir
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }
        if let Ok(raw) = std::env::var(DIR_ENV) {
            let raw = raw.trim();
            if !raw.is_empty() {
                return Ok(Self::new(raw));
            }
        }
        let dirs = ProjectDirs::from("", "", "kb").ok_or_else(|| {
            Error::OperationFailed(format!(
                "cannot determine a data directory; pass --dir or set {DIR_ENV}"
            ))
        })?;
        Ok(Self::new(dirs.data_dir()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root.join(STORE_DIR)
    }

    pub fn is_initialized(&self) -> bool {
        self.config_file().exists()
    }

    /// Create the directory structure
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(self.store_dir())?;
        Ok(())
    }

    /// File store rooted at the store directory
    pub fn file_store(&self, lock_timeout_ms: u64) -> FileStore {
        FileStore::new(self.store_dir()).with_lock_timeout(lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn storage_paths() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());

        assert_eq!(storage.config_file(), temp.path().join("kb.toml"));
        assert_eq!(storage.store_dir(), temp.path().join("store"));
        assert!(!storage.is_initialized());

        storage.init().unwrap();
        assert!(storage.store_dir().is_dir());
    }

    #[test]
    fn explicit_dir_wins() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::resolve(Some(temp.path())).unwrap();
        assert_eq!(storage.root(), temp.path());
    }

    #[test]
    fn file_store_round_trips_values() {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::new(temp.path().join("store"));

        assert!(store.get("kanbanTasks_v2").unwrap().is_none());
        store.set("kanbanTasks_v2", "[]").unwrap();
        assert_eq!(store.get("kanbanTasks_v2").unwrap().as_deref(), Some("[]"));
        assert!(store.path_for("kanbanTasks_v2").exists());
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::new(temp.path());
        assert!(matches!(
            store.set("../escape", "x"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(store.get(""), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn file_store_times_out_when_locked() {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::new(temp.path()).with_lock_timeout(30);
        let path = store.path_for("board");
        let _held = lock::FileLock::acquire(lock::lock_path_for(&path), 1000).unwrap();

        assert!(matches!(store.set("board", "[]"), Err(Error::LockFailed(_))));
    }

    #[test]
    fn memory_store_counts_writes_and_can_fail() {
        let mut store = MemoryStore::new();
        store.set("k", "1").unwrap();
        store.set("k", "2").unwrap();
        assert_eq!(store.writes(), 2);
        assert_eq!(store.raw("k"), Some("2"));

        store.set_fail_writes(true);
        assert!(matches!(store.set("k", "3"), Err(Error::Io(_))));
        assert_eq!(store.raw("k"), Some("2"));
        assert_eq!(store.writes(), 2);
    }
}
