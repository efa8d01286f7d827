//! Raw string key-value backends.
//!
//! Backends are allowed to fail; [`super::AppStorage`] is the layer that
//! absorbs those failures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

// =============================================================================
// Backend Trait
// =============================================================================

/// A persistent string-to-string map, shaped like browser local storage.
///
/// Operations are synchronous. Both controllers may share one backend, so
/// implementations must be `Send + Sync`.
pub trait StorageBackend: Send + Sync {
    /// Reads a slot. `Ok(None)` means the slot is empty.
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes a slot, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Empties a slot. Removing an empty slot is not an error.
    fn remove_item(&self, key: &str) -> StorageResult<()>;

    /// Empties every slot, including ones this application did not write.
    fn clear(&self) -> StorageResult<()>;
}

fn lock<'a>(
    map: &'a Mutex<HashMap<String, String>>,
) -> StorageResult<MutexGuard<'a, HashMap<String, String>>> {
    map.lock()
        .map_err(|_| StorageError::Unavailable("storage lock poisoned".to_string()))
}

// =============================================================================
// Memory Backend
// =============================================================================

/// In-memory backend for tests and for platforms without persistence.
///
/// An optional quota (in bytes of key + value text) makes writes fail the
/// way a full browser store does.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
    disabled: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that rejects writes pushing it past `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        MemoryBackend {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Makes every operation fail, like storage disabled by the user.
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    fn check_enabled(&self) -> StorageResult<()> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("storage is disabled".to_string()));
        }
        Ok(())
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.check_enabled()?;
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check_enabled()?;
        let mut entries = lock(&self.entries)?;

        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.check_enabled()?;
        lock(&self.entries)?.remove(key);
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        self.check_enabled()?;
        lock(&self.entries)?.clear();
        Ok(())
    }
}

// =============================================================================
// File Backend
// =============================================================================

/// Backend persisting every slot into one JSON object on disk.
///
/// ## Layout
/// ```text
/// <data_dir>/storage.json
/// {
///   "hyperlocal_auth_token": "\"eyJhbGciOi...\"",
///   "hyperlocal_location": "{\"latitude\":12.97,\"longitude\":77.59}"
/// }
/// ```
///
/// Writes go to a sibling temp file that is then renamed over the original,
/// so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileBackend {
    /// Opens (or lazily creates) the store at `path`.
    ///
    /// A missing file is an empty store. A corrupt file is logged and
    /// treated as empty; it is overwritten on the next write.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();

        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    warn!(?path, error = %e, "Storage file is corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "Storage file not found, starting empty");
                HashMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(FileBackend {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Opens the store in the platform data directory.
    pub fn open_default() -> StorageResult<Self> {
        let path = Self::default_location()
            .ok_or_else(|| StorageError::Unavailable("no data directory available".to_string()))?;
        Self::open(path)
    }

    /// Platform data directory path of the store file.
    ///
    /// - **Linux**: `~/.local/share/marketplace/storage.json`
    /// - **macOS**: `~/Library/Application Support/com.hyperlocal.marketplace/storage.json`
    /// - **Windows**: `%APPDATA%\hyperlocal\marketplace\data\storage.json`
    pub fn default_location() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "hyperlocal", "marketplace")
            .map(|dirs| dirs.data_dir().join("storage.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `change` to a copy of the map, persists it, and only then
    /// makes it visible.
    fn mutate(&self, change: impl FnOnce(&mut HashMap<String, String>)) -> StorageResult<()> {
        let mut entries = lock(&self.entries)?;
        let mut next = entries.clone();
        change(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn persist(&self, entries: &HashMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    /// The slot leaves the in-memory map even when the file cannot be
    /// rewritten, so a removed value is never read back.
    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let mut entries = lock(&self.entries)?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&entries)
    }

    fn clear(&self) -> StorageResult<()> {
        self.mutate(HashMap::clear)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_basic_ops() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get_item("k").unwrap(), None);

        backend.set_item("k", "v").unwrap();
        assert_eq!(backend.get_item("k").unwrap().as_deref(), Some("v"));

        backend.remove_item("k").unwrap();
        backend.remove_item("k").unwrap();
        assert_eq!(backend.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_memory_backend_quota() {
        let backend = MemoryBackend::with_quota(10);
        backend.set_item("a", "1234").unwrap();

        let err = backend.set_item("b", "123456789").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded));

        // Replacing an existing value only counts the new size
        backend.set_item("a", "12345678").unwrap();
    }

    #[test]
    fn test_memory_backend_disabled() {
        let backend = MemoryBackend::new();
        backend.set_disabled(true);
        assert!(backend.set_item("k", "v").is_err());
        assert!(backend.get_item("k").is_err());
    }

    #[test]
    fn test_file_backend_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let backend = FileBackend::open(&path).unwrap();
        backend.set_item("token", "\"abc\"").unwrap();
        backend.set_item("theme", "\"dark\"").unwrap();
        backend.remove_item("theme").unwrap();
        drop(backend);

        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.get_item("token").unwrap().as_deref(), Some("\"abc\""));
        assert_eq!(reopened.get_item("theme").unwrap(), None);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_backend_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.get_item("anything").unwrap(), None);

        backend.set_item("k", "v").unwrap();
        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.get_item("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_file_backend_remove_drops_entry_when_disk_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let backend = FileBackend::open(&path).unwrap();
        backend.set_item("k", "v").unwrap();
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();

        assert!(backend.set_item("k", "w").is_err());
        assert_eq!(backend.get_item("k").unwrap().as_deref(), Some("v"));

        assert!(backend.remove_item("k").is_err());
        assert_eq!(backend.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_file_backend_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let backend = FileBackend::open(&path).unwrap();
        backend.set_item("a", "1").unwrap();
        backend.clear().unwrap();

        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.get_item("a").unwrap(), None);
    }
}
