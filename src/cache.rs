// Durable key-value mirror of the tracked list and settings.
//
// ⚠️ VERSION BUMP REQUIRED:
// Changing the meaning of an existing key requires incrementing CACHE_VERSION
// so stale caches are discarded instead of misread.
use crate::context::AppContext;
use crate::storage::LocalStorage;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Serialized `Vec<String>` of tracked series, in insertion order.
pub const KEY_SERIES: &str = "series";
/// RFC 3339 timestamp of the last successful status check.
pub const KEY_LAST_CHECKED: &str = "last_checked_at";
/// `"true"` / `"false"`.
pub const KEY_NOTIF_ENABLED: &str = "notif_enabled";
/// RFC 3339 timestamp of the next armed weekly check. Informational only.
pub const KEY_NEXT_DUE: &str = "next_due_at";

const CACHE_VERSION: u32 = 1;

/// Synchronous key-value store that is assumed to always be available.
///
/// A failing `set` means the installation cannot guarantee durability at
/// all; callers treat it as fatal for the operation in progress.
pub trait LocalCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Serialize, Deserialize, Default)]
struct CacheFile {
    // If this field is missing in the JSON (old cache), it defaults to 0.
    #[serde(default)]
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// File-backed cache: a single versioned JSON map written atomically under
/// an exclusive lock.
#[derive(Debug)]
pub struct DiskCache {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process; the file lock
    // covers other processes.
    write_guard: Mutex<()>,
}

impl DiskCache {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_guard: Mutex::new(()),
        }
    }

    pub fn open(ctx: &dyn AppContext) -> Result<Self> {
        Ok(Self::new(ctx.get_cache_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(path: &Path) -> CacheFile {
        if !path.exists() {
            return CacheFile::default();
        }
        match fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|json| Ok(serde_json::from_str::<CacheFile>(&json)?))
        {
            Ok(file) if file.version == CACHE_VERSION => file,
            Ok(file) => {
                log::warn!(
                    "Discarding cache {} with version {} (expected {})",
                    path.display(),
                    file.version,
                    CACHE_VERSION
                );
                CacheFile::default()
            }
            Err(e) => {
                log::warn!("Unreadable cache {}: {}", path.display(), e);
                CacheFile::default()
            }
        }
    }
}

impl LocalCache for DiskCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        LocalStorage::with_lock(&self.path, || {
            Ok(Self::read_file(&self.path).entries.get(key).cloned())
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self
            .write_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        LocalStorage::with_lock(&self.path, || {
            let mut file = Self::read_file(&self.path);
            file.version = CACHE_VERSION;
            file.entries.insert(key.to_string(), value.to_string());
            let json = serde_json::to_string_pretty(&file)?;
            LocalStorage::atomic_write(&self.path, json)?;
            Ok(())
        })
    }
}

/// In-memory cache used by tests and by callers that want a throwaway store.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
