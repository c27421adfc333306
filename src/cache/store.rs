//! Cache store for persisting catalog lookups to disk
//!
//! Each endpoint gets its own table, stored as a JSON array of entries in
//! `<cache_dir>/<endpoint>.json`. Entries are keyed by `IndexKey` and carry
//! the time they were written, so freshness is decided at read time.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use fd_lock::RwLock as FileLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::catalog::IndexKey;

/// A cached lookup result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Identifier the payload was fetched for
    pub index_key: IndexKey,
    /// When the entry was last written
    pub cache_datetime: DateTime<Utc>,
    /// Response body as returned by the remote endpoint
    pub payload: Value,
}

/// Errors that can occur when reading or writing a cache table
#[derive(Debug, Error)]
pub enum CacheError {
    /// Endpoint name cannot be used as a table file name
    #[error("Invalid cache table name: '{0}'")]
    InvalidTable(String),

    /// Filesystem operation failed
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Table file exists but does not hold a list of entries
    #[error("Corrupt cache table {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Table could not be serialized
    #[error("Failed to serialize cache table: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Manages the per-endpoint cache tables
///
/// Clones share the same in-process table locks. Writes additionally hold an
/// advisory lock on a `<endpoint>.lock` file next to the table, so separate
/// stores and separate processes on one directory never lose each other's
/// entries.
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Directory where table files are stored
    cache_dir: PathBuf,
    /// One lock per table name
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl CacheStore {
    /// Creates a CacheStore in the XDG cache directory (`~/.cache/crestcheck/` on Linux)
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "crestcheck")?;
        Some(Self::with_dir(project_dirs.cache_dir().to_path_buf()))
    }

    /// Creates a CacheStore rooted at `cache_dir`
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Directory holding the table files
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path of the table file for `endpoint`
    pub fn table_path(&self, endpoint: &str) -> Result<PathBuf, CacheError> {
        if endpoint.is_empty()
            || endpoint.starts_with('.')
            || endpoint.contains(['/', '\\'])
        {
            return Err(CacheError::InvalidTable(endpoint.to_string()));
        }
        Ok(self.cache_dir.join(format!("{}.json", endpoint)))
    }

    fn lock_path(&self, endpoint: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.lock", endpoint))
    }

    /// Looks up a fresh entry for `index_key`
    ///
    /// Returns the entry only if its key matches and it was written after
    /// `freshness_cutoff`. A missing table, missing key or stale entry is
    /// `None`; so is a table that cannot be read, which is logged.
    pub fn find(
        &self,
        endpoint: &str,
        index_key: &IndexKey,
        freshness_cutoff: DateTime<Utc>,
    ) -> Option<CacheEntry> {
        match self.try_find(endpoint, index_key, freshness_cutoff) {
            Ok(entry) => entry,
            Err(err) => {
                error!(
                    endpoint,
                    cache_dir = %self.cache_dir.display(),
                    error = %err,
                    "unable to read local cache, treating as miss"
                );
                None
            }
        }
    }

    /// Same as `find`, but reports table errors instead of logging them
    pub fn try_find(
        &self,
        endpoint: &str,
        index_key: &IndexKey,
        freshness_cutoff: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.table_path(endpoint)?;
        let lock = self.table_lock(endpoint);
        let _guard = acquire(&lock);

        let entries = load_table(&path)?;
        Ok(entries
            .into_iter()
            .find(|entry| entry.index_key == *index_key && entry.cache_datetime > freshness_cutoff))
    }

    /// Inserts or replaces the entry for `index_key`, stamped with the current time
    pub fn upsert(
        &self,
        endpoint: &str,
        index_key: &IndexKey,
        payload: &Value,
    ) -> Result<(), CacheError> {
        self.upsert_at(endpoint, index_key, payload, Utc::now())
    }

    /// Inserts or replaces the entry for `index_key` with an explicit timestamp
    ///
    /// A table that cannot be parsed is replaced rather than left to fail
    /// every later write.
    pub fn upsert_at(
        &self,
        endpoint: &str,
        index_key: &IndexKey,
        payload: &Value,
        cache_datetime: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let path = self.table_path(endpoint)?;
        let lock = self.table_lock(endpoint);
        let _guard = acquire(&lock);

        fs::create_dir_all(&self.cache_dir)?;
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(self.lock_path(endpoint))?;
        let mut file_lock = FileLock::new(lock_file);
        // held until the new table has been renamed into place
        let _file_guard = file_lock.write()?;

        let mut entries = match load_table(&path) {
            Ok(entries) => entries,
            Err(CacheError::Corrupt { source, .. }) => {
                warn!(endpoint, error = %source, "replacing corrupt cache table");
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        let entry = CacheEntry {
            index_key: index_key.clone(),
            cache_datetime,
            payload: payload.clone(),
        };

        let mut replaced = false;
        entries.retain_mut(|existing| {
            if existing.index_key != *index_key {
                return true;
            }
            if replaced {
                return false;
            }
            *existing = entry.clone();
            replaced = true;
            true
        });
        if !replaced {
            entries.push(entry);
        }

        debug!(endpoint, %index_key, replaced, "writing cache entry");
        self.write_table(&path, &entries)
    }

    /// Returns every entry in the table for `endpoint`, fresh or not
    pub fn entries(&self, endpoint: &str) -> Result<Vec<CacheEntry>, CacheError> {
        let path = self.table_path(endpoint)?;
        let lock = self.table_lock(endpoint);
        let _guard = acquire(&lock);
        load_table(&path)
    }

    fn table_lock(&self, endpoint: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(endpoint.to_string()).or_default().clone()
    }

    /// Writes through a temporary file so readers never see a partial table
    fn write_table(&self, path: &Path, entries: &[CacheEntry]) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(entries).map_err(CacheError::Serialize)?;
        let mut tmp = NamedTempFile::new_in(&self.cache_dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(path).map_err(|e| CacheError::Io(e.error))?;
        Ok(())
    }
}

fn acquire(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|e| e.into_inner())
}

/// Reads a table file; a table that was never written is empty
fn load_table(path: &Path) -> Result<Vec<CacheEntry>, CacheError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&content).map_err(|source| CacheError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}
