//! File-backed key-value store for sponsor data
//!
//! The store is a single JSON object on disk. Sponsor data and its timestamp live
//! under a fixed key pair; a third key holds a short rolling debug log. Every
//! write replaces the whole file through a uniquely named temporary sibling and
//! a rename, so readers never see a partial file.

use crate::error::{PromoScreenError, Result};
use crate::slides::SlideItem;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;

pub const CACHE_KEY: &str = "mdy_sponsor_data";
pub const CACHE_TIMESTAMP_KEY: &str = "mdy_sponsor_data_timestamp";
pub const DEBUG_KEY: &str = "mdy_sponsor_debug";

/// Cached data stays fresh for one hour
pub const CACHE_DURATION_MS: i64 = 60 * 60 * 1000;

/// Debug entries kept on disk
pub const MAX_DEBUG_ENTRIES: usize = 20;

/// Sponsor data as last persisted, with its epoch-millisecond timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub data: Vec<SlideItem>,
    pub timestamp: Option<i64>,
}

impl CacheRecord {
    /// Fresh means stamped less than [`CACHE_DURATION_MS`] before `now_ms`
    #[must_use]
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        self.timestamp
            .is_some_and(|timestamp| now_ms - timestamp < CACHE_DURATION_MS)
    }
}

/// One step of a sponsor resolution, as recorded for inspection
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DebugEntry {
    /// RFC 3339 time of the step
    pub timestamp: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Handle to the on-disk store.
///
/// Clones share one write lock, so read-modify-write updates made through any
/// clone never interleave.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached sponsor data, if any.
    ///
    /// A missing or corrupt store reads as "no cache".
    #[must_use]
    pub fn load(&self) -> Option<CacheRecord> {
        let entries = self.read_entries().ok()?;
        let data = entries.get(CACHE_KEY)?.clone();
        let data: Vec<SlideItem> = match serde_json::from_value(data) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Ignoring unreadable sponsor cache: {e}");
                return None;
            }
        };
        let timestamp = entries.get(CACHE_TIMESTAMP_KEY).and_then(read_timestamp);
        Some(CacheRecord { data, timestamp })
    }

    /// Persist `data` stamped with `now_ms`
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be serialized or written
    pub fn save(&self, data: &[SlideItem], now_ms: i64) -> Result<()> {
        let _guard = self.lock()?;
        let mut entries = self.read_entries().unwrap_or_default();
        entries.insert(CACHE_KEY.to_string(), serde_json::to_value(data)?);
        entries.insert(CACHE_TIMESTAMP_KEY.to_string(), Value::from(now_ms));
        self.write_entries(&entries)?;
        tracing::debug!("Saved {} sponsor items to {}", data.len(), self.path.display());
        Ok(())
    }

    /// Remove the cached data, its timestamp and the debug log
    ///
    /// # Errors
    ///
    /// Returns an error if the store exists but cannot be rewritten
    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock()?;
        let Ok(mut entries) = self.read_entries() else {
            return Ok(());
        };
        for key in [CACHE_KEY, CACHE_TIMESTAMP_KEY, DEBUG_KEY] {
            entries.remove(key);
        }
        self.write_entries(&entries)
    }

    /// Persisted debug entries, oldest first
    #[must_use]
    pub fn debug_log(&self) -> Vec<DebugEntry> {
        self.read_entries()
            .ok()
            .and_then(|mut entries| entries.remove(DEBUG_KEY))
            .and_then(|log| serde_json::from_value(log).ok())
            .unwrap_or_default()
    }

    /// Append entries to the debug log, keeping the last [`MAX_DEBUG_ENTRIES`]
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written
    pub fn append_debug(&self, new_entries: &[DebugEntry]) -> Result<()> {
        if new_entries.is_empty() {
            return Ok(());
        }
        let _guard = self.lock()?;
        let mut log = self.debug_log();
        log.extend_from_slice(new_entries);
        if log.len() > MAX_DEBUG_ENTRIES {
            log.drain(..log.len() - MAX_DEBUG_ENTRIES);
        }
        let mut entries = self.read_entries().unwrap_or_default();
        entries.insert(DEBUG_KEY.to_string(), serde_json::to_value(log)?);
        self.write_entries(&entries)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| PromoScreenError::from("Cache store lock poisoned"))
    }

    fn read_entries(&self) -> Result<Map<String, Value>> {
        let raw = fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(entries) => Ok(entries),
            _ => Err(PromoScreenError::from("Cache store is not a JSON object")),
        }
    }

    /// Callers hold the write lock
    fn write_entries(&self, entries: &Map<String, Value>) -> Result<()> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(entries)?)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Timestamps may be stored as numbers or as numeric strings
fn read_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Vec<SlideItem> {
        vec![SlideItem::new("/images/1.png", "Cached 1", "Content 1")]
    }

    #[test]
    fn test_missing_store_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache.json"));
        assert!(store.load().is_none());
        assert!(store.debug_log().is_empty());
        assert!(store.clear().is_ok());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("nested").join("cache.json"));
        store.save(&sample(), 1_000).unwrap();

        let record = store.load().unwrap();
        assert_eq!(record.data, sample());
        assert_eq!(record.timestamp, Some(1_000));
    }

    #[test]
    fn test_validity_window() {
        let record = CacheRecord {
            data: sample(),
            timestamp: Some(0),
        };
        assert!(record.is_valid_at(CACHE_DURATION_MS - 1));
        assert!(!record.is_valid_at(CACHE_DURATION_MS));

        let unstamped = CacheRecord {
            data: sample(),
            timestamp: None,
        };
        assert!(!unstamped.is_valid_at(0));
    }

    #[test]
    fn test_string_timestamp_accepted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(
            &path,
            r#"{"mdy_sponsor_data":[{"imageUrl":"/a.png","title":"T","html":"H"}],"mdy_sponsor_data_timestamp":"1700000000000"}"#,
        )
        .unwrap();
        let record = CacheStore::new(path).load().unwrap();
        assert_eq!(record.timestamp, Some(1_700_000_000_000));
    }

    #[test]
    fn test_corrupt_store_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();
        let store = CacheStore::new(path);
        assert!(store.load().is_none());

        // A corrupt store is replaced on the next save
        store.save(&sample(), 5).unwrap();
        assert_eq!(store.load().map(|r| r.data), Some(sample()));
    }

    #[test]
    fn test_clear_removes_all_keys() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache.json"));
        store.save(&sample(), 5).unwrap();
        store
            .append_debug(&[DebugEntry {
                timestamp: "2026-01-01T00:00:00Z".to_string(),
                message: "hello".to_string(),
                data: None,
            }])
            .unwrap();

        store.clear().unwrap();
        assert!(store.load().is_none());
        assert!(store.debug_log().is_empty());
    }

    #[test]
    fn test_concurrent_writers_do_not_clobber() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache.json"));

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.save(&sample(), worker * 1_000 + i).unwrap();
                        store
                            .append_debug(&[DebugEntry {
                                timestamp: format!("w{worker}-{i}"),
                                message: "saved".to_string(),
                                data: None,
                            }])
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let record = store.load().unwrap();
        assert_eq!(record.data, sample());
        assert!(record.timestamp.is_some());
        assert_eq!(store.debug_log().len(), MAX_DEBUG_ENTRIES);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name != "cache.json")
            .collect();
        assert!(leftovers.is_empty(), "stray temp files: {leftovers:?}");
    }

    #[test]
    fn test_debug_log_is_capped() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache.json"));
        let entries: Vec<DebugEntry> = (0..25)
            .map(|i| DebugEntry {
                timestamp: format!("t{i}"),
                message: format!("step {i}"),
                data: None,
            })
            .collect();
        store.append_debug(&entries).unwrap();

        let log = store.debug_log();
        assert_eq!(log.len(), MAX_DEBUG_ENTRIES);
        assert_eq!(log[0].message, "step 5");
        assert_eq!(log[MAX_DEBUG_ENTRIES - 1].message, "step 24");
    }
}
