//! Short-lived read-through cache for upstream payloads.
//!
//! Entries are stored as `{data, timestamp}` JSON envelopes so the same
//! representation works for the SQLite store and the in-memory fallback.
//! A read is a plain miss when the entry is absent, older than the TTL, or
//! no longer decodes; the caller never learns which.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::db::Database;

/// Backing store for cache envelopes.
pub trait CacheStore: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn store(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Process-local store used when no persistent store is available.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl CacheStore for MemoryStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory cache lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct CacheEntry<T> {
    data: T,
    timestamp: i64,
}

/// Get/set cache with a fixed time-to-live.
#[derive(Clone)]
pub struct ExpiringCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ExpiringCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self::with_clock(store, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn CacheStore>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        ExpiringCache { store, clock, ttl }
    }

    pub fn memory_only(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryStore::default()), ttl)
    }

    /// Open the SQLite-backed cache at `path`, degrading to memory-only when
    /// the database cannot be opened.
    pub fn open(path: &str, ttl: Duration) -> Self {
        match Database::open(path) {
            Ok(db) => {
                if let Ok(n) = db.count_cache_entries() {
                    info!("Cache database {} holds {} entries", path, n);
                }
                Self::new(Arc::new(db), ttl)
            }
            Err(e) => {
                warn!("Cache database {} unavailable ({}); caching in memory only", path, e);
                Self::memory_only(ttl)
            }
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.load(key)?;
        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(e) => e,
            Err(e) => {
                debug!("Cache entry {} unreadable, treating as miss: {}", key, e);
                return None;
            }
        };
        let age_ms = self.clock.now_millis() - entry.timestamp;
        if age_ms < self.ttl.as_millis() as i64 {
            debug!("Cache hit: {} (age {} ms)", key, age_ms);
            Some(entry.data)
        } else {
            None
        }
    }

    /// Overwrite `key` with `data` stamped with the current time. Storage
    /// failures are logged and otherwise ignored.
    pub fn set<T: Serialize>(&self, key: &str, data: &T) {
        let entry = CacheEntry {
            data,
            timestamp: self.clock.now_millis(),
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(r) => r,
            Err(e) => {
                debug!("Cache entry {} not serializable: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.store.store(key, &raw) {
            debug!("Cache write for {} dropped: {}", key, e);
        }
    }
}
