use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{CacheEntry, CacheError, CacheKey, CacheStore};

/// Process-local cache backend
#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: fn() -> DateTime<Utc>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of stored entries, fresh or stale
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        let entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        let now = (self.clock)();
        Ok(entries
            .get(&key.to_string())
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value.clone()))
    }

    fn put(&self, key: &CacheKey, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        entries.insert(key.to_string(), CacheEntry::new(value.clone(), (self.clock)(), ttl));
        Ok(())
    }
}
