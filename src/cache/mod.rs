//! Time-bounded cache for expensive lookups.
//!
//! Each tool invocation is a fresh short-lived process, so the cache is the
//! only thing carrying instance metadata and Auto Scaling membership from one
//! run to the next. Entries are addressed by a SHA-256 digest of a versioned
//! signature made of the client name, the producing function and its
//! arguments.

mod file;
mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;
use tracing::{debug, warn};

/// Error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize/deserialize cache entry: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache directory not accessible: {0}")]
    CacheDirectoryError(String),

    #[error("Cache state poisoned by a panicked writer")]
    Poisoned,
}

/// Content address of a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    client_name: String,
    digest: String,
}

impl CacheKey {
    /// Build the key for `function(args...)` as called by `client_name`
    pub fn new(client_name: &str, function: &str, args: &[&str]) -> Self {
        // Debug formatting quotes and escapes each argument, so ("a,b") and ("a", "b") differ
        let args = args
            .iter()
            .map(|arg| format!("{arg:?}"))
            .collect::<Vec<_>>()
            .join(",");
        let signature = format!("{}:{}:({})", crate::VERSION, function, args);
        let digest = hex::encode(Sha256::digest(signature.as_bytes()));

        Self {
            client_name: client_name.to_string(),
            digest,
        }
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// File name used by the file backend
    pub fn file_name(&self) -> String {
        format!("{}-{}.json", self.client_name, self.digest)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.client_name, self.digest)
    }
}

/// Stored form of a cached value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub written_at: DateTime<Utc>,
    pub ttl_ms: u64,
    pub value: Value,
}

impl CacheEntry {
    pub fn new(value: Value, written_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            written_at,
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            value,
        }
    }

    /// Valid iff `now - written_at < ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age_ms = now.timestamp_millis() - self.written_at.timestamp_millis();
        let ttl_ms = i64::try_from(self.ttl_ms).unwrap_or(i64::MAX);
        age_ms < ttl_ms
    }
}

/// Storage backend for cached values
pub trait CacheStore: Send + Sync {
    /// Return the stored value if present and still fresh
    fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError>;

    /// Store a value, replacing any previous entry for the key
    fn put(&self, key: &CacheKey, value: &Value, ttl: Duration) -> Result<(), CacheError>;
}

/// Return the cached value for `key`, or run `producer` and remember its result.
///
/// A producer failure propagates unchanged and nothing is written. Cache
/// trouble (unreadable entry, failed write) only costs a warning.
pub async fn cached<T, F, Fut>(
    store: &dyn CacheStore,
    key: &CacheKey,
    ttl: Duration,
    producer: F,
) -> anyhow::Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    match store.get(key) {
        Ok(Some(value)) => match serde_json::from_value::<T>(value) {
            Ok(hit) => {
                debug!("Cache hit for {}", key);
                return Ok(hit);
            }
            Err(e) => warn!("Ignoring cache entry {} with unexpected shape: {}", key, e),
        },
        Ok(None) => debug!("Cache miss for {}", key),
        Err(e) => warn!("Ignoring unreadable cache entry {}: {}", key, e),
    }

    let value = producer().await?;

    match serde_json::to_value(&value) {
        Ok(json) => {
            if let Err(e) = store.put(key, &json, ttl) {
                warn!("Failed to write cache entry {}: {}", key, e);
            }
        }
        Err(e) => warn!("Failed to serialize value for cache entry {}: {}", key, e),
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_key_is_stable_and_argument_sensitive() {
        let a = CacheKey::new("client", "get_metadata", &[]);
        let b = CacheKey::new("client", "get_metadata", &[]);
        let c = CacheKey::new("client", "get_autoscaling_group_name", &["eu-west-1", "i-1"]);
        let d = CacheKey::new("client", "get_autoscaling_group_name", &["eu-west-1,i-1"]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(c, d);
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn test_key_includes_client_name() {
        let put = CacheKey::new("CloudWatch-PutInstanceData", "get_metadata", &[]);
        let get = CacheKey::new("CloudWatch-GetInstanceStats", "get_metadata", &[]);

        assert_eq!(put.digest(), get.digest());
        assert_ne!(put.file_name(), get.file_name());
        assert!(put.file_name().starts_with("CloudWatch-PutInstanceData-"));
        assert!(put.file_name().ends_with(".json"));
    }

    #[test]
    fn test_entry_freshness_boundary() {
        let written = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entry = CacheEntry::new(Value::Null, written, Duration::from_secs(60));

        assert!(entry.is_fresh(written));
        assert!(entry.is_fresh(written + chrono::Duration::seconds(59)));
        assert!(!entry.is_fresh(written + chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_zero_ttl_is_never_fresh() {
        let now = Utc::now();
        let entry = CacheEntry::new(Value::Null, now, Duration::ZERO);
        assert!(!entry.is_fresh(now));
    }
}
