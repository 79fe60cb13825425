use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::{CacheEntry, CacheError, CacheKey, CacheStore};

/// Cache backend storing one JSON file per entry in a fixed directory.
///
/// Files are owner-only and replaced whole via a temporary file and a
/// rename, so concurrent runs on the same host can only overwrite each other.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    clock: fn() -> DateTime<Utc>,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            clock: Utc::now,
        }
    }

    /// Replace the time source used for staleness checks and write stamps
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn ensure_dir(&self) -> Result<(), CacheError> {
        if self.dir.is_dir() {
            return Ok(());
        }

        fs::create_dir_all(&self.dir).map_err(|e| {
            CacheError::CacheDirectoryError(format!("{}: {}", self.dir.display(), e))
        })?;
        fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700))?;
        debug!("Created cache directory {}", self.dir.display());
        Ok(())
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let entry: CacheEntry = serde_json::from_str(&content)?;

        if entry.is_fresh((self.clock)()) {
            Ok(Some(entry.value))
        } else {
            debug!("Cache entry {} is stale", path.display());
            Ok(None)
        }
    }

    fn put(&self, key: &CacheKey, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        self.ensure_dir()?;

        let entry = CacheEntry::new(value.clone(), (self.clock)(), ttl);
        let payload = serde_json::to_vec(&entry)?;

        let path = self.path_for(key);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", key.file_name(), std::process::id()));

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp)?;
        file.write_all(&payload)?;
        file.flush()?;
        drop(file);

        fs::rename(&tmp, &path)?;
        debug!("Wrote cache entry {}", path.display());
        Ok(())
    }
}
