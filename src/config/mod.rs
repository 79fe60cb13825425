use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::fs;
use std::time::Duration;
use anyhow::{Result, Context};
use directories::ProjectDirs;
use tracing::{debug, warn};

/// Environment variable overriding the cache directory
pub const CACHE_DIR_ENV: &str = "AWS_EC2CW_META_DATA";
/// Environment variable overriding the cache TTL in seconds
pub const CACHE_TTL_ENV: &str = "AWS_EC2CW_META_DATA_TTL";

/// Client name of the writer tool
pub const PUT_CLIENT_NAME: &str = "CloudWatch-PutInstanceData";
/// Client name of the reader tool
pub const GET_CLIENT_NAME: &str = "CloudWatch-GetInstanceStats";

/// Namespace the writer publishes into
pub const DEFAULT_NAMESPACE: &str = "System/Linux";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tool identity, threaded into cache keys and log output.
    /// Never read from the config file.
    #[serde(skip)]
    pub client_name: String,
    pub namespace: String,
    pub cache: CacheConfig,
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/tmp/aws-mon"),
            ttl_secs: 21600, // six hours
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_name: PUT_CLIENT_NAME.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            cache: CacheConfig::default(),
            http_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Get the configuration file path, if a home directory can be determined
    pub fn config_file_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "cloudwatchmon", "cloudwatchmon")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration for a tool: defaults, then the config file, then the environment
    pub fn load(client_name: &str) -> Result<Self> {
        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.client_name = client_name.to_string();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a config file. A malformed file falls back to defaults.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        match toml::from_str::<Config>(&content) {
            Ok(config) => {
                debug!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Failed to parse config file {} ({}). Using defaults.", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    /// Apply environment overrides using the given lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(CACHE_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.cache.dir = PathBuf::from(dir);
            }
        }

        if let Some(ttl) = lookup(CACHE_TTL_ENV) {
            self.cache.ttl_secs = ttl.trim().parse::<u64>()
                .with_context(|| format!("Invalid {CACHE_TTL_ENV} value: '{ttl}'. Must be a number of seconds"))?;
        }

        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
