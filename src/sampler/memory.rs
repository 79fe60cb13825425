use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

use super::{read_host_file, SampleError};

pub const MEMINFO_PATH: &str = "/proc/meminfo";

static MEMINFO_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<key>\S*):\s*(?P<value>\d*)\s*kB").expect("valid meminfo pattern"));

/// Memory and swap counters in bytes
#[derive(Debug, Clone, PartialEq)]
pub struct MemData {
    pub mem_total: u64,
    pub mem_free: u64,
    pub mem_cached: u64,
    pub mem_buffers: u64,
    pub swap_total: u64,
    pub swap_free: u64,
    /// Count cached and buffered memory as used
    pub used_incl_cache_buff: bool,
}

impl MemData {
    pub fn read(used_incl_cache_buff: bool) -> Result<Self, SampleError> {
        Self::read_from(Path::new(MEMINFO_PATH), used_incl_cache_buff)
    }

    pub fn read_from(path: &Path, used_incl_cache_buff: bool) -> Result<Self, SampleError> {
        let content = read_host_file(path)?;
        Self::parse(&content, used_incl_cache_buff)
    }

    /// Parse `/proc/meminfo` content. Values are reported in kB.
    pub fn parse(content: &str, used_incl_cache_buff: bool) -> Result<Self, SampleError> {
        let mut info = HashMap::new();
        for line in content.lines() {
            if let Some(caps) = MEMINFO_LINE.captures(line) {
                let key = caps["key"].to_string();
                let raw = &caps["value"];
                let kb = raw.parse::<u64>().map_err(|_| SampleError::InvalidValue {
                    key: key.clone(),
                    value: raw.to_string(),
                })?;
                info.insert(key, kb * 1024);
            }
        }

        let field = |key: &str| {
            info.get(key).copied().ok_or_else(|| SampleError::MissingField {
                key: key.to_string(),
                origin: MEMINFO_PATH.to_string(),
            })
        };

        let data = Self {
            mem_total: field("MemTotal")?,
            mem_free: field("MemFree")?,
            mem_cached: field("Cached")?,
            mem_buffers: field("Buffers")?,
            swap_total: field("SwapTotal")?,
            swap_free: field("SwapFree")?,
            used_incl_cache_buff,
        };

        if data.mem_total == 0 {
            return Err(SampleError::ZeroMemory);
        }

        Ok(data)
    }

    pub fn mem_avail(&self) -> u64 {
        if self.used_incl_cache_buff {
            self.mem_free
        } else {
            self.mem_free + self.mem_cached + self.mem_buffers
        }
    }

    pub fn mem_used(&self) -> u64 {
        self.mem_total.saturating_sub(self.mem_avail())
    }

    pub fn mem_util(&self) -> f64 {
        100.0 * self.mem_used() as f64 / self.mem_total as f64
    }

    pub fn swap_used(&self) -> u64 {
        self.swap_total.saturating_sub(self.swap_free)
    }

    pub fn swap_util(&self) -> f64 {
        if self.swap_total == 0 {
            return 0.0;
        }
        100.0 * self.swap_used() as f64 / self.swap_total as f64
    }
}
