use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

pub const INSTANCE_ID: &str = "InstanceId";
pub const INSTANCE_TYPE: &str = "InstanceType";
pub const IMAGE_ID: &str = "ImageId";
pub const AUTO_SCALING_GROUP_NAME: &str = "AutoScalingGroupName";
pub const MOUNT_PATH: &str = "MountPath";
pub const FILESYSTEM: &str = "Filesystem";

pub const PERCENT: &str = "Percent";

/// Dimension key to value. Ordered so output is deterministic.
pub type Dimensions = BTreeMap<String, String>;

/// Mount a disk reading belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct MountContext {
    pub mount_path: String,
    pub filesystem: String,
}

/// A single named measurement before dimension fanout
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub name: String,
    pub unit: Option<String>,
    pub value: f64,
    pub mount: Option<MountContext>,
}

impl Reading {
    pub fn new(name: impl Into<String>, unit: Option<&str>, value: f64) -> Self {
        Self {
            name: name.into(),
            unit: unit.map(str::to_string),
            value,
            mount: None,
        }
    }

    pub fn percent(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, Some(PERCENT), value)
    }

    pub fn with_mount(mut self, mount_path: &str, filesystem: &str) -> Self {
        self.mount = Some(MountContext {
            mount_path: mount_path.to_string(),
            filesystem: filesystem.to_string(),
        });
        self
    }

    /// Dimensions every record of this reading carries
    pub fn common_dimensions(&self) -> Dimensions {
        let mut dims = Dimensions::new();
        if let Some(mount) = &self.mount {
            if !mount.mount_path.is_empty() {
                dims.insert(MOUNT_PATH.to_string(), mount.mount_path.clone());
            }
            if !mount.filesystem.is_empty() {
                dims.insert(FILESYSTEM.to_string(), mount.filesystem.clone());
            }
        }
        dims
    }
}

/// A fully dimensioned, publishable data point
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub name: String,
    pub unit: Option<String>,
    pub value: f64,
    pub dimensions: Dimensions,
    pub timestamp: DateTime<Utc>,
}

impl MetricRecord {
    pub fn has_dimension(&self, key: &str) -> bool {
        self.dimensions.contains_key(key)
    }
}

impl fmt::Display for MetricRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims = self
            .dimensions
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "{}: {} {} ({{{}}})",
            self.name,
            self.value,
            self.unit.as_deref().unwrap_or("None"),
            dims
        )
    }
}
