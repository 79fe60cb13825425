//! Dimension fanout.
//!
//! A [`FanoutPolicy`] is an ordered list of [`DimensionRule`]s. Every rule
//! turns one reading into one record carrying the reading's mount dimensions
//! plus the rule's own dimensions. New aggregation axes are new rules.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::record::{
    Dimensions, MetricRecord, Reading, AUTO_SCALING_GROUP_NAME, IMAGE_ID, INSTANCE_ID,
    INSTANCE_TYPE,
};

/// How an optional aggregation is requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanoutMode {
    /// Publish the aggregated variants next to the per-instance metrics
    Additional,
    /// Publish only the aggregated variants
    Only,
}

/// Identity of the instance the readings come from
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceContext {
    pub instance_id: String,
    pub instance_type: String,
    pub image_id: String,
    pub autoscaling_group: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionRule {
    /// Per-instance series
    Instance,
    /// Per Auto Scaling group series
    AutoScalingGroup,
    /// All instances of the same type
    InstanceType,
    /// All instances started from the same image
    ImageId,
    /// Undimensioned, fleet-wide series
    FleetWide,
}

impl DimensionRule {
    /// Dimensions this rule adds, or `None` when the context cannot satisfy it
    pub fn dimensions(&self, context: &InstanceContext) -> Option<Dimensions> {
        let pair = |key: &str, value: &str| {
            let mut dims = Dimensions::new();
            dims.insert(key.to_string(), value.to_string());
            dims
        };

        match self {
            DimensionRule::Instance => Some(pair(INSTANCE_ID, &context.instance_id)),
            DimensionRule::AutoScalingGroup => context
                .autoscaling_group
                .as_deref()
                .map(|group| pair(AUTO_SCALING_GROUP_NAME, group)),
            DimensionRule::InstanceType => Some(pair(INSTANCE_TYPE, &context.instance_type)),
            DimensionRule::ImageId => Some(pair(IMAGE_ID, &context.image_id)),
            DimensionRule::FleetWide => Some(Dimensions::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FanoutPolicy {
    rules: Vec<DimensionRule>,
}

impl Default for FanoutPolicy {
    fn default() -> Self {
        Self::from_flags(None, None)
    }
}

impl FanoutPolicy {
    pub fn new(rules: Vec<DimensionRule>) -> Self {
        Self { rules }
    }

    /// Build the rule list from the `--aggregated` and `--auto-scaling` flags.
    ///
    /// The per-instance rule is dropped only by `--aggregated only`; both
    /// Auto Scaling modes add the group rule next to whatever else applies.
    pub fn from_flags(aggregated: Option<FanoutMode>, auto_scaling: Option<FanoutMode>) -> Self {
        let mut rules = Vec::new();

        if aggregated != Some(FanoutMode::Only) {
            rules.push(DimensionRule::Instance);
        }

        if auto_scaling.is_some() {
            rules.push(DimensionRule::AutoScalingGroup);
        }

        if aggregated.is_some() {
            rules.extend([
                DimensionRule::InstanceType,
                DimensionRule::ImageId,
                DimensionRule::FleetWide,
            ]);
        }

        Self { rules }
    }

    pub fn rules(&self) -> &[DimensionRule] {
        &self.rules
    }

    pub fn needs_autoscaling_group(&self) -> bool {
        self.rules.contains(&DimensionRule::AutoScalingGroup)
    }
}

/// Expand one reading into one record per applicable rule, in rule order
pub fn fanout(
    reading: &Reading,
    policy: &FanoutPolicy,
    context: &InstanceContext,
    timestamp: DateTime<Utc>,
) -> Vec<MetricRecord> {
    let common = reading.common_dimensions();

    policy
        .rules()
        .iter()
        .filter_map(|rule| rule.dimensions(context))
        .map(|extra| {
            let mut dimensions = common.clone();
            dimensions.extend(extra);
            MetricRecord {
                name: reading.name.clone(),
                unit: reading.unit.clone(),
                value: reading.value,
                dimensions,
                timestamp,
            }
        })
        .collect()
}
