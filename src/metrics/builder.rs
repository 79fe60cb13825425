use chrono::{DateTime, Utc};
use std::fmt;

use super::fanout::{fanout, FanoutPolicy, InstanceContext};
use super::record::{MetricRecord, Reading};

/// Accumulates the records of one run
#[derive(Debug, Clone)]
pub struct MetricBuilder {
    context: InstanceContext,
    policy: FanoutPolicy,
    timestamp: DateTime<Utc>,
    records: Vec<MetricRecord>,
}

impl MetricBuilder {
    /// All records of the run share `timestamp`
    pub fn new(context: InstanceContext, policy: FanoutPolicy, timestamp: DateTime<Utc>) -> Self {
        Self {
            context,
            policy,
            timestamp,
            records: Vec::new(),
        }
    }

    pub fn context(&self) -> &InstanceContext {
        &self.context
    }

    /// Fan a reading out and append the resulting records
    pub fn add_reading(&mut self, reading: &Reading) -> &[MetricRecord] {
        let start = self.records.len();
        let expanded = fanout(reading, &self.policy, &self.context, self.timestamp);
        self.records.extend(expanded);
        &self.records[start..]
    }

    pub fn add_readings<'a>(&mut self, readings: impl IntoIterator<Item = &'a Reading>) {
        for reading in readings {
            self.add_reading(reading);
        }
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<MetricRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Request dump shown with --verbose, one record per line
impl fmt::Display for MetricBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "{record}")?;
        }
        Ok(())
    }
}
