//! Shared fakes and fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use cloudwatchmon::aws::{
    AutoScalingService, AwsError, Datapoint, InstanceMetadata, MetadataSource, MetricsService,
    StatisticsRequest,
};
use cloudwatchmon::metrics::{Dimensions, InstanceContext, MetricRecord};

/// Load a fixture from `tests/common/fixtures`
pub fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|_| panic!("Failed to load test fixture: {}", name))
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/common/fixtures")
        .join(name)
}

pub fn sample_metadata() -> InstanceMetadata {
    InstanceMetadata {
        instance_id: "i-0123456789abcdef0".to_string(),
        instance_type: "m5.large".to_string(),
        ami_id: "ami-0abcdef1".to_string(),
        availability_zone: "eu-west-1b".to_string(),
    }
}

pub fn sample_context(autoscaling_group: Option<&str>) -> InstanceContext {
    let metadata = sample_metadata();
    InstanceContext {
        instance_id: metadata.instance_id,
        instance_type: metadata.instance_type,
        image_id: metadata.ami_id,
        autoscaling_group: autoscaling_group.map(str::to_string),
    }
}

pub fn datapoint(average: f64, minimum: f64, maximum: f64) -> Datapoint {
    Datapoint {
        timestamp: None,
        average,
        minimum,
        maximum,
    }
}

/// Metrics service that records every call and answers from canned data
#[derive(Default)]
pub struct RecordingMetricsService {
    /// 1-based batch number to reject
    pub reject_batch: Option<usize>,
    /// Datapoints by metric name
    pub statistics: HashMap<String, Vec<Datapoint>>,
    /// Answer to every list_metrics call
    pub listed: Vec<Dimensions>,
    /// Fail every list_metrics call with a service error
    pub fail_list: bool,
    pub batches: Mutex<Vec<Vec<MetricRecord>>>,
    pub stat_requests: Mutex<Vec<StatisticsRequest>>,
    pub list_requests: Mutex<Vec<(String, String, Dimensions)>>,
}

impl RecordingMetricsService {
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl MetricsService for RecordingMetricsService {
    async fn put_metric_data(&self, _namespace: &str, records: &[MetricRecord]) -> Result<bool, AwsError> {
        let mut batches = self.batches.lock().unwrap();
        batches.push(records.to_vec());
        Ok(self.reject_batch != Some(batches.len()))
    }

    async fn list_metrics(
        &self,
        namespace: &str,
        metric_name: &str,
        dimensions: &Dimensions,
    ) -> Result<Vec<Dimensions>, AwsError> {
        self.list_requests.lock().unwrap().push((
            namespace.to_string(),
            metric_name.to_string(),
            dimensions.clone(),
        ));
        if self.fail_list {
            return Err(AwsError::Status {
                service: "monitoring".to_string(),
                status: 503,
                body: "Service Unavailable".to_string(),
            });
        }
        Ok(self.listed.clone())
    }

    async fn get_metric_statistics(&self, request: &StatisticsRequest) -> Result<Vec<Datapoint>, AwsError> {
        self.stat_requests.lock().unwrap().push(request.clone());
        Ok(self
            .statistics
            .get(&request.metric_name)
            .cloned()
            .unwrap_or_default())
    }
}

/// Metadata source returning a fixed document, counting calls
pub struct StaticMetadataSource {
    pub metadata: Option<InstanceMetadata>,
    pub calls: AtomicUsize,
}

impl StaticMetadataSource {
    pub fn new(metadata: InstanceMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            metadata: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for StaticMetadataSource {
    async fn fetch(&self) -> Result<InstanceMetadata, AwsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.metadata.clone().ok_or_else(|| AwsError::Status {
            service: "instance metadata service".to_string(),
            status: 404,
            body: "not found".to_string(),
        })
    }
}

/// Auto Scaling lookup with a fixed answer
pub struct FakeAutoScaling {
    pub group: Option<String>,
}

#[async_trait]
impl AutoScalingService for FakeAutoScaling {
    async fn group_name(&self, _instance_id: &str) -> Result<String, AwsError> {
        self.group
            .clone()
            .ok_or_else(|| AwsError::NotFound("Could not find auto-scaling information".to_string()))
    }
}
