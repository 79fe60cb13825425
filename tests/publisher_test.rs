mod common;

use chrono::Utc;

use cloudwatchmon::metrics::{FanoutMode, FanoutPolicy, MetricBuilder, Reading};
use cloudwatchmon::publisher::{publish, PublishError, MAX_BATCH_SIZE};

use common::{sample_context, RecordingMetricsService};

fn builder_with(readings: usize, policy: FanoutPolicy) -> MetricBuilder {
    let mut builder = MetricBuilder::new(sample_context(Some("web-asg")), policy, Utc::now());
    for index in 0..readings {
        builder.add_reading(&Reading::percent(format!("Metric{index}"), index as f64));
    }
    builder
}

#[tokio::test]
async fn test_batches_keep_record_order() {
    let builder = builder_with(45, FanoutPolicy::default());
    let service = RecordingMetricsService::default();

    let sent = publish(&service, "System/Linux", builder.records()).await.unwrap();

    assert_eq!(sent, 3);
    assert_eq!(service.batch_sizes(), [20, 20, 5]);
    let published: Vec<String> = service
        .batches
        .lock()
        .unwrap()
        .iter()
        .flatten()
        .map(|r| r.name.clone())
        .collect();
    let expected: Vec<String> = builder.records().iter().map(|r| r.name.clone()).collect();
    assert_eq!(published, expected);
}

#[tokio::test]
async fn test_fanout_multiplies_batches() {
    // 10 readings x 5 dimension sets
    let policy = FanoutPolicy::from_flags(Some(FanoutMode::Additional), Some(FanoutMode::Additional));
    let builder = builder_with(10, policy);
    let service = RecordingMetricsService::default();

    publish(&service, "System/Linux", builder.records()).await.unwrap();

    assert_eq!(builder.len(), 50);
    assert_eq!(service.batch_sizes(), [20, 20, 10]);
    assert!(service.batch_sizes().iter().all(|size| *size <= MAX_BATCH_SIZE));
}

#[tokio::test]
async fn test_rejection_stops_remaining_batches() {
    let builder = builder_with(70, FanoutPolicy::default());
    let service = RecordingMetricsService {
        reject_batch: Some(2),
        ..Default::default()
    };

    let err = publish(&service, "System/Linux", builder.records()).await.unwrap_err();

    assert!(matches!(err, PublishError::Rejected { batch: 2 }));
    assert_eq!(service.batch_sizes(), [20, 20]);
}

#[tokio::test]
async fn test_exact_batch_boundary() {
    let builder = builder_with(40, FanoutPolicy::default());
    let service = RecordingMetricsService::default();

    assert_eq!(publish(&service, "ns", builder.records()).await.unwrap(), 2);
    assert_eq!(service.batch_sizes(), [20, 20]);
}
