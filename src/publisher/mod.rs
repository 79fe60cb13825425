//! Batched metric publishing and statistics queries

pub mod stats;

pub use stats::{format_summary, query, reduce, StatSummary};

use tracing::{debug, info};

use crate::aws::{AwsError, MetricsService};
use crate::metrics::MetricRecord;

/// Upper bound on records per PutMetricData call
pub const MAX_BATCH_SIZE: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Could not send data to CloudWatch - use --verbose for more information")]
    Rejected { batch: usize },

    #[error(transparent)]
    Service(#[from] AwsError),
}

/// Send `records` in order, at most `MAX_BATCH_SIZE` per call. The first
/// rejected batch aborts the run; earlier batches stay published.
pub async fn publish(
    service: &dyn MetricsService,
    namespace: &str,
    records: &[MetricRecord],
) -> Result<usize, PublishError> {
    let mut sent = 0;

    for (index, batch) in records.chunks(MAX_BATCH_SIZE).enumerate() {
        debug!("Sending batch {} with {} records to {}", index + 1, batch.len(), namespace);
        if !service.put_metric_data(namespace, batch).await? {
            return Err(PublishError::Rejected { batch: index + 1 });
        }
        sent += 1;
    }

    info!("Published {} records in {} batches", records.len(), sent);
    Ok(sent)
}
