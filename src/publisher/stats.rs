use chrono::{DateTime, Duration, Utc};

use crate::aws::{AwsError, Datapoint, MetricsService, Statistic, StatisticsRequest};
use crate::metrics::record::INSTANCE_ID;
use crate::metrics::Dimensions;

pub const PERIOD_SECS: u32 = 300;

/// Reduction of a statistics window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatSummary {
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
}

/// Max of maxima, min of minima, unweighted mean of averages
pub fn reduce(points: &[Datapoint]) -> Option<StatSummary> {
    if points.is_empty() {
        return None;
    }

    let maximum = points.iter().map(|p| p.maximum).fold(f64::NEG_INFINITY, f64::max);
    let minimum = points.iter().map(|p| p.minimum).fold(f64::INFINITY, f64::min);
    let average = points.iter().map(|p| p.average).sum::<f64>() / points.len() as f64;

    Some(StatSummary {
        average,
        minimum,
        maximum,
    })
}

/// The indented statistics line of a report section
pub fn format_summary(summary: Option<&StatSummary>) -> String {
    match summary {
        Some(s) => format!(
            "    Average: {:.2}%, Minimum: {:.2}%, Maximum: {:.2}%",
            s.average, s.minimum, s.maximum
        ),
        None => "    Average: N/A, Minimum: N/A, Maximum: N/A".to_string(),
    }
}

/// Statistics of one instance metric over the last `recent_hours`
pub async fn query(
    service: &dyn MetricsService,
    instance_id: &str,
    namespace: &str,
    metric_name: &str,
    extra_dims: &Dimensions,
    recent_hours: u32,
    now: DateTime<Utc>,
) -> Result<Option<StatSummary>, AwsError> {
    let mut dimensions = Dimensions::new();
    dimensions.insert(INSTANCE_ID.to_string(), instance_id.to_string());
    dimensions.extend(extra_dims.iter().map(|(k, v)| (k.clone(), v.clone())));

    let request = StatisticsRequest {
        namespace: namespace.to_string(),
        metric_name: metric_name.to_string(),
        dimensions,
        start: now - Duration::hours(i64::from(recent_hours)),
        end: now,
        period_secs: PERIOD_SECS,
        statistics: vec![Statistic::Average, Statistic::Maximum, Statistic::Minimum],
    };

    let points = service.get_metric_statistics(&request).await?;
    Ok(reduce(&points))
}
