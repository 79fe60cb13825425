use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{AwsError, Credentials, Datapoint, MetricsService, SignedClient, StatisticsRequest};
use crate::metrics::{Dimensions, MetricRecord};

const CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const TARGET_PREFIX: &str = "GraniteServiceVersion20100801";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireDimension {
    name: String,
    value: String,
}

fn to_wire(dimensions: &Dimensions) -> Vec<WireDimension> {
    dimensions
        .iter()
        .map(|(name, value)| WireDimension {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

fn epoch_seconds(time: &DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MetricDatum<'a> {
    metric_name: &'a str,
    dimensions: Vec<WireDimension>,
    timestamp: f64,
    value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutMetricDataInput<'a> {
    namespace: &'a str,
    metric_data: Vec<MetricDatum<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListMetricsInput<'a> {
    namespace: &'a str,
    metric_name: &'a str,
    dimensions: Vec<WireDimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireMetric {
    #[serde(default)]
    dimensions: Vec<WireDimension>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListMetricsOutput {
    #[serde(default)]
    metrics: Vec<WireMetric>,
    next_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetMetricStatisticsInput<'a> {
    namespace: &'a str,
    metric_name: &'a str,
    dimensions: Vec<WireDimension>,
    start_time: f64,
    end_time: f64,
    period: u32,
    statistics: Vec<&'static str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireDatapoint {
    timestamp: Option<f64>,
    average: Option<f64>,
    minimum: Option<f64>,
    maximum: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetMetricStatisticsOutput {
    #[serde(default)]
    datapoints: Vec<WireDatapoint>,
}

fn put_metric_data_body(namespace: &str, records: &[MetricRecord]) -> Result<Vec<u8>, AwsError> {
    let input = PutMetricDataInput {
        namespace,
        metric_data: records
            .iter()
            .map(|record| MetricDatum {
                metric_name: &record.name,
                dimensions: to_wire(&record.dimensions),
                timestamp: epoch_seconds(&record.timestamp),
                value: record.value,
                unit: record.unit.as_deref(),
            })
            .collect(),
    };
    Ok(serde_json::to_vec(&input)?)
}

/// Datapoints missing any of the three statistics are dropped
fn to_datapoints(output: GetMetricStatisticsOutput) -> Vec<Datapoint> {
    output
        .datapoints
        .into_iter()
        .filter_map(|point| {
            Some(Datapoint {
                timestamp: point
                    .timestamp
                    .and_then(|secs| DateTime::from_timestamp(secs as i64, 0)),
                average: point.average?,
                minimum: point.minimum?,
                maximum: point.maximum?,
            })
        })
        .collect()
}

/// CloudWatch over the JSON 1.0 protocol
#[derive(Debug, Clone)]
pub struct CloudWatchClient {
    client: SignedClient,
}

impl CloudWatchClient {
    pub fn connect(region: &str, credentials: Credentials, timeout: Duration) -> Result<Self, AwsError> {
        Ok(Self {
            client: SignedClient::new("monitoring", region, credentials, timeout)?,
        })
    }

    async fn send(&self, operation: &str, body: Vec<u8>) -> Result<(StatusCode, String), AwsError> {
        let target = format!("{TARGET_PREFIX}.{operation}");
        let headers = [("Content-Type", CONTENT_TYPE), ("X-Amz-Target", target.as_str())];
        let (status, text) = self.client.post(&headers, body).await?;
        debug!("{} returned HTTP {}", operation, status);
        Ok((status, text))
    }

    async fn call<Req, Resp>(&self, operation: &str, input: &Req) -> Result<Resp, AwsError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let (status, text) = self.send(operation, serde_json::to_vec(input)?).await?;
        if !status.is_success() {
            return Err(AwsError::Status {
                service: self.client.service().to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| AwsError::InvalidResponse {
            service: self.client.service().to_string(),
            message: format!("{operation}: {e}"),
        })
    }
}

#[async_trait]
impl MetricsService for CloudWatchClient {
    async fn put_metric_data(&self, namespace: &str, records: &[MetricRecord]) -> Result<bool, AwsError> {
        let body = put_metric_data_body(namespace, records)?;
        let (status, text) = self.send("PutMetricData", body).await?;
        if !status.is_success() {
            warn!("PutMetricData rejected with HTTP {}: {}", status, text);
        }
        Ok(status.is_success())
    }

    async fn list_metrics(
        &self,
        namespace: &str,
        metric_name: &str,
        dimensions: &Dimensions,
    ) -> Result<Vec<Dimensions>, AwsError> {
        let mut found = Vec::new();
        let mut next_token = None;

        loop {
            let input = ListMetricsInput {
                namespace,
                metric_name,
                dimensions: to_wire(dimensions),
                next_token,
            };
            let output: ListMetricsOutput = self.call("ListMetrics", &input).await?;

            found.extend(output.metrics.into_iter().map(|metric| {
                metric
                    .dimensions
                    .into_iter()
                    .map(|d| (d.name, d.value))
                    .collect::<Dimensions>()
            }));

            match output.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        Ok(found)
    }

    async fn get_metric_statistics(&self, request: &StatisticsRequest) -> Result<Vec<Datapoint>, AwsError> {
        let input = GetMetricStatisticsInput {
            namespace: &request.namespace,
            metric_name: &request.metric_name,
            dimensions: to_wire(&request.dimensions),
            start_time: epoch_seconds(&request.start),
            end_time: epoch_seconds(&request.end),
            period: request.period_secs,
            statistics: request.statistics.iter().map(|s| s.as_str()).collect(),
        };
        let output: GetMetricStatisticsOutput = self.call("GetMetricStatistics", &input).await?;
        Ok(to_datapoints(output))
    }
}
