//! Cloud collaborators: instance metadata, credentials, request signing and
//! the CloudWatch / Auto Scaling clients. The rest of the crate only sees the
//! traits defined here.

pub mod autoscaling;
pub mod cloudwatch;
pub mod credentials;
pub mod metadata;
pub mod sigv4;

pub use autoscaling::AutoScalingClient;
pub use cloudwatch::CloudWatchClient;
pub use credentials::Credentials;
pub use metadata::{ImdsClient, InstanceMetadata};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::metrics::{Dimensions, MetricRecord};

#[derive(Debug, thiserror::Error)]
pub enum AwsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {service}: {message}")]
    InvalidResponse { service: String, message: String },

    #[error("Failed to serialize request: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No AWS credentials found in the environment or the instance profile")]
    NoCredentials,

    #[error("{0}")]
    NotFound(String),
}

/// Statistic kinds requested from CloudWatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Average,
    Maximum,
    Minimum,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Average => "Average",
            Statistic::Maximum => "Maximum",
            Statistic::Minimum => "Minimum",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsRequest {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Dimensions,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period_secs: u32,
    pub statistics: Vec<Statistic>,
}

/// One period sample
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    pub timestamp: Option<DateTime<Utc>>,
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
}

/// Metric publishing and statistics retrieval
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricsService: Send + Sync {
    /// Publish one batch. `Ok(false)` means the service rejected it.
    async fn put_metric_data(&self, namespace: &str, records: &[MetricRecord]) -> Result<bool, AwsError>;

    /// Dimension sets of the metrics matching `metric_name` and the filter
    async fn list_metrics(
        &self,
        namespace: &str,
        metric_name: &str,
        dimensions: &Dimensions,
    ) -> Result<Vec<Dimensions>, AwsError>;

    async fn get_metric_statistics(&self, request: &StatisticsRequest) -> Result<Vec<Datapoint>, AwsError>;
}

/// Auto Scaling group membership
#[async_trait]
pub trait AutoScalingService: Send + Sync {
    async fn group_name(&self, instance_id: &str) -> Result<String, AwsError>;
}

/// Instance metadata lookup
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self) -> Result<InstanceMetadata, AwsError>;
}

/// Regional endpoint host of a service
pub fn endpoint_host(service: &str, region: &str) -> String {
    if region.starts_with("cn-") {
        format!("{service}.{region}.amazonaws.com.cn")
    } else {
        format!("{service}.{region}.amazonaws.com")
    }
}

/// HTTPS client for one regional service endpoint, signing every request
#[derive(Debug, Clone)]
pub(crate) struct SignedClient {
    http: Client,
    service: &'static str,
    region: String,
    host: String,
    credentials: Credentials,
}

impl SignedClient {
    pub(crate) fn new(
        service: &'static str,
        region: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, AwsError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            service,
            region: region.to_string(),
            host: endpoint_host(service, region),
            credentials,
        })
    }

    /// POST `body` to the service root, returning status and response body
    pub(crate) async fn post(
        &self,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Result<(StatusCode, String), AwsError> {
        let params = sigv4::SigningParams {
            credentials: &self.credentials,
            region: &self.region,
            service: self.service,
            time: Utc::now(),
        };
        let signed = sigv4::sign(&params, "POST", &self.host, "/", headers, &body);

        let mut request = self.http.post(format!("https://{}/", self.host));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        for (name, value) in &signed {
            request = request.header(name.as_str(), value.as_str());
        }

        debug!("POST https://{}/ ({} bytes)", self.host, body.len());
        let response = request.body(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    pub(crate) fn service(&self) -> &'static str {
        self.service
    }
}
