use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use super::{AwsError, MetadataSource};
use crate::cache::{cached, CacheKey, CacheStore};
use crate::config::Config;

pub const DEFAULT_ENDPOINT: &str = "http://169.254.169.254";
pub const ENDPOINT_ENV: &str = "AWS_EC2_METADATA_SERVICE_ENDPOINT";

const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";
const SERVICE: &str = "instance metadata service";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstanceMetadata {
    pub instance_id: String,
    pub instance_type: String,
    pub ami_id: String,
    pub availability_zone: String,
}

impl InstanceMetadata {
    /// Region of the availability zone, e.g. `eu-west-1` for `eu-west-1b`
    pub fn region(&self) -> &str {
        let zone = self.availability_zone.as_str();
        match zone.chars().last() {
            Some(last) if last.is_ascii_alphabetic() => &zone[..zone.len() - 1],
            _ => zone,
        }
    }
}

impl fmt::Display for InstanceMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{instance-id: {}, instance-type: {}, ami-id: {}, availability-zone: {}}}",
            self.instance_id, self.instance_type, self.ami_id, self.availability_zone
        )
    }
}

/// Temporary credentials of the instance profile role
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub token: Option<String>,
}

/// Client for the EC2 instance metadata service (IMDSv2 with IMDSv1 fallback)
#[derive(Debug, Clone)]
pub struct ImdsClient {
    client: Client,
    endpoint: String,
    retries: u32,
}

impl ImdsClient {
    /// One second per request, two retries
    pub fn new(endpoint: &str) -> Result<Self, AwsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(1))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            retries: 2,
        })
    }

    /// Endpoint from `AWS_EC2_METADATA_SERVICE_ENDPOINT`, else the link-local default
    pub fn from_env() -> Result<Self, AwsError> {
        let endpoint = std::env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        Self::new(&endpoint)
    }

    /// Session token, `None` when only IMDSv1 is available
    async fn token(&self) -> Option<String> {
        let url = format!("{}/latest/api/token", self.endpoint);
        let response = self
            .client
            .put(&url)
            .header(TOKEN_TTL_HEADER, "21600")
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => response.text().await.ok(),
            Ok(response) => {
                debug!("IMDSv2 token request returned {}, falling back to IMDSv1", response.status());
                None
            }
            Err(e) => {
                debug!("IMDSv2 token request failed ({}), falling back to IMDSv1", e);
                None
            }
        }
    }

    async fn get_once(&self, url: &str, token: Option<&str>) -> Result<String, AwsError> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(AwsError::Status {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body,
            })
        }
    }

    /// GET a metadata path with bounded retries
    async fn get(&self, path: &str, token: Option<&str>) -> Result<String, AwsError> {
        let url = format!("{}/latest/meta-data/{}", self.endpoint, path);
        let mut attempt = 0;

        loop {
            match self.get_once(&url, token).await {
                Ok(body) => return Ok(body.trim().to_string()),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!("Metadata request {} failed ({}), retry {}/{}", path, e, attempt, self.retries);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Credentials of the first role attached to the instance profile
    pub async fn role_credentials(&self) -> Result<RoleCredentials, AwsError> {
        let token = self.token().await;
        let roles = self.get("iam/security-credentials/", token.as_deref()).await?;
        let role = roles
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or(AwsError::NoCredentials)?;

        let body = self
            .get(&format!("iam/security-credentials/{role}"), token.as_deref())
            .await?;
        serde_json::from_str(&body).map_err(|e| AwsError::InvalidResponse {
            service: SERVICE.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl MetadataSource for ImdsClient {
    async fn fetch(&self) -> Result<InstanceMetadata, AwsError> {
        let token = self.token().await;
        let token = token.as_deref();

        Ok(InstanceMetadata {
            instance_id: self.get("instance-id", token).await?,
            instance_type: self.get("instance-type", token).await?,
            ami_id: self.get("ami-id", token).await?,
            availability_zone: self.get("placement/availability-zone", token).await?,
        })
    }
}

/// Instance metadata, served from the cache while fresh
pub async fn get_metadata(
    source: &dyn MetadataSource,
    cache: &dyn CacheStore,
    config: &Config,
) -> anyhow::Result<InstanceMetadata> {
    let key = CacheKey::new(&config.client_name, "get_metadata", &[]);
    cached(cache, &key, config.cache_ttl(), || async move {
        source
            .fetch()
            .await
            .context("Cannot obtain EC2 metadata.")
    })
    .await
}
