use async_trait::async_trait;
use once_cell::sync::Lazy;
use quick_xml::escape::unescape;
use regex::Regex;
use std::future::Future;
use std::time::Duration;

use super::sigv4::uri_encode;
use super::{AutoScalingService, AwsError, Credentials, SignedClient};
use crate::cache::{cached, CacheKey, CacheStore};
use crate::config::Config;

const CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const API_VERSION: &str = "2011-01-01";

static GROUP_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<AutoScalingGroupName>\s*([^<]+?)\s*</AutoScalingGroupName>")
        .expect("group name pattern is valid")
});

pub const NOT_FOUND_MESSAGE: &str = "Could not find auto-scaling information";

/// Auto Scaling over the Query protocol
#[derive(Debug, Clone)]
pub struct AutoScalingClient {
    client: SignedClient,
}

impl AutoScalingClient {
    pub fn connect(region: &str, credentials: Credentials, timeout: Duration) -> Result<Self, AwsError> {
        Ok(Self {
            client: SignedClient::new("autoscaling", region, credentials, timeout)?,
        })
    }
}

fn describe_instances_body(instance_id: &str) -> String {
    format!(
        "Action=DescribeAutoScalingInstances&InstanceIds.member.1={}&Version={API_VERSION}",
        uri_encode(instance_id)
    )
}

/// First group name in a DescribeAutoScalingInstances response, with XML
/// entities decoded. Malformed escapes are treated as no group.
pub fn parse_group_name(xml: &str) -> Option<String> {
    let caps = GROUP_NAME.captures(xml)?;
    match unescape(&caps[1]) {
        Ok(name) => Some(name.into_owned()),
        Err(e) => {
            tracing::warn!("Malformed AutoScalingGroupName {:?}: {}", &caps[1], e);
            None
        }
    }
}

#[async_trait]
impl AutoScalingService for AutoScalingClient {
    async fn group_name(&self, instance_id: &str) -> Result<String, AwsError> {
        let body = describe_instances_body(instance_id).into_bytes();
        let (status, text) = self.client.post(&[("Content-Type", CONTENT_TYPE)], body).await?;

        if !status.is_success() {
            return Err(AwsError::Status {
                service: self.client.service().to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        parse_group_name(&text).ok_or_else(|| AwsError::NotFound(NOT_FOUND_MESSAGE.to_string()))
    }
}

/// Auto Scaling group of the instance, served from the cache while fresh.
/// `connect` only runs on a cache miss.
pub async fn get_autoscaling_group_name<S, C, Fut>(
    cache: &dyn CacheStore,
    config: &Config,
    region: &str,
    instance_id: &str,
    connect: C,
) -> anyhow::Result<String>
where
    S: AutoScalingService,
    C: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<S>>,
{
    let key = CacheKey::new(
        &config.client_name,
        "get_autoscaling_group_name",
        &[region, instance_id],
    );

    cached(cache, &key, config.cache_ttl(), || async move {
        let service = connect().await?;
        Ok::<_, anyhow::Error>(service.group_name(instance_id).await?)
    })
    .await
}
