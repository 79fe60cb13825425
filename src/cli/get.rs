use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io::{self, Write};

use super::args::GetArgs;
use crate::aws::metadata::get_metadata;
use crate::aws::{credentials, CloudWatchClient, ImdsClient, MetricsService};
use crate::cache::FileCache;
use crate::config::{Config, DEFAULT_NAMESPACE};
use crate::metrics::record::{FILESYSTEM, INSTANCE_ID, MOUNT_PATH};
use crate::metrics::Dimensions;
use crate::publisher::{format_summary, query};

const EC2_NAMESPACE: &str = "AWS/EC2";
const ROOT_MOUNT: &str = "/";

/// Metrics reported for every instance: namespace, metric, section title
const SECTIONS: [(&str, &str, &str); 3] = [
    (EC2_NAMESPACE, "CPUUtilization", "CPU Utilization"),
    (DEFAULT_NAMESPACE, "MemoryUtilization", "Memory Utilization"),
    (DEFAULT_NAMESPACE, "SwapUtilization", "Swap Utilization"),
];

/// Write the statistics report of one instance, each section as soon as
/// its statistics arrive. Sections already written stay written on error.
pub async fn write_report<W: Write>(
    service: &dyn MetricsService,
    out: &mut W,
    instance_id: &str,
    recent_hours: u32,
    now: DateTime<Utc>,
) -> Result<()> {
    let unit = if recent_hours > 1 { "hours" } else { "hour" };
    writeln!(out, "Instance {instance_id} statistics for the last {recent_hours} {unit}.\n")?;
    out.flush()?;

    for (namespace, metric, title) in SECTIONS {
        let summary = query(service, instance_id, namespace, metric, &Dimensions::new(), recent_hours, now)
            .await
            .with_context(|| format!("Cannot read {metric} statistics"))?;
        writeln!(out, "{title}\n{}\n", format_summary(summary.as_ref()))?;
        out.flush()?;
    }

    // Disk statistics need the Filesystem dimension the writer published
    let mut filter = Dimensions::new();
    filter.insert(INSTANCE_ID.to_string(), instance_id.to_string());
    filter.insert(MOUNT_PATH.to_string(), ROOT_MOUNT.to_string());
    let listed = service
        .list_metrics(DEFAULT_NAMESPACE, "DiskSpaceUtilization", &filter)
        .await
        .context("Cannot list DiskSpaceUtilization metrics")?;

    if let Some(filesystem) = listed.iter().find_map(|dims| dims.get(FILESYSTEM)) {
        let mut extra = Dimensions::new();
        extra.insert(MOUNT_PATH.to_string(), ROOT_MOUNT.to_string());
        extra.insert(FILESYSTEM.to_string(), filesystem.clone());

        let summary = query(
            service,
            instance_id,
            DEFAULT_NAMESPACE,
            "DiskSpaceUtilization",
            &extra,
            recent_hours,
            now,
        )
        .await
        .context("Cannot read DiskSpaceUtilization statistics")?;
        writeln!(out, "Disk Space Utilization\n{}\n", format_summary(summary.as_ref()))?;
        out.flush()?;
    }

    Ok(())
}

/// Reader flow: metadata, then the report on stdout
pub async fn run(args: &GetArgs, config: &Config) -> Result<()> {
    let cache = FileCache::new(config.cache.dir.clone());
    let imds = ImdsClient::from_env()?;
    let metadata = get_metadata(&imds, &cache, config).await?;

    if args.verbose {
        println!("Instance metadata: {metadata}");
    }

    let credentials = credentials::resolve(&imds).await?;
    let service = CloudWatchClient::connect(metadata.region(), credentials, config.http_timeout())?;

    let mut stdout = io::stdout();
    write_report(&service, &mut stdout, &metadata.instance_id, args.recent_hours, Utc::now()).await
}
