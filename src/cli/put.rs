use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::args::{PutArgs, ReportPlan};
use crate::aws::autoscaling::get_autoscaling_group_name;
use crate::aws::metadata::get_metadata;
use crate::aws::{credentials, AutoScalingClient, CloudWatchClient, ImdsClient};
use crate::cache::FileCache;
use crate::config::Config;
use crate::metrics::{FanoutPolicy, InstanceContext, MetricBuilder, Reading};
use crate::publisher::publish;
use crate::sampler::{disk, process, static_file, Disk, LoadAverage, MemData};

/// Upper bound of the start-up jitter under --from-cron
const CRON_JITTER_SECS: u64 = 20;

pub fn memory_readings(args: &PutArgs, mem: &MemData) -> Vec<Reading> {
    let unit = args.memory_units;
    let mut readings = Vec::new();

    if args.mem_util {
        readings.push(Reading::percent("MemoryUtilization", mem.mem_util()));
    }
    if args.mem_used {
        readings.push(Reading::new("MemoryUsed", Some(unit.name()), unit.convert(mem.mem_used())));
    }
    if args.mem_avail {
        readings.push(Reading::new("MemoryAvailable", Some(unit.name()), unit.convert(mem.mem_avail())));
    }
    if args.swap_util {
        readings.push(Reading::percent("SwapUtilization", mem.swap_util()));
    }
    if args.swap_used {
        readings.push(Reading::new("SwapUsed", Some(unit.name()), unit.convert(mem.swap_used())));
    }

    readings
}

pub fn loadavg_readings(args: &PutArgs, load: &LoadAverage) -> Vec<Reading> {
    let mut readings = Vec::new();

    if args.loadavg {
        readings.push(Reading::new("LoadAvg1Min", None, load.one));
        readings.push(Reading::new("LoadAvg5Min", None, load.five));
        readings.push(Reading::new("LoadAvg15Min", None, load.fifteen));
    }
    if args.loadavg_percpu {
        readings.push(Reading::new("LoadAvgPerCPU1Min", None, load.per_cpu_one()));
        readings.push(Reading::new("LoadAvgPerCPU5Min", None, load.per_cpu_five()));
        readings.push(Reading::new("LoadAvgPerCPU15Min", None, load.per_cpu_fifteen()));
    }

    readings
}

pub fn disk_readings(args: &PutArgs, disks: &[Disk]) -> Vec<Reading> {
    let unit = args.disk_space_units;
    let mut readings = Vec::new();

    for disk in disks {
        let on_disk = |reading: Reading| reading.with_mount(&disk.mount, &disk.file_system);

        if args.disk_space_util {
            readings.push(on_disk(Reading::percent("DiskSpaceUtilization", disk.util())));
        }
        if args.disk_space_used {
            readings.push(on_disk(Reading::new(
                "DiskSpaceUsed",
                Some(unit.name()),
                unit.convert(disk.used),
            )));
        }
        if args.disk_space_avail {
            readings.push(on_disk(Reading::new(
                "DiskSpaceAvailable",
                Some(unit.name()),
                unit.convert(disk.avail),
            )));
        }
        if args.disk_inode_util {
            readings.push(on_disk(Reading::percent("InodeUtilization", disk.inode_util)));
        }
    }

    readings
}

/// Readings of one metrics file; unusable lines are reported and skipped
pub fn static_readings(path: &Path) -> Result<Vec<Reading>> {
    let metrics = static_file::read_static_metrics(path)
        .with_context(|| format!("Cannot read metrics file {}", path.display()))?;

    for skipped in &metrics.skipped {
        warn!(
            "{}:{}: {} ({})",
            path.display(),
            skipped.line_number,
            skipped.reason,
            skipped.line
        );
        println!("Ignore unparseable metric: \"{}\"", skipped.line);
    }

    Ok(metrics.readings)
}

/// Sample the host for everything the plan asks for
pub fn collect_readings(args: &PutArgs, plan: &ReportPlan) -> Result<Vec<Reading>> {
    let mut readings = Vec::new();

    for path in &args.from_file {
        readings.extend(static_readings(path)?);
    }

    if plan.mem {
        let mem = MemData::read(args.mem_used_incl_cache_buff)?;
        readings.extend(memory_readings(args, &mem));
    }

    if plan.loadavg {
        let load = LoadAverage::read()?;
        readings.extend(loadavg_readings(args, &load));
    }

    if plan.disk {
        let disks = disk::collect(&args.disk_path, args.disk_inode_util)?;
        readings.extend(disk_readings(args, &disks));
    }

    if plan.process {
        let listing = process::list_processes()?;
        for (pattern, regex) in args.process_patterns()? {
            let usage = process::parse_ps_output(&listing, &regex);
            debug!("Pattern '{}' matched {} processes", pattern, usage.matched);
            readings.extend(process::process_readings(&pattern, &usage));
        }
    }

    Ok(readings)
}

/// Writer flow: validate, sample, fan out, then publish or verify
pub async fn run(args: &PutArgs, config: &Config) -> Result<()> {
    let plan = args.validate()?;

    // Spread cron-started runs over the first seconds of the minute
    if args.from_cron {
        let delay = fastrand::u64(0..CRON_JITTER_SECS);
        debug!("Sleeping {}s before collecting", delay);
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }

    if args.verbose {
        println!("Working in verbose mode");
        println!("{} version {}", config.client_name, crate::VERSION);
    }

    let cache = FileCache::new(config.cache.dir.clone());
    let imds = ImdsClient::from_env()?;
    let metadata = get_metadata(&imds, &cache, config).await?;

    if args.verbose {
        println!("Instance metadata: {metadata}");
    }

    let region = metadata.region().to_string();

    let autoscaling_group = if args.auto_scaling.is_some() {
        let (imds, region) = (&imds, region.as_str());
        let group = get_autoscaling_group_name(&cache, config, region, &metadata.instance_id, || async move {
            let credentials = credentials::resolve(imds).await?;
            Ok::<_, anyhow::Error>(AutoScalingClient::connect(region, credentials, config.http_timeout())?)
        })
        .await?;

        if args.verbose {
            println!("Autoscaling group: {group}");
        }
        Some(group)
    } else {
        None
    };

    let context = InstanceContext {
        instance_id: metadata.instance_id.clone(),
        instance_type: metadata.instance_type.clone(),
        image_id: metadata.ami_id.clone(),
        autoscaling_group,
    };
    let policy = FanoutPolicy::from_flags(args.aggregated, args.auto_scaling);
    let mut builder = MetricBuilder::new(context, policy, Utc::now());

    let readings = collect_readings(args, &plan)?;
    builder.add_readings(&readings);
    info!("Built {} records from {} readings", builder.len(), readings.len());

    if args.verbose {
        println!("Request:\n{builder}");
    }

    if args.verify {
        if !args.from_cron {
            println!("Verification completed successfully. No actual metrics sent to CloudWatch.");
        }
        return Ok(());
    }

    let credentials = credentials::resolve(&imds).await?;
    let service = CloudWatchClient::connect(&region, credentials, config.http_timeout())?;
    publish(&service, &config.namespace, builder.records()).await?;

    if !args.from_cron {
        println!("Successfully reported metrics to CloudWatch.");
    }

    Ok(())
}
