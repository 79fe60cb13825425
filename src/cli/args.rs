use anyhow::{bail, Context, Result};
use clap::Parser;
use regex::Regex;
use std::path::PathBuf;

use crate::metrics::FanoutMode;
use crate::sampler::SizeUnit;

const PUT_EPILOG: &str = "Supported UNITS are bytes, kilobytes, megabytes, and gigabytes.

Examples

 To perform a simple test run without posting data to Amazon CloudWatch

  mon-put-instance-stats --mem-util --verify --verbose

 To set a five-minute cron schedule to report memory and disk space utilization
 to CloudWatch

  */5 * * * * /usr/local/bin/mon-put-instance-stats --mem-util --disk-space-util --disk-path=/ --from-cron

 To report metrics from file

  mon-put-instance-stats --from-file filename.csv";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mon-put-instance-stats",
    about = "Collects memory, swap, and disk space utilization on an Amazon EC2 instance \
and sends this data as custom metrics to Amazon CloudWatch.",
    after_help = PUT_EPILOG,
    disable_version_flag = true
)]
pub struct PutArgs {
    /// Add metrics from file, the metrics data must be in csv format (name,unit,value)
    #[arg(long = "from-file", value_name = "FILENAME")]
    pub from_file: Vec<PathBuf>,

    /// Reports memory utilization in percentages.
    #[arg(long, help_heading = "Memory metrics")]
    pub mem_util: bool,

    /// Reports memory used in megabytes.
    #[arg(long, help_heading = "Memory metrics")]
    pub mem_used: bool,

    /// Reports available memory in megabytes.
    #[arg(long, help_heading = "Memory metrics")]
    pub mem_avail: bool,

    /// Reports swap utilization in percentages.
    #[arg(long, help_heading = "Memory metrics")]
    pub swap_util: bool,

    /// Reports allocated swap space in megabytes.
    #[arg(long, help_heading = "Memory metrics")]
    pub swap_used: bool,

    /// Count memory that is cached and in buffers as used.
    #[arg(long, help_heading = "Memory metrics")]
    pub mem_used_incl_cache_buff: bool,

    /// Specifies units for memory metrics.
    #[arg(
        long,
        value_enum,
        ignore_case = true,
        default_value = "megabytes",
        value_name = "UNITS",
        help_heading = "Memory metrics"
    )]
    pub memory_units: SizeUnit,

    /// Report load averages for 1min, 5min and 15min.
    #[arg(long, help_heading = "Load average metrics")]
    pub loadavg: bool,

    /// Report load averages for 1min, 5min and 15min divided by the number of CPU cores.
    #[arg(long, help_heading = "Load average metrics")]
    pub loadavg_percpu: bool,

    /// Selects the disk by the path on which to report.
    #[arg(long = "disk-path", value_name = "PATH", help_heading = "Disk metrics")]
    pub disk_path: Vec<PathBuf>,

    /// Reports disk space utilization in percentages.
    #[arg(long, help_heading = "Disk metrics")]
    pub disk_space_util: bool,

    /// Reports allocated disk space in gigabytes.
    #[arg(long, help_heading = "Disk metrics")]
    pub disk_space_used: bool,

    /// Reports available disk space in gigabytes.
    #[arg(long, help_heading = "Disk metrics")]
    pub disk_space_avail: bool,

    /// Reports inode utilization in percentages.
    #[arg(long, help_heading = "Disk metrics")]
    pub disk_inode_util: bool,

    /// Specifies units for disk space metrics.
    #[arg(
        long,
        value_enum,
        ignore_case = true,
        default_value = "gigabytes",
        value_name = "UNITS",
        help_heading = "Disk metrics"
    )]
    pub disk_space_units: SizeUnit,

    /// Report CPU and memory utilization metrics of processes matching a regular expression.
    #[arg(long = "process-name", value_name = "PROCNAME", help_heading = "Process metrics")]
    pub process_name: Vec<String>,

    /// Specifies that this script is running from cron.
    #[arg(long, conflicts_with = "verbose")]
    pub from_cron: bool,

    /// Displays details of what the script is doing.
    #[arg(long)]
    pub verbose: bool,

    /// Adds aggregated metrics for instance type, AMI id, and overall.
    #[arg(
        long,
        value_enum,
        ignore_case = true,
        num_args = 0..=1,
        default_missing_value = "additional"
    )]
    pub aggregated: Option<FanoutMode>,

    /// Adds aggregated metrics for Auto Scaling group.
    #[arg(
        long,
        value_enum,
        ignore_case = true,
        num_args = 0..=1,
        default_missing_value = "additional"
    )]
    pub auto_scaling: Option<FanoutMode>,

    /// Checks configuration and prepares a remote call.
    #[arg(long)]
    pub verify: bool,

    /// Displays the version number and exits.
    #[arg(long)]
    pub version: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mon-get-instance-stats",
    about = "Queries Amazon CloudWatch for statistics on CPU, memory, swap, and disk space \
utilization within a given time interval. This data is provided for the Amazon EC2 \
instance on which this script is executed.",
    disable_version_flag = true
)]
pub struct GetArgs {
    /// Specifies the number of recent hours to report.
    #[arg(long, value_name = "N", default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub recent_hours: u32,

    /// Displays details of what the script is doing.
    #[arg(long)]
    pub verbose: bool,

    /// Displays the version number and exits.
    #[arg(long)]
    pub version: bool,
}

/// What a validated writer invocation will collect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportPlan {
    pub mem: bool,
    pub disk: bool,
    pub loadavg: bool,
    pub process: bool,
    pub static_files: bool,
}

pub fn parse_put_args() -> PutArgs {
    PutArgs::parse()
}

pub fn parse_get_args() -> GetArgs {
    GetArgs::parse()
}

impl PutArgs {
    fn wants_disk_metrics(&self) -> bool {
        self.disk_space_util || self.disk_space_used || self.disk_space_avail || self.disk_inode_util
    }

    /// Check flag combinations and disk paths before anything is collected
    pub fn validate(&self) -> Result<ReportPlan> {
        let plan = ReportPlan {
            mem: self.mem_util || self.mem_used || self.mem_avail || self.swap_util || self.swap_used,
            disk: !self.disk_path.is_empty(),
            loadavg: self.loadavg || self.loadavg_percpu,
            process: !self.process_name.is_empty(),
            static_files: !self.from_file.is_empty(),
        };

        if plan.disk {
            if !self.wants_disk_metrics() {
                bail!("Disk path is provided but metrics to report disk space are not specified.");
            }

            for path in &self.disk_path {
                if !path.is_dir() {
                    bail!(
                        "Disk file path {} does not exist or cannot be accessed.",
                        path.display()
                    );
                }
            }
        } else if self.wants_disk_metrics() {
            bail!("Metrics to report disk space are provided but disk path is not specified.");
        }

        if !(plan.mem || plan.disk || plan.loadavg || plan.process || plan.static_files) {
            bail!("No metrics specified for collection and submission to CloudWatch.");
        }

        self.process_patterns()?;

        Ok(plan)
    }

    /// Compiled `--process-name` patterns, paired with their source text
    pub fn process_patterns(&self) -> Result<Vec<(String, Regex)>> {
        self.process_name
            .iter()
            .map(|pattern| {
                let regex = Regex::new(pattern)
                    .with_context(|| format!("Invalid process name pattern '{pattern}'"))?;
                Ok((pattern.clone(), regex))
            })
            .collect()
    }
}

impl Default for PutArgs {
    fn default() -> Self {
        Self {
            from_file: Vec::new(),
            mem_util: false,
            mem_used: false,
            mem_avail: false,
            swap_util: false,
            swap_used: false,
            mem_used_incl_cache_buff: false,
            memory_units: SizeUnit::Megabytes,
            loadavg: false,
            loadavg_percpu: false,
            disk_path: Vec::new(),
            disk_space_util: false,
            disk_space_used: false,
            disk_space_avail: false,
            disk_inode_util: false,
            disk_space_units: SizeUnit::Gigabytes,
            process_name: Vec::new(),
            from_cron: false,
            verbose: false,
            aggregated: None,
            auto_scaling: None,
            verify: false,
            version: false,
        }
    }
}
