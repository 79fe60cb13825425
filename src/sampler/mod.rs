//! Host samplers. Each one reads host state and produces raw numbers; the
//! parsing halves are pure functions over the text the host hands back.

pub mod disk;
pub mod loadavg;
pub mod memory;
pub mod process;
pub mod static_file;

pub use disk::Disk;
pub use loadavg::LoadAverage;
pub use memory::MemData;
pub use process::ProcessUsage;
pub use static_file::{SkippedLine, StaticMetrics};

use clap::ValueEnum;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Missing {key} in {origin}")]
    MissingField { key: String, origin: String },

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Total memory reported as zero")]
    ZeroMemory,

    #[error("No CPU cores found in {0}")]
    NoCpus(String),

    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Unexpected output from {command}: '{line}'")]
    Parse { command: String, line: String },
}

/// Size unit for memory and disk space metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SizeUnit {
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
}

impl SizeUnit {
    /// Unit name as published
    pub fn name(&self) -> &'static str {
        match self {
            SizeUnit::Bytes => "Bytes",
            SizeUnit::Kilobytes => "Kilobytes",
            SizeUnit::Megabytes => "Megabytes",
            SizeUnit::Gigabytes => "Gigabytes",
        }
    }

    pub fn divisor(&self) -> f64 {
        match self {
            SizeUnit::Bytes => 1.0,
            SizeUnit::Kilobytes => 1024.0,
            SizeUnit::Megabytes => 1_048_576.0,
            SizeUnit::Gigabytes => 1_073_741_824.0,
        }
    }

    pub fn convert(&self, bytes: u64) -> f64 {
        bytes as f64 / self.divisor()
    }
}

/// Run a host utility and return its stdout
pub(crate) fn run_command(program: &str, args: &[&str]) -> Result<String, SampleError> {
    let command = format!("{} {}", program, args.join(" "));
    debug!("Running {}", command);

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| SampleError::Spawn {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(SampleError::CommandFailed {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Read a host pseudo-file
pub(crate) fn read_host_file(path: &std::path::Path) -> Result<String, SampleError> {
    std::fs::read_to_string(path).map_err(|source| SampleError::Read {
        path: path.to_path_buf(),
        source,
    })
}
