use regex::Regex;

use super::{run_command, SampleError};
use crate::metrics::Reading;

/// Summed CPU and memory share of all processes matching a pattern
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessUsage {
    pub cpu: f64,
    pub mem: f64,
    pub matched: usize,
}

/// List all processes as `command %cpu %mem`
pub fn list_processes() -> Result<String, SampleError> {
    run_command("ps", &["axco", "command,pcpu,pmem"])
}

/// Sum the last two columns of every line matching `pattern`. The header
/// and lines without two numeric trailing columns are ignored.
pub fn parse_ps_output(output: &str, pattern: &Regex) -> ProcessUsage {
    let mut usage = ProcessUsage::default();

    for line in output.lines().skip(1) {
        if !pattern.is_match(line) {
            continue;
        }

        let mut fields = line.split_whitespace().rev();
        let mem = fields.next().and_then(|v| v.parse::<f64>().ok());
        let cpu = fields.next().and_then(|v| v.parse::<f64>().ok());

        if let (Some(cpu), Some(mem)) = (cpu, mem) {
            usage.cpu += cpu;
            usage.mem += mem;
            usage.matched += 1;
        }
    }

    usage
}

/// `<pattern>-CpuUtilization` and `<pattern>-MemoryUtilization`
pub fn process_readings(pattern: &str, usage: &ProcessUsage) -> [Reading; 2] {
    [
        Reading::percent(format!("{pattern}-CpuUtilization"), usage.cpu),
        Reading::percent(format!("{pattern}-MemoryUtilization"), usage.mem),
    ]
}
