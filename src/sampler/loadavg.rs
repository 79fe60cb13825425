use std::path::Path;

use super::{read_host_file, SampleError};

pub const LOADAVG_PATH: &str = "/proc/loadavg";
pub const CPUINFO_PATH: &str = "/proc/cpuinfo";

/// 1, 5 and 15 minute load averages plus the core count to normalize them
#[derive(Debug, Clone, PartialEq)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
    pub cpu_count: usize,
}

impl LoadAverage {
    pub fn read() -> Result<Self, SampleError> {
        Self::read_from(Path::new(LOADAVG_PATH), Path::new(CPUINFO_PATH))
    }

    pub fn read_from(loadavg: &Path, cpuinfo: &Path) -> Result<Self, SampleError> {
        let loadavg = read_host_file(loadavg)?;
        let cpuinfo = read_host_file(cpuinfo)?;
        Self::parse(&loadavg, &cpuinfo)
    }

    pub fn parse(loadavg: &str, cpuinfo: &str) -> Result<Self, SampleError> {
        let fields: Vec<&str> = loadavg.split_whitespace().collect();
        let value = |index: usize, key: &str| -> Result<f64, SampleError> {
            let raw = fields.get(index).ok_or_else(|| SampleError::MissingField {
                key: key.to_string(),
                origin: LOADAVG_PATH.to_string(),
            })?;
            raw.parse::<f64>().map_err(|_| SampleError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
            })
        };

        let cpu_count = count_processors(cpuinfo);
        if cpu_count == 0 {
            return Err(SampleError::NoCpus(CPUINFO_PATH.to_string()));
        }

        Ok(Self {
            one: value(0, "1min")?,
            five: value(1, "5min")?,
            fifteen: value(2, "15min")?,
            cpu_count,
        })
    }

    pub fn per_cpu_one(&self) -> f64 {
        self.one / self.cpu_count as f64
    }

    pub fn per_cpu_five(&self) -> f64 {
        self.five / self.cpu_count as f64
    }

    pub fn per_cpu_fifteen(&self) -> f64 {
        self.fifteen / self.cpu_count as f64
    }
}

/// Count `processor : N` entries
fn count_processors(cpuinfo: &str) -> usize {
    cpuinfo
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(key, _)| key.trim() == "processor")
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CPUINFO: &str = "processor\t: 0\nmodel name\t: Xeon\n\nprocessor\t: 1\nmodel name\t: Xeon\n";

    #[test]
    fn test_parse_loadavg() {
        let load = LoadAverage::parse("0.50 1.00 2.00 1/123 4567\n", CPUINFO).unwrap();
        assert_eq!(load.one, 0.5);
        assert_eq!(load.five, 1.0);
        assert_eq!(load.fifteen, 2.0);
        assert_eq!(load.cpu_count, 2);
        assert_eq!(load.per_cpu_one(), 0.25);
        assert_eq!(load.per_cpu_five(), 0.5);
        assert_eq!(load.per_cpu_fifteen(), 1.0);
    }

    #[test]
    fn test_no_cpus_is_fatal() {
        let err = LoadAverage::parse("0.50 1.00 2.00 1/123 4567", "").unwrap_err();
        assert!(matches!(err, SampleError::NoCpus(_)));
    }

    #[test]
    fn test_truncated_loadavg() {
        assert!(LoadAverage::parse("0.50 1.00", CPUINFO).is_err());
        assert!(LoadAverage::parse("high 1.00 2.00", CPUINFO).is_err());
    }
}
