use std::path::Path;

use super::{read_host_file, SampleError};
use crate::metrics::Reading;

/// A line of a metrics file that could not be used
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    pub line_number: usize,
    pub line: String,
    pub reason: String,
}

/// Readings parsed from `name,unit,value` lines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticMetrics {
    pub readings: Vec<Reading>,
    pub skipped: Vec<SkippedLine>,
}

pub fn read_static_metrics(path: &Path) -> Result<StaticMetrics, SampleError> {
    let content = read_host_file(path)?;
    Ok(parse_static_metrics(&content))
}

/// Parse a metrics file. Bad lines are collected, never fatal.
pub fn parse_static_metrics(content: &str) -> StaticMetrics {
    let mut metrics = StaticMetrics::default();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(reading) => metrics.readings.push(reading),
            Err(reason) => metrics.skipped.push(SkippedLine {
                line_number: index + 1,
                line: line.to_string(),
                reason,
            }),
        }
    }

    metrics
}

fn parse_line(line: &str) -> Result<Reading, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [name, unit, value] = fields.as_slice() else {
        return Err(format!("expected 3 fields, found {}", fields.len()));
    };

    if name.is_empty() {
        return Err("empty metric name".to_string());
    }

    let value = value
        .parse::<f64>()
        .map_err(|_| format!("value '{value}' is not a number"))?;
    let unit = if unit.is_empty() { None } else { Some(*unit) };

    Ok(Reading::new(*name, unit, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_trimmed() {
        let metrics = parse_static_metrics("Foo, Percent , 12.5\n");
        assert!(metrics.skipped.is_empty());
        assert_eq!(metrics.readings, vec![Reading::new("Foo", Some("Percent"), 12.5)]);
    }

    #[test]
    fn test_wrong_arity_is_skipped() {
        let metrics = parse_static_metrics("bad,line\nQueueDepth,Count,3\n");
        assert_eq!(metrics.readings.len(), 1);
        assert_eq!(metrics.skipped.len(), 1);
        assert_eq!(metrics.skipped[0].line_number, 1);
        assert_eq!(metrics.skipped[0].line, "bad,line");
    }

    #[test]
    fn test_non_numeric_value_is_skipped() {
        let metrics = parse_static_metrics("Foo,Percent,lots\n");
        assert!(metrics.readings.is_empty());
        assert!(metrics.skipped[0].reason.contains("not a number"));
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let metrics = parse_static_metrics("\n  \nFoo,Count,1\n\n");
        assert_eq!(metrics.readings.len(), 1);
        assert!(metrics.skipped.is_empty());
    }
}
