use std::collections::HashMap;
use std::path::PathBuf;

use super::{run_command, SampleError};

const DF: &str = "df";

/// Space and inode usage of the filesystem holding a path
#[derive(Debug, Clone, PartialEq)]
pub struct Disk {
    pub mount: String,
    pub file_system: String,
    pub total: u64,
    pub used: u64,
    pub avail: u64,
    /// Inode utilization in percent, 0 when not requested
    pub inode_util: f64,
}

impl Disk {
    /// Space utilization in percent
    pub fn util(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.used as f64 / self.total as f64
    }
}

/// Run `df` for `paths`, adding inode utilization when requested
pub fn collect(paths: &[PathBuf], include_inodes: bool) -> Result<Vec<Disk>, SampleError> {
    let path_args: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    let path_args: Vec<&str> = path_args.iter().map(String::as_str).collect();

    let mut args = vec!["-k", "-P"];
    args.extend(&path_args);
    let mut disks = parse_space_output(&run_command(DF, &args)?)?;

    if include_inodes {
        let mut args = vec!["-i", "-k", "-P"];
        args.extend(&path_args);
        let inodes = parse_inode_output(&run_command(DF, &args)?)?;
        apply_inode_util(&mut disks, &inodes);
    }

    Ok(disks)
}

/// Attach inode utilization by mount path. Mounts absent from the inode
/// listing keep 0.
pub fn apply_inode_util(disks: &mut [Disk], inodes: &HashMap<String, f64>) {
    for disk in disks.iter_mut() {
        disk.inode_util = inodes.get(&disk.mount).copied().unwrap_or(0.0);
    }
}

/// Parse `df -k -P` output (1K blocks)
pub fn parse_space_output(output: &str) -> Result<Vec<Disk>, SampleError> {
    data_lines(output)
        .map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                return Err(parse_error(line));
            }
            let blocks = |index: usize| {
                fields[index]
                    .parse::<u64>()
                    .map(|kb| kb * 1024)
                    .map_err(|_| parse_error(line))
            };

            Ok(Disk {
                mount: fields[5..].join(" "),
                file_system: fields[0].to_string(),
                total: blocks(1)?,
                used: blocks(2)?,
                avail: blocks(3)?,
                inode_util: 0.0,
            })
        })
        .collect()
}

/// Parse `df -i -k -P` output into inode utilization keyed by mount path
pub fn parse_inode_output(output: &str) -> Result<HashMap<String, f64>, SampleError> {
    let mut inodes = HashMap::new();
    for line in data_lines(output) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 6 {
            return Err(parse_error(line));
        }
        let total = inode_count(fields[1]).ok_or_else(|| parse_error(line))?;
        let used = inode_count(fields[2]).ok_or_else(|| parse_error(line))?;
        let util = if total > 0.0 { 100.0 * used / total } else { 0.0 };
        inodes.insert(fields[5..].join(" "), util);
    }
    Ok(inodes)
}

/// Some filesystems report `-` instead of inode counts
fn inode_count(field: &str) -> Option<f64> {
    if field == "-" {
        return Some(0.0);
    }
    field.parse::<f64>().ok()
}

fn data_lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().skip(1).filter(|line| !line.trim().is_empty())
}

fn parse_error(line: &str) -> SampleError {
    SampleError::Parse {
        command: DF.to_string(),
        line: line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_util_with_zero_total() {
        let disk = Disk {
            mount: "/proc".to_string(),
            file_system: "proc".to_string(),
            total: 0,
            used: 0,
            avail: 0,
            inode_util: 0.0,
        };
        assert_eq!(disk.util(), 0.0);
    }

    #[test]
    fn test_mount_with_spaces() {
        let output = "Filesystem 1024-blocks Used Available Capacity Mounted on\n\
                      /dev/sdb1 100 50 50 50% /mnt/my disk\n";
        let disks = parse_space_output(output).unwrap();
        assert_eq!(disks[0].mount, "/mnt/my disk");
    }

    #[test]
    fn test_dash_inode_counts() {
        let output = "Filesystem Inodes IUsed IFree IUse% Mounted on\n\
                      /dev/sdb1 - - - - /data\n";
        let inodes = parse_inode_output(output).unwrap();
        assert_eq!(inodes.get("/data"), Some(&0.0));
    }

    #[test]
    fn test_garbage_line_is_rejected() {
        let output = "Filesystem 1024-blocks Used Available Capacity Mounted on\nbroken line\n";
        assert!(matches!(parse_space_output(output), Err(SampleError::Parse { .. })));
    }
}
