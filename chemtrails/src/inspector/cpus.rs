//! CPU utility functions
//!
//! Utilities for querying CPU information from /sys filesystem.

use crate::domain::InspectError;
use std::fs;
use std::path::Path;

const ONLINE_CPUS: &str = "/sys/devices/system/cpu/online";

/// Get list of online CPU IDs from /sys/devices/system/cpu/online
///
/// Returns a vector of CPU IDs (e.g., [0, 1, 2, 3] for a 4-core system).
/// The format in /sys is like "0-3" or "0-3,8-11" for NUMA systems.
///
/// # Errors
/// Returns an error if the file cannot be read or has an unexpected format
pub fn online_cpus() -> Result<Vec<u32>, InspectError> {
    let content = fs::read_to_string(ONLINE_CPUS)
        .map_err(|source| InspectError::Io { path: ONLINE_CPUS.into(), source })?;
    parse_cpu_list(&content)
}

fn parse_cpu_list(content: &str) -> Result<Vec<u32>, InspectError> {
    let bad = |detail: String| InspectError::Parse { path: Path::new(ONLINE_CPUS).into(), detail };
    let mut cpus = Vec::new();

    for range in content.trim().split(',').filter(|r| !r.is_empty()) {
        if let Some((start, end)) = range.split_once('-') {
            // Range like "0-3"
            let start: u32 = start.parse().map_err(|_| bad(format!("bad range start {start}")))?;
            let end: u32 = end.parse().map_err(|_| bad(format!("bad range end {end}")))?;
            cpus.extend(start..=end);
        } else {
            // Single CPU like "5"
            cpus.push(range.parse().map_err(|_| bad(format!("bad cpu id {range}")))?);
        }
    }

    Ok(cpus)
}
