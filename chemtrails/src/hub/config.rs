//! Hub configuration
//!
//! Defaults can be overridden from the environment:
//!
//! | Variable                   | Field           |
//! |----------------------------|-----------------|
//! | `CHEMTRAILS_ENABLED`       | `enabled`       |
//! | `CHEMTRAILS_MAX_IN_FLIGHT` | `max_in_flight` |
//! | `CHEMTRAILS_NUM_WORKERS`   | `num_workers`   |
//! | `CHEMTRAILS_COMPRESS`      | `compress`      |
//!
//! Values that fail to parse are ignored.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::inspector::online_cpus;

pub const CHEMTRAILS_ENABLED: &str = "CHEMTRAILS_ENABLED";
pub const CHEMTRAILS_MAX_IN_FLIGHT: &str = "CHEMTRAILS_MAX_IN_FLIGHT";
pub const CHEMTRAILS_NUM_WORKERS: &str = "CHEMTRAILS_NUM_WORKERS";
pub const CHEMTRAILS_COMPRESS: &str = "CHEMTRAILS_COMPRESS";

/// Default admission limit (objects admitted but not yet persisted)
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Must exist and be writable when the hub is constructed
    pub output_dir: PathBuf,
    pub enabled: bool,
    pub max_in_flight: usize,
    pub num_workers: usize,
    /// Gzip archive payloads
    pub compress: bool,
}

impl HubConfig {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            enabled: true,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            num_workers: default_workers(),
            compress: true,
        }
    }

    /// Defaults overlaid with `CHEMTRAILS_*` environment variables
    #[must_use]
    pub fn from_env(output_dir: impl Into<PathBuf>) -> Self {
        Self::new(output_dir).with_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(enabled) = lookup(CHEMTRAILS_ENABLED).and_then(|v| parse_bool(&v)) {
            self.enabled = enabled;
        }
        if let Some(max) = lookup(CHEMTRAILS_MAX_IN_FLIGHT).and_then(|v| parse_positive(&v)) {
            self.max_in_flight = max;
        }
        if let Some(workers) = lookup(CHEMTRAILS_NUM_WORKERS).and_then(|v| parse_positive(&v)) {
            self.num_workers = workers;
        }
        if let Some(compress) = lookup(CHEMTRAILS_COMPRESS).and_then(|v| parse_bool(&v)) {
            self.compress = compress;
        }
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Clamped to at least one worker
    #[must_use]
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    #[must_use]
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// Number of online CPUs, or the standard library's guess if sysfs is unavailable
fn default_workers() -> usize {
    match online_cpus() {
        Ok(cpus) if !cpus.is_empty() => cpus.len(),
        _ => std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_positive(value: &str) -> Option<usize> {
    usize::from_str(value.trim()).ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = HubConfig::new("/tmp/out");
        assert!(config.enabled);
        assert!(config.compress);
        assert_eq!(config.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
        assert!(config.num_workers >= 1);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (CHEMTRAILS_ENABLED, "off"),
            (CHEMTRAILS_MAX_IN_FLIGHT, "8"),
            (CHEMTRAILS_NUM_WORKERS, " 3 "),
            (CHEMTRAILS_COMPRESS, "FALSE"),
        ]
        .into_iter()
        .collect();
        let config = HubConfig::new("/tmp/out").with_overrides(|k| vars.get(k).map(ToString::to_string));
        assert!(!config.enabled);
        assert!(!config.compress);
        assert_eq!(config.max_in_flight, 8);
        assert_eq!(config.num_workers, 3);
    }

    #[test]
    fn test_unparseable_overrides_keep_defaults() {
        let config = HubConfig::new("/tmp/out").with_overrides(|k| match k {
            CHEMTRAILS_MAX_IN_FLIGHT => Some("lots".to_string()),
            CHEMTRAILS_NUM_WORKERS => Some("0".to_string()),
            CHEMTRAILS_ENABLED => Some("maybe".to_string()),
            _ => None,
        });
        assert!(config.enabled);
        assert_eq!(config.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
        assert!(config.num_workers >= 1);
    }
}
