//! Runtime configuration for the bridge loop.
//!
//! Separate from the TOML-deserialized config in `scale_config`; see
//! `conversions` for the mapping.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeCfg {
    /// Minimum weight change (centigrams) that triggers a publish.
    pub debounce_cg: u32,
    /// Mark the scale offline after this long without a report.
    pub silence_timeout: Duration,
    /// Delay between polls while the device is present.
    pub poll_interval: Duration,
    /// Upper bound on a single blocking read.
    pub read_timeout: Duration,
    /// Consecutive absent/io failures before going offline.
    pub failure_threshold: u32,
    /// Delay between polls while the device node is missing.
    pub absent_backoff: Duration,
}

impl Default for BridgeCfg {
    fn default() -> Self {
        Self {
            debounce_cg: 200,
            silence_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            read_timeout: Duration::from_millis(1000),
            failure_threshold: 3,
            absent_backoff: Duration::from_millis(5000),
        }
    }
}
