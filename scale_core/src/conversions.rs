//! `From` implementations bridging `scale_config` types to `scale_core` types.

use crate::config::BridgeCfg;
use crate::fixed_point::threshold_g_to_cg;
use std::time::Duration;

impl From<&scale_config::EngineCfg> for BridgeCfg {
    fn from(c: &scale_config::EngineCfg) -> Self {
        Self {
            debounce_cg: threshold_g_to_cg(c.debounce_g),
            silence_timeout: Duration::from_millis(c.silence_timeout_ms),
            poll_interval: Duration::from_millis(c.poll_interval_ms),
            read_timeout: Duration::from_millis(c.read_timeout_ms),
            failure_threshold: c.failure_threshold,
            absent_backoff: Duration::from_millis(c.absent_backoff_ms),
        }
    }
}
