//! Builder for [`Bridge`].
//!
//! A source is mandatory; config defaults to [`BridgeCfg::default`] and the
//! clock to [`MonotonicClock`]. `build` validates the config the same way
//! whether it came from a file or was assembled in code.

use scale_traits::ReportSource;
use scale_traits::clock::{Clock, MonotonicClock};

use crate::config::BridgeCfg;
use crate::error::{BuildError, Result};
use crate::scheduler::Bridge;

#[derive(Debug)]
pub struct BridgeBuilder<S, C = MonotonicClock> {
    source: Option<S>,
    clock: C,
    cfg: Option<BridgeCfg>,
}

impl<S> Default for BridgeBuilder<S, MonotonicClock> {
    fn default() -> Self {
        Self {
            source: None,
            clock: MonotonicClock::new(),
            cfg: None,
        }
    }
}

impl<S> BridgeBuilder<S, MonotonicClock> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S, C> BridgeBuilder<S, C> {
    pub fn with_source(mut self, source: S) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_config(mut self, cfg: BridgeCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    /// Swap the clock (tests inject a manual one).
    pub fn with_clock<C2: Clock>(self, clock: C2) -> BridgeBuilder<S, C2> {
        BridgeBuilder {
            source: self.source,
            clock,
            cfg: self.cfg,
        }
    }
}

impl<S: ReportSource, C: Clock> BridgeBuilder<S, C> {
    pub fn build(self) -> std::result::Result<Bridge<S, C>, BuildError> {
        let source = self.source.ok_or(BuildError::MissingSource)?;
        let cfg = self.cfg.unwrap_or_default();
        validate(&cfg)?;
        Ok(Bridge::from_parts(source, self.clock, cfg))
    }

    /// Like [`build`](Self::build) but with the error wrapped in an `eyre::Report`.
    pub fn try_build(self) -> Result<Bridge<S, C>> {
        self.build().map_err(eyre::Report::new)
    }
}

fn validate(cfg: &BridgeCfg) -> std::result::Result<(), BuildError> {
    if cfg.debounce_cg == 0 {
        return Err(BuildError::InvalidConfig("debounce threshold must be >= 0.01 g"));
    }
    if cfg.failure_threshold == 0 {
        return Err(BuildError::InvalidConfig("failure_threshold must be >= 1"));
    }
    if cfg.read_timeout.is_zero() {
        return Err(BuildError::InvalidConfig("read_timeout must be > 0"));
    }
    if cfg.poll_interval.is_zero() {
        return Err(BuildError::InvalidConfig("poll_interval must be > 0"));
    }
    if cfg.silence_timeout <= cfg.read_timeout {
        return Err(BuildError::InvalidConfig(
            "silence_timeout must exceed read_timeout",
        ));
    }
    if cfg.absent_backoff < cfg.poll_interval {
        return Err(BuildError::InvalidConfig(
            "absent_backoff must be >= poll_interval",
        ));
    }
    Ok(())
}
