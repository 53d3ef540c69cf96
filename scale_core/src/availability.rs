//! Online/offline classification of the scale.
//!
//! Two failure inputs feed the same two-state machine:
//! - `Absent`/`Io`: the device node is missing or unreadable (unplugged).
//!   These count toward `failure_threshold` consecutive polls.
//! - `Silent`: the device is open but produced nothing within the read
//!   timeout (asleep). The device was opened, so this breaks a failure
//!   streak; the silence timer decides.
//!
//! Every transition emits exactly one availability event and repeated
//! inputs in the same state emit nothing.

use crate::engine::StabilityEngine;
use crate::event::PublishEvent;
use crate::state::{Availability, DeviceState};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollFailure {
    /// No device node, or it vanished mid-read.
    Absent,
    /// The node exists but open/read failed.
    Io,
    /// Read timed out with the device still present.
    Silent,
}

#[derive(Debug, Clone)]
pub struct AvailabilityMonitor {
    failure_threshold: u32,
    silence_timeout: Duration,
    poll_interval: Duration,
    absent_backoff: Duration,
    consecutive_failures: u32,
    last_failure: Option<PollFailure>,
}

impl AvailabilityMonitor {
    pub fn new(
        failure_threshold: u32,
        silence_timeout: Duration,
        poll_interval: Duration,
        absent_backoff: Duration,
    ) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            silence_timeout,
            poll_interval,
            absent_backoff,
            consecutive_failures: 0,
            last_failure: None,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// A report was read and decoded.
    pub fn on_report(&mut self, state: &mut DeviceState, out: &mut Vec<PublishEvent>) {
        self.consecutive_failures = 0;
        self.last_failure = None;
        if !state.availability.is_online() {
            tracing::info!("scale online");
            state.availability = Availability::Online;
            out.push(PublishEvent::Availability(Availability::Online));
        }
    }

    /// A poll produced no report.
    pub fn on_failure(
        &mut self,
        state: &mut DeviceState,
        engine: &StabilityEngine,
        failure: PollFailure,
        out: &mut Vec<PublishEvent>,
    ) {
        self.last_failure = Some(failure);
        if failure == PollFailure::Silent {
            self.consecutive_failures = 0;
            return;
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= self.failure_threshold {
            self.go_offline(state, engine, out, "device unavailable");
        }
    }

    /// Check the silence timer against `now`.
    pub fn check_silence(
        &mut self,
        state: &mut DeviceState,
        engine: &StabilityEngine,
        now: Instant,
        out: &mut Vec<PublishEvent>,
    ) {
        if !state.availability.is_online() {
            return;
        }
        let Some(seen) = state.last_seen else {
            return;
        };
        if now.saturating_duration_since(seen) > self.silence_timeout {
            self.go_offline(state, engine, out, "device silent");
        }
    }

    /// Delay before the next poll: longer while the device is unplugged.
    pub fn retry_delay(&self) -> Duration {
        match self.last_failure {
            Some(PollFailure::Absent) => self.absent_backoff,
            _ => self.poll_interval,
        }
    }

    fn go_offline(
        &mut self,
        state: &mut DeviceState,
        engine: &StabilityEngine,
        out: &mut Vec<PublishEvent>,
        reason: &'static str,
    ) {
        if !state.availability.is_online() {
            return;
        }
        tracing::warn!(
            reason,
            failures = self.consecutive_failures,
            "scale offline"
        );
        state.availability = Availability::Offline;
        engine.reset_for_offline(state);
        out.push(PublishEvent::Availability(Availability::Offline));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(threshold: u32) -> AvailabilityMonitor {
        AvailabilityMonitor::new(
            threshold,
            Duration::from_secs(30),
            Duration::from_millis(100),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn first_report_turns_online_once() {
        let mut m = monitor(3);
        let mut state = DeviceState::new();
        let mut out = Vec::new();
        m.on_report(&mut state, &mut out);
        m.on_report(&mut state, &mut out);
        assert_eq!(out, vec![PublishEvent::Availability(Availability::Online)]);
    }

    #[test]
    fn silent_polls_do_not_count_as_failures() {
        let engine = StabilityEngine::new(100);
        let mut m = monitor(1);
        let mut state = DeviceState::new();
        let mut out = Vec::new();
        m.on_report(&mut state, &mut out);
        out.clear();
        for _ in 0..10 {
            m.on_failure(&mut state, &engine, PollFailure::Silent, &mut out);
        }
        assert!(out.is_empty());
        assert_eq!(m.consecutive_failures(), 0);
    }

    #[test]
    fn silent_poll_resets_absent_streak() {
        let engine = StabilityEngine::new(100);
        let mut m = monitor(3);
        let mut state = DeviceState::new();
        let mut out = Vec::new();
        m.on_report(&mut state, &mut out);
        out.clear();
        m.on_failure(&mut state, &engine, PollFailure::Absent, &mut out);
        m.on_failure(&mut state, &engine, PollFailure::Absent, &mut out);
        m.on_failure(&mut state, &engine, PollFailure::Silent, &mut out);
        assert_eq!(m.consecutive_failures(), 0);
        m.on_failure(&mut state, &engine, PollFailure::Absent, &mut out);
        assert!(out.is_empty());
        assert_eq!(m.consecutive_failures(), 1);
    }

    #[test]
    fn absent_uses_longer_backoff() {
        let engine = StabilityEngine::new(100);
        let mut m = monitor(3);
        let mut state = DeviceState::new();
        let mut out = Vec::new();
        assert_eq!(m.retry_delay(), Duration::from_millis(100));
        m.on_failure(&mut state, &engine, PollFailure::Absent, &mut out);
        assert_eq!(m.retry_delay(), Duration::from_secs(5));
        m.on_failure(&mut state, &engine, PollFailure::Io, &mut out);
        assert_eq!(m.retry_delay(), Duration::from_millis(100));
        m.on_report(&mut state, &mut out);
        assert_eq!(m.retry_delay(), Duration::from_millis(100));
    }

    #[test]
    fn silence_timeout_is_strict() {
        let engine = StabilityEngine::new(100);
        let mut m = monitor(3);
        let mut state = DeviceState::new();
        let mut out = Vec::new();
        let t0 = Instant::now();
        m.on_report(&mut state, &mut out);
        state.last_seen = Some(t0);
        out.clear();
        m.check_silence(&mut state, &engine, t0 + Duration::from_secs(30), &mut out);
        assert!(out.is_empty());
        m.check_silence(
            &mut state,
            &engine,
            t0 + Duration::from_millis(30_001),
            &mut out,
        );
        assert_eq!(out, vec![PublishEvent::Availability(Availability::Offline)]);
    }
}
