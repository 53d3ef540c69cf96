//! The single polling loop that owns the device state.
//!
//! One tick is: bounded read, silence check, decode, availability, engine,
//! then any queued operator commands. Reads never block longer than
//! `read_timeout`, so shutdown and button presses are noticed within one
//! read plus one wait slice.
//!
//! The loop hands events to an [`EventSink`] without blocking. A slow or
//! disconnected consumer costs dropped weight and status events, never a
//! stalled poll. Availability changes are not dropped on a full queue: the
//! latest one waits up to one wait slice, then is held and retried on the
//! following ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use scale_traits::clock::{Clock, MonotonicClock};
use scale_traits::{ReadError, ReportSource};

use crate::availability::{AvailabilityMonitor, PollFailure};
use crate::builder::BridgeBuilder;
use crate::config::BridgeCfg;
use crate::decoder::decode;
use crate::engine::StabilityEngine;
use crate::event::PublishEvent;
use crate::state::DeviceState;

/// Longest uninterrupted wait between shutdown checks.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Requests from physical buttons (or anything else acting as the operator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Re-zero the scale.
    Tare,
    /// Publish the current weight now, ignoring the debounce threshold.
    Send,
}

/// Outcome of one scheduler iteration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tick {
    pub events: Vec<PublishEvent>,
    /// How long to wait before the next tick.
    pub next_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitError {
    Full,
    Disconnected,
}

/// Non-blocking destination for publish events.
pub trait EventSink {
    fn try_emit(&mut self, event: PublishEvent) -> Result<(), EmitError>;

    /// Like [`try_emit`](Self::try_emit) but may wait up to `timeout` for room.
    fn emit_within(&mut self, event: PublishEvent, timeout: Duration) -> Result<(), EmitError> {
        let _ = timeout;
        self.try_emit(event)
    }
}

impl<T: From<PublishEvent>> EventSink for xch::Sender<T> {
    fn try_emit(&mut self, event: PublishEvent) -> Result<(), EmitError> {
        self.try_send(T::from(event)).map_err(|e| match e {
            xch::TrySendError::Full(_) => EmitError::Full,
            xch::TrySendError::Disconnected(_) => EmitError::Disconnected,
        })
    }

    fn emit_within(&mut self, event: PublishEvent, timeout: Duration) -> Result<(), EmitError> {
        self.send_timeout(T::from(event), timeout)
            .map_err(|e| match e {
                xch::SendTimeoutError::Timeout(_) => EmitError::Full,
                xch::SendTimeoutError::Disconnected(_) => EmitError::Disconnected,
            })
    }
}

impl EventSink for Vec<PublishEvent> {
    fn try_emit(&mut self, event: PublishEvent) -> Result<(), EmitError> {
        self.push(event);
        Ok(())
    }
}

/// Counters returned when [`Bridge::run`] exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub emitted: u64,
    pub dropped: u64,
}

pub struct Bridge<S, C = MonotonicClock> {
    source: S,
    clock: C,
    cfg: BridgeCfg,
    state: DeviceState,
    engine: StabilityEngine,
    monitor: AvailabilityMonitor,
}

impl<S, C> core::fmt::Debug for Bridge<S, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bridge")
            .field("cfg", &self.cfg)
            .field("state", &self.state)
            .field("failures", &self.monitor.consecutive_failures())
            .finish_non_exhaustive()
    }
}

impl<S: ReportSource> Bridge<S, MonotonicClock> {
    pub fn builder() -> BridgeBuilder<S, MonotonicClock> {
        BridgeBuilder::new()
    }
}

impl<S: ReportSource, C: Clock> Bridge<S, C> {
    pub(crate) fn from_parts(source: S, clock: C, cfg: BridgeCfg) -> Self {
        Self {
            engine: StabilityEngine::new(cfg.debounce_cg),
            monitor: AvailabilityMonitor::new(
                cfg.failure_threshold,
                cfg.silence_timeout,
                cfg.poll_interval,
                cfg.absent_backoff,
            ),
            state: DeviceState::new(),
            source,
            clock,
            cfg,
        }
    }

    /// Copy of the current device state.
    pub fn snapshot(&self) -> DeviceState {
        self.state
    }

    pub fn config(&self) -> &BridgeCfg {
        &self.cfg
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run one iteration and return the events it produced.
    pub fn tick(&mut self, commands: impl IntoIterator<Item = OperatorCommand>) -> Tick {
        let mut events = Vec::new();
        let result = self.source.read_report(self.cfg.read_timeout);
        let now = self.clock.now();

        // A report that ends a long silence must first be seen as a recovery.
        self.monitor
            .check_silence(&mut self.state, &self.engine, now, &mut events);

        match result {
            Ok(raw) => match decode(&raw) {
                Ok(reading) => {
                    self.monitor.on_report(&mut self.state, &mut events);
                    self.engine.apply(&mut self.state, reading, now, &mut events);
                }
                Err(e) => {
                    tracing::warn!(error = %e, len = raw.len(), "skipping undecodable report");
                }
            },
            Err(err) => {
                let failure = match err {
                    ReadError::Timeout => PollFailure::Silent,
                    ReadError::Absent => PollFailure::Absent,
                    ReadError::Io(ref msg) => {
                        tracing::debug!(error = %msg, "device read failed");
                        PollFailure::Io
                    }
                    ReadError::Unsupported => {
                        tracing::debug!("source cannot read reports");
                        PollFailure::Io
                    }
                };
                self.monitor
                    .on_failure(&mut self.state, &self.engine, failure, &mut events);
            }
        }

        for cmd in commands {
            self.handle_command(cmd, &mut events);
        }

        Tick {
            events,
            next_delay: self.monitor.retry_delay(),
        }
    }

    fn handle_command(&mut self, cmd: OperatorCommand, events: &mut Vec<PublishEvent>) {
        match cmd {
            OperatorCommand::Send => {
                if !self.engine.force_publish(&mut self.state, events) {
                    tracing::debug!("send ignored: no current reading");
                }
            }
            OperatorCommand::Tare => match self.source.request_zero() {
                Ok(()) => {
                    tracing::info!("device zero requested");
                    self.engine.clear_tare(&mut self.state);
                }
                Err(ReadError::Unsupported) => {
                    if !self.engine.tare(&mut self.state, events) {
                        tracing::debug!("tare ignored: no current reading");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "tare request failed"),
            },
        }
    }

    /// Poll until `shutdown` is set.
    ///
    /// Commands arriving during the inter-poll wait cut the wait short so a
    /// button press is handled on the next tick.
    pub fn run<K: EventSink>(
        &mut self,
        sink: &mut K,
        commands: &xch::Receiver<OperatorCommand>,
        shutdown: &AtomicBool,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut pending: Vec<OperatorCommand> = Vec::new();
        let mut held: Option<PublishEvent> = None;
        let mut sink_gone = false;
        tracing::info!(
            debounce_cg = self.cfg.debounce_cg,
            poll_interval = ?self.cfg.poll_interval,
            "bridge loop start"
        );

        while !shutdown.load(Ordering::Relaxed) {
            pending.extend(commands.try_iter());
            let tick = self.tick(pending.drain(..));
            summary.ticks += 1;

            // A newer availability change supersedes the held one.
            let retry = held
                .take()
                .filter(|_| !tick.events.iter().any(is_availability));
            for event in retry.into_iter().chain(tick.events) {
                let sent = if is_availability(&event) {
                    sink.emit_within(event, WAIT_SLICE)
                } else {
                    sink.try_emit(event)
                };
                match sent {
                    Ok(()) => summary.emitted += 1,
                    Err(EmitError::Full) if is_availability(&event) => {
                        tracing::warn!(?event, "event queue full; holding availability change");
                        held = Some(event);
                    }
                    Err(EmitError::Full) => {
                        summary.dropped += 1;
                        tracing::warn!(kind = ?event.kind(), "event queue full; dropping");
                    }
                    Err(EmitError::Disconnected) => {
                        summary.dropped += 1;
                        if !sink_gone {
                            sink_gone = true;
                            tracing::error!("event consumer gone; events are being dropped");
                        }
                    }
                }
            }

            wait_for_next_tick(tick.next_delay, commands, shutdown, &mut pending);
        }

        tracing::info!(ticks = summary.ticks, dropped = summary.dropped, "bridge loop stop");
        summary
    }
}

fn is_availability(event: &PublishEvent) -> bool {
    matches!(event, PublishEvent::Availability(_))
}

/// Sleep up to `delay` in slices, returning early on shutdown or a command.
fn wait_for_next_tick(
    delay: Duration,
    commands: &xch::Receiver<OperatorCommand>,
    shutdown: &AtomicBool,
    pending: &mut Vec<OperatorCommand>,
) {
    let deadline = Instant::now() + delay;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        match commands.recv_timeout(remaining.min(WAIT_SLICE)) {
            Ok(cmd) => {
                pending.push(cmd);
                return;
            }
            Err(xch::RecvTimeoutError::Timeout) => {}
            Err(xch::RecvTimeoutError::Disconnected) => {
                std::thread::sleep(remaining.min(WAIT_SLICE));
            }
        }
    }
}
