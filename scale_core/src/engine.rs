//! Stability & debounce engine.
//!
//! Turns the stream of decoded readings into the minimal set of weight and
//! status events. Status changes are rare and always reported; weight
//! changes are noisy and coalesced by the debounce threshold.
//!
//! Rules per reading (the device must already be online):
//! 1. `last_seen` is refreshed unconditionally.
//! 2. A status differing from the previous one emits a status update. The
//!    first status after a fresh start is seeded silently; the weight update
//!    that always follows carries it.
//! 3. A weight update is emitted when `|weight - last_published| >= threshold`,
//!    when nothing has been published since the fresh start, or when the
//!    status moved into or out of `Stable` and the weight differs at all.
//! 4. `last_reading` is always replaced.

use crate::decoder::Reading;
use crate::event::{PublishEvent, WeightUpdate};
use crate::fixed_point::abs_diff_i32_u32;
use crate::state::DeviceState;
use crate::status::classify;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct StabilityEngine {
    debounce_cg: u32,
}

impl StabilityEngine {
    pub fn new(debounce_cg: u32) -> Self {
        Self { debounce_cg }
    }

    pub fn debounce_cg(&self) -> u32 {
        self.debounce_cg
    }

    /// Feed one decoded reading. Events are appended to `out`.
    pub fn apply(
        &self,
        state: &mut DeviceState,
        reading: Reading,
        now: Instant,
        out: &mut Vec<PublishEvent>,
    ) {
        state.last_seen = Some(now);
        if !state.availability.is_online() {
            tracing::warn!("reading applied while offline; ignoring");
            return;
        }

        let reading = reading.offset_by(state.tare_offset_cg);
        let status = classify(reading.raw_status);

        let stability_flip = match state.last_status.replace(status) {
            Some(prev) if prev != status => {
                tracing::debug!(from = %prev, to = %status, "status change");
                out.push(PublishEvent::Status(status));
                prev.is_stable() != status.is_stable()
            }
            _ => false,
        };

        let publish = match state.last_published {
            None => true,
            Some(prev) => {
                let delta = abs_diff_i32_u32(reading.weight_cg, prev.weight_cg);
                delta >= self.debounce_cg || (stability_flip && delta > 0)
            }
        };
        if publish {
            tracing::trace!(weight_cg = reading.weight_cg, %status, "weight update");
            out.push(PublishEvent::Weight(WeightUpdate::from_reading(
                &reading, false,
            )));
            state.last_published = Some(reading);
        }

        state.last_reading = Some(reading);
    }

    /// Forget everything published so the first reading after recovery is
    /// treated as a fresh start.
    pub fn reset_for_offline(&self, state: &mut DeviceState) {
        state.last_published = None;
        state.last_reading = None;
        state.last_status = None;
    }

    /// Operator override: publish the current reading regardless of debounce.
    ///
    /// Returns `false` (and emits nothing) while offline or before the first reading.
    pub fn force_publish(&self, state: &mut DeviceState, out: &mut Vec<PublishEvent>) -> bool {
        if !state.availability.is_online() {
            return false;
        }
        let Some(reading) = state.last_reading else {
            return false;
        };
        out.push(PublishEvent::Weight(WeightUpdate::from_reading(
            &reading, true,
        )));
        state.last_published = Some(reading);
        true
    }

    /// Software tare: make the current reading the new zero and publish it.
    pub fn tare(&self, state: &mut DeviceState, out: &mut Vec<PublishEvent>) -> bool {
        if !state.availability.is_online() {
            return false;
        }
        let Some(reading) = state.last_reading else {
            return false;
        };
        state.tare_offset_cg = state.tare_offset_cg.saturating_add(reading.weight_cg);
        state.last_reading = Some(reading.offset_by(reading.weight_cg));
        tracing::info!(zero_offset_cg = state.tare_offset_cg, "software tare applied");
        self.force_publish(state, out)
    }

    /// Drop the software zero reference (the device re-zeroed itself).
    ///
    /// The next reading is published unconditionally so the new zero shows up
    /// even when it lands within the threshold of the old value.
    pub fn clear_tare(&self, state: &mut DeviceState) {
        state.tare_offset_cg = 0;
        state.last_published = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Unit;
    use crate::state::Availability;
    use crate::status::{DeviceStatus, code};

    fn reading(weight_g: i32, raw_status: u8) -> Reading {
        Reading {
            weight_cg: weight_g * 100,
            unit: Unit::Grams,
            raw_status,
        }
    }

    fn online() -> DeviceState {
        DeviceState {
            availability: Availability::Online,
            ..DeviceState::new()
        }
    }

    #[test]
    fn first_reading_publishes_weight_only() {
        let engine = StabilityEngine::new(500);
        let mut state = online();
        let mut out = Vec::new();
        engine.apply(&mut state, reading(1000, code::STABLE), Instant::now(), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].weight_cg(), Some(100_000));
        assert_eq!(state.last_status, Some(DeviceStatus::Stable));
    }

    #[test]
    fn offline_state_emits_nothing() {
        let engine = StabilityEngine::new(500);
        let mut state = DeviceState::new();
        let mut out = Vec::new();
        let now = Instant::now();
        engine.apply(&mut state, reading(1000, code::STABLE), now, &mut out);
        assert!(out.is_empty());
        assert_eq!(state.last_seen, Some(now));
        assert!(state.last_reading.is_none());
    }

    #[test]
    fn stability_flip_publishes_small_change() {
        let engine = StabilityEngine::new(500);
        let mut state = online();
        let mut out = Vec::new();
        let now = Instant::now();
        engine.apply(&mut state, reading(1000, code::IN_MOTION), now, &mut out);
        out.clear();
        engine.apply(&mut state, reading(1001, code::STABLE), now, &mut out);
        assert_eq!(
            out,
            vec![
                PublishEvent::Status(DeviceStatus::Stable),
                PublishEvent::Weight(WeightUpdate {
                    weight_cg: 100_100,
                    unit: Unit::Grams,
                    status: DeviceStatus::Stable,
                    forced: false,
                }),
            ]
        );
    }

    #[test]
    fn tare_rezeroes_and_publishes_zero() {
        let engine = StabilityEngine::new(500);
        let mut state = online();
        let mut out = Vec::new();
        let now = Instant::now();
        engine.apply(&mut state, reading(250, code::STABLE), now, &mut out);
        out.clear();
        assert!(engine.tare(&mut state, &mut out));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].weight_cg(), Some(0));
        out.clear();
        engine.apply(&mut state, reading(260, code::STABLE), now, &mut out);
        assert_eq!(out[0].weight_cg(), Some(1_000));
    }

    #[test]
    fn force_publish_requires_a_reading() {
        let engine = StabilityEngine::new(500);
        let mut state = online();
        let mut out = Vec::new();
        assert!(!engine.force_publish(&mut state, &mut out));
        assert!(out.is_empty());
    }
}
