//! Simulated scale for `--simulate` runs and tests.
//!
//! Walks through a list of target weights. Each change of target produces a
//! few `IN_MOTION` reports before the reading settles to `STABLE`, like an
//! item being placed on the platform.

use scale_core::decoder::{UNIT_GRAMS, frame};
use scale_core::status::code;
use scale_traits::{RawReport, ReadError, ReportSource};
use std::time::Duration;

const DEFAULT_SETTLE_READS: u32 = 3;

#[derive(Debug, Clone)]
pub struct SimulatedScale {
    /// Target weights in grams, visited in order and then repeated.
    pattern: Vec<f64>,
    /// Reads spent on each pattern entry.
    hold_reads: u32,
    settle_reads: u32,
    jitter_g: u16,
    zero_g: f64,
    index: usize,
    reads_on_step: u32,
    rng: u32,
}

impl SimulatedScale {
    /// A scale holding `grams` forever.
    pub fn steady(grams: f64) -> Self {
        Self::pattern(vec![grams], u32::MAX)
    }

    /// Cycle through `pattern`, spending `hold_reads` reads on each weight.
    pub fn pattern(pattern: Vec<f64>, hold_reads: u32) -> Self {
        let pattern = if pattern.is_empty() {
            vec![0.0]
        } else {
            pattern
        };
        Self {
            pattern,
            hold_reads: hold_reads.max(1),
            settle_reads: DEFAULT_SETTLE_READS,
            jitter_g: 0,
            zero_g: 0.0,
            index: 0,
            reads_on_step: 0,
            rng: 0x9e37_79b9,
        }
    }

    /// Demo sequence: empty platform, a letter, a parcel, empty again.
    pub fn demo() -> Self {
        Self::pattern(vec![0.0, 21.0, 480.0, 1250.0, 0.0], 50).with_jitter(1)
    }

    /// Add up to `grams` of deterministic noise to stable readings.
    pub fn with_jitter(mut self, grams: u16) -> Self {
        self.jitter_g = grams;
        self
    }

    pub fn with_settle_reads(mut self, reads: u32) -> Self {
        self.settle_reads = reads;
        self
    }

    fn next_noise(&mut self) -> f64 {
        if self.jitter_g == 0 {
            return 0.0;
        }
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        let span = u32::from(self.jitter_g) * 2 + 1;
        f64::from(x % span) - f64::from(self.jitter_g)
    }

    fn current_target(&self) -> f64 {
        self.pattern[self.index % self.pattern.len()]
    }

    fn advance(&mut self) {
        self.reads_on_step += 1;
        if self.reads_on_step >= self.hold_reads {
            self.reads_on_step = 0;
            self.index = (self.index + 1) % self.pattern.len();
        }
    }

    fn encode(status: u8, grams: f64) -> RawReport {
        let (status, magnitude) = if grams < 0.0 {
            (code::UNDER_ZERO, -grams)
        } else {
            (status, grams)
        };
        let magnitude = magnitude.round().clamp(0.0, f64::from(u16::MAX)) as u16;
        frame(status, UNIT_GRAMS, 0, magnitude).to_vec()
    }
}

impl ReportSource for SimulatedScale {
    fn read_report(&mut self, _timeout: Duration) -> Result<RawReport, ReadError> {
        let target = self.current_target() - self.zero_g;
        let report = if self.reads_on_step < self.settle_reads && self.pattern.len() > 1 {
            // Approach the target while the platform is still moving.
            let fraction = f64::from(self.reads_on_step + 1) / f64::from(self.settle_reads + 1);
            Self::encode(code::IN_MOTION, target * fraction)
        } else {
            let noise = self.next_noise();
            Self::encode(code::STABLE, target + noise)
        };
        self.advance();
        Ok(report)
    }

    fn request_zero(&mut self) -> Result<(), ReadError> {
        self.zero_g = self.current_target();
        tracing::info!(zero_g = self.zero_g, "simulated scale zeroed");
        Ok(())
    }
}
