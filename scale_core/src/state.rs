//! The per-scale state aggregate.
//!
//! Exactly one `DeviceState` exists per physical scale. It is owned by the
//! scheduler and only mutated by the stability engine and the availability
//! monitor; everything else sees `Copy` snapshots.

use crate::decoder::Reading;
use crate::status::DeviceStatus;
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Online,
    Offline,
}

impl Availability {
    /// Payload published on the availability topic.
    pub fn as_str(self) -> &'static str {
        match self {
            Availability::Online => "online",
            Availability::Offline => "offline",
        }
    }

    #[inline]
    pub fn is_online(self) -> bool {
        matches!(self, Availability::Online)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stability engine phase, derived from whether a reading is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No reading since process start or since the last offline transition.
    Idle,
    /// At least one reading received while online.
    Tracking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceState {
    pub last_reading: Option<Reading>,
    pub last_status: Option<DeviceStatus>,
    pub availability: Availability,
    pub last_seen: Option<Instant>,
    pub last_published: Option<Reading>,
    /// Zero reference (centigrams) subtracted from decoded weights after a tare.
    pub tare_offset_cg: i32,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceState {
    /// Fresh state: offline until the first successful decode.
    pub const fn new() -> Self {
        Self {
            last_reading: None,
            last_status: None,
            availability: Availability::Offline,
            last_seen: None,
            last_published: None,
            tare_offset_cg: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.last_reading.is_some() {
            Phase::Tracking
        } else {
            Phase::Idle
        }
    }
}
