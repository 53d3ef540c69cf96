//! Events handed from the core to the MQTT adapter.

use crate::decoder::{Reading, Unit};
use crate::state::Availability;
use crate::status::{DeviceStatus, classify};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    WeightUpdate,
    StatusUpdate,
    AvailabilityChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightUpdate {
    pub weight_cg: i32,
    pub unit: Unit,
    pub status: DeviceStatus,
    /// Emitted by an operator override rather than by the debounce rule.
    pub forced: bool,
}

impl WeightUpdate {
    pub fn from_reading(reading: &Reading, forced: bool) -> Self {
        Self {
            weight_cg: reading.weight_cg,
            unit: reading.unit,
            status: classify(reading.raw_status),
            forced,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishEvent {
    Weight(WeightUpdate),
    Status(DeviceStatus),
    Availability(Availability),
}

impl PublishEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PublishEvent::Weight(_) => EventKind::WeightUpdate,
            PublishEvent::Status(_) => EventKind::StatusUpdate,
            PublishEvent::Availability(_) => EventKind::AvailabilityChange,
        }
    }

    /// Weight in centigrams when this is a weight update.
    pub fn weight_cg(&self) -> Option<i32> {
        match self {
            PublishEvent::Weight(w) => Some(w.weight_cg),
            _ => None,
        }
    }
}
