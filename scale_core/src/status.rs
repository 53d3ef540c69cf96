//! Device status taxonomy and the raw status-code classifier.
//!
//! Codes follow the USB HID point-of-sale scale usage table. The mapping is
//! total: anything unrecognised is a `Fault`, never an error.

use std::fmt;
use std::str::FromStr;

/// Raw status byte values reported by the scale.
pub mod code {
    pub const FAULT: u8 = 1;
    pub const STABLE_AT_ZERO: u8 = 2;
    pub const IN_MOTION: u8 = 3;
    pub const STABLE: u8 = 4;
    pub const UNDER_ZERO: u8 = 5;
    pub const OVER_WEIGHT: u8 = 6;
    pub const REQUIRES_CALIBRATION: u8 = 7;
    pub const REQUIRES_REZERO: u8 = 8;
}

/// Semantic status of the scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    Stable,
    InMotion,
    UnderZero,
    Overload,
    Zeroing,
    Negative,
    Fault,
}

impl DeviceStatus {
    pub const ALL: [DeviceStatus; 7] = [
        DeviceStatus::Stable,
        DeviceStatus::InMotion,
        DeviceStatus::UnderZero,
        DeviceStatus::Overload,
        DeviceStatus::Zeroing,
        DeviceStatus::Negative,
        DeviceStatus::Fault,
    ];

    /// Wire name published on the status topic.
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Stable => "STABLE",
            DeviceStatus::InMotion => "IN_MOTION",
            DeviceStatus::UnderZero => "UNDER_ZERO",
            DeviceStatus::Overload => "OVERLOAD",
            DeviceStatus::Zeroing => "ZEROING",
            DeviceStatus::Negative => "NEGATIVE",
            DeviceStatus::Fault => "FAULT",
        }
    }

    #[inline]
    pub fn is_stable(self) -> bool {
        matches!(self, DeviceStatus::Stable)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown device status {0:?}")]
pub struct ParseStatusError(pub String);

impl FromStr for DeviceStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// Map a raw status byte onto the closed status taxonomy.
pub fn classify(raw_status: u8) -> DeviceStatus {
    match raw_status {
        code::STABLE => DeviceStatus::Stable,
        code::IN_MOTION => DeviceStatus::InMotion,
        code::UNDER_ZERO => DeviceStatus::UnderZero,
        code::OVER_WEIGHT => DeviceStatus::Overload,
        code::STABLE_AT_ZERO => DeviceStatus::Zeroing,
        code::REQUIRES_REZERO => DeviceStatus::Negative,
        // FAULT, REQUIRES_CALIBRATION and anything the firmware invents.
        _ => DeviceStatus::Fault,
    }
}
