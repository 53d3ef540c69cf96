//! Hardware and transport seams shared across the bridge workspace.
//!
//! The core never talks to a device file or a broker directly; it reads
//! through [`ReportSource`] and the MQTT adapter writes through
//! [`Publisher`]. Both are small enough to mock in tests.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;
use thiserror::Error;

/// One raw HID input report, exactly as read from the device.
pub type RawReport = Vec<u8>;

/// Why a device read produced no report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// The device is present but produced nothing within the timeout (asleep or idle).
    #[error("timed out waiting for a report")]
    Timeout,
    /// No matching device node exists, or it disappeared mid-read (unplugged).
    #[error("device absent")]
    Absent,
    /// The device node exists but could not be opened or read.
    #[error("device io: {0}")]
    Io(String),
    /// The source does not implement the requested operation.
    #[error("operation not supported by this device")]
    Unsupported,
}

pub trait ReportSource {
    /// Read one report, waiting at most `timeout`. Must never block longer.
    fn read_report(&mut self, timeout: Duration) -> Result<RawReport, ReadError>;

    /// Ask the device to re-establish its zero reference.
    fn request_zero(&mut self) -> Result<(), ReadError> {
        Err(ReadError::Unsupported)
    }
}

impl<T: ReportSource + ?Sized> ReportSource for Box<T> {
    fn read_report(&mut self, timeout: Duration) -> Result<RawReport, ReadError> {
        (**self).read_report(timeout)
    }

    fn request_zero(&mut self) -> Result<(), ReadError> {
        (**self).request_zero()
    }
}

pub trait Publisher {
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
