//! DYMO M-series HID input report decoding.
//!
//! Layout of the 6-byte data report:
//!
//! | byte | field                                   |
//! |------|-----------------------------------------|
//! | 0    | report id                               |
//! | 1    | status (see [`crate::status::code`])    |
//! | 2    | unit (2 = grams, 11/12 = ounces)        |
//! | 3    | exponent, signed (`value * 10^exp`)     |
//! | 4-5  | weight magnitude, little-endian `u16`   |
//!
//! Some host stacks strip the report id, leaving 5 bytes with the same
//! fields shifted left by one; both forms are accepted.

use crate::fixed_point::{GRAMS_PER_OUNCE, quantize_to_cg_i32};
use crate::status::code;
use thiserror::Error;

/// Length of a data report including the report id.
pub const REPORT_LEN: usize = 6;
/// Report id of the weight data report.
pub const DATA_REPORT_ID: u8 = 3;

pub const UNIT_GRAMS: u8 = 2;
pub const UNIT_OUNCES: u8 = 11;
/// Pounds/ounces display mode; the magnitude is still in ounces.
pub const UNIT_POUNDS_OUNCES: u8 = 12;

/// Unit the scale was displaying when it produced the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Grams,
    Ounces,
}

impl Unit {
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Grams => "g",
            Unit::Ounces => "oz",
        }
    }
}

/// One decoded report. `weight_cg` is always in grams (centigram fixed point).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub weight_cg: i32,
    pub unit: Unit,
    pub raw_status: u8,
}

impl Reading {
    /// Same reading shifted by a zero reference.
    pub fn offset_by(self, zero_cg: i32) -> Self {
        Self {
            weight_cg: self.weight_cg.saturating_sub(zero_cg),
            ..self
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed report: expected {expected} bytes, got {actual}")]
    MalformedLength { expected: usize, actual: usize },
    #[error("unknown unit byte {0:#04x}")]
    UnknownUnit(u8),
}

/// Decode a raw HID report into a [`Reading`].
pub fn decode(report: &[u8]) -> Result<Reading, DecodeError> {
    let body = match report.len() {
        REPORT_LEN => &report[1..],
        n if n == REPORT_LEN - 1 => report,
        actual => {
            return Err(DecodeError::MalformedLength {
                expected: REPORT_LEN,
                actual,
            });
        }
    };
    let raw_status = body[0];
    let unit = match body[1] {
        UNIT_GRAMS => Unit::Grams,
        UNIT_OUNCES | UNIT_POUNDS_OUNCES => Unit::Ounces,
        other => return Err(DecodeError::UnknownUnit(other)),
    };
    let exponent = i32::from(body[2] as i8);
    let magnitude = f64::from(u16::from_le_bytes([body[3], body[4]]));

    let mut value = magnitude * 10f64.powi(exponent);
    if unit == Unit::Ounces {
        value *= GRAMS_PER_OUNCE;
    }
    // Under-zero readings carry the magnitude; the sign lives in the status byte.
    if raw_status == code::UNDER_ZERO {
        value = -value;
    }

    Ok(Reading {
        weight_cg: quantize_to_cg_i32(value),
        unit,
        raw_status,
    })
}

/// Build a data report in the same layout `decode` expects.
pub fn frame(status: u8, unit: u8, exponent: i8, magnitude: u16) -> [u8; REPORT_LEN] {
    let [lo, hi] = magnitude.to_le_bytes();
    [DATA_REPORT_ID, status, unit, exponent as u8, lo, hi]
}
