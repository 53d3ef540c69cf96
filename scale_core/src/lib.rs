#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Scale bridge core (hardware- and transport-agnostic).
//!
//! Reads go through `scale_traits::ReportSource`; the output is a stream of
//! [`PublishEvent`]s for whatever transport sits downstream.
//!
//! ## Architecture
//!
//! - **Decoding**: raw HID report to [`Reading`] (`decoder` module)
//! - **Status**: raw status byte to [`DeviceStatus`] (`status` module)
//! - **Stability**: debounce and status-change rules (`engine` module)
//! - **Availability**: unplug and silence detection (`availability` module)
//! - **Scheduling**: the single polling loop owning [`DeviceState`] (`scheduler` module)
//!
//! ## Fixed-Point Arithmetic
//!
//! Weights are carried in **centigrams** (cg, 1 cg = 0.01 g) as `i32` so
//! debounce comparisons are exact. See `fixed_point` for the conversions.

pub mod availability;
pub mod builder;
pub mod config;
pub mod conversions;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod event;
pub mod fixed_point;
pub mod mocks;
pub mod scheduler;
pub mod state;
pub mod status;

pub use availability::{AvailabilityMonitor, PollFailure};
pub use builder::BridgeBuilder;
pub use config::BridgeCfg;
pub use decoder::{DecodeError, Reading, Unit, decode};
pub use engine::StabilityEngine;
pub use error::{BuildError, Result};
pub use event::{EventKind, PublishEvent, WeightUpdate};
pub use scheduler::{Bridge, EmitError, EventSink, OperatorCommand, RunSummary, Tick};
pub use state::{Availability, DeviceState, Phase};
pub use status::{DeviceStatus, classify};
