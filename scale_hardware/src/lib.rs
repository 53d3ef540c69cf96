//! Device-side implementations for the scale bridge.
//!
//! - [`HidrawScale`]: USB HID scale via Linux hidraw (Linux only).
//! - [`SimulatedScale`]: deterministic stand-in for `--simulate` and tests.
//! - [`buttons`]: GPIO push buttons (`hardware` feature for the watcher).
pub mod buttons;
pub mod error;
#[cfg(target_os = "linux")]
pub mod hidraw;
pub mod simulated;

pub use buttons::{ButtonEdge, EdgeDebouncer};
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use buttons::ButtonWatcher;
pub use error::HwError;
#[cfg(target_os = "linux")]
pub use hidraw::HidrawScale;
pub use simulated::SimulatedScale;
