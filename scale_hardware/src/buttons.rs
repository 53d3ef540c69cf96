//! Push buttons wired to GPIO inputs with pull-ups (pressed = low).

use std::time::{Duration, Instant};

/// One accepted level change on a button pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEdge {
    pub pin: u8,
    pub pressed: bool,
}

/// Contact-bounce filter for a single input.
///
/// An edge is accepted when it changes the debounced level and at least
/// `bounce` has passed since the last accepted edge.
#[derive(Debug, Clone)]
pub struct EdgeDebouncer {
    bounce: Duration,
    pressed: bool,
    last_change: Option<Instant>,
}

impl EdgeDebouncer {
    /// Starts released, matching an idle pull-up input.
    pub fn new(bounce: Duration) -> Self {
        Self {
            bounce,
            pressed: false,
            last_change: None,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn accept(&mut self, pressed: bool, now: Instant) -> bool {
        if pressed == self.pressed {
            return false;
        }
        if let Some(t) = self.last_change
            && now.saturating_duration_since(t) < self.bounce
        {
            return false;
        }
        self.pressed = pressed;
        self.last_change = Some(now);
        true
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use gpio::ButtonWatcher;

#[cfg(all(feature = "hardware", target_os = "linux"))]
mod gpio {
    use super::{ButtonEdge, EdgeDebouncer};
    use crate::error::{HwError, Result};
    use rppal::gpio::{Gpio, InputPin, Level, Trigger};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// Keeps the interrupt-armed pins alive; dropping it disarms them.
    pub struct ButtonWatcher {
        pins: Vec<InputPin>,
    }

    impl std::fmt::Debug for ButtonWatcher {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            let pins: Vec<u8> = self.pins.iter().map(InputPin::pin).collect();
            f.debug_struct("ButtonWatcher").field("pins", &pins).finish()
        }
    }

    impl ButtonWatcher {
        /// Arm both-edge interrupts on `pins`; `on_edge` runs on rppal's interrupt thread.
        pub fn start<F>(pins: &[u8], bounce: Duration, on_edge: F) -> Result<Self>
        where
            F: Fn(ButtonEdge) + Send + Sync + 'static,
        {
            let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
            let on_edge = Arc::new(on_edge);
            let mut armed = Vec::with_capacity(pins.len());

            for &pin in pins {
                let mut input = gpio
                    .get(pin)
                    .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))?
                    .into_input_pullup();
                let mut debouncer = EdgeDebouncer::new(bounce);
                let cb = Arc::clone(&on_edge);
                input
                    .set_async_interrupt(Trigger::Both, move |level: Level| {
                        let pressed = level == Level::Low;
                        if debouncer.accept(pressed, Instant::now()) {
                            cb(ButtonEdge { pin, pressed });
                        }
                    })
                    .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))?;
                tracing::info!(pin, "button armed");
                armed.push(input);
            }

            Ok(Self { pins: armed })
        }
    }
}
