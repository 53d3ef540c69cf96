#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! MQTT side of the scale bridge.
//!
//! [`MqttAdapter`] turns core events into topic payloads and is the only
//! component that publishes. [`MqttTransport`] is the rumqttc connection it
//! publishes through.
pub mod adapter;
pub mod discovery;
pub mod topics;
pub mod transport;

pub use adapter::{MqttAdapter, Outbound, format_weight};
pub use discovery::{DiscoveryMessage, discovery_messages};
pub use topics::Topics;
pub use transport::{MqttTransport, RumqttPublisher, TransportError};
