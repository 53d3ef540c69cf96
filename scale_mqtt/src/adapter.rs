//! The bridge adapter: the only place publish events meet the broker.
//!
//! Runs on its own thread and consumes [`Outbound`] messages. Retained state
//! payloads are cached per topic and replayed whenever a new broker session
//! starts, so the core never has to re-emit anything after a reconnect.

use std::collections::BTreeMap;

use crossbeam_channel as xch;
use scale_core::{Availability, PublishEvent, WeightUpdate};
use scale_core::fixed_point::cg_to_grams;
use scale_traits::Publisher;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::discovery::DiscoveryMessage;
use crate::topics::Topics;

/// Messages for the adapter thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Event(PublishEvent),
    /// A debounced button edge; `id` is the button slug.
    Button { id: String, pressed: bool },
    /// The transport (re)connected.
    SessionStarted,
    Shutdown,
}

impl From<PublishEvent> for Outbound {
    fn from(event: PublishEvent) -> Self {
        Outbound::Event(event)
    }
}

#[derive(Debug, Serialize)]
struct Attributes<'a> {
    weight: f64,
    unit: &'a str,
    status: &'a str,
    forced: bool,
}

/// Weight payload: grams with one decimal.
pub fn format_weight(weight_cg: i32) -> String {
    format!("{:.1}", cg_to_grams(weight_cg))
}

pub struct MqttAdapter<P> {
    publisher: P,
    topics: Topics,
    discovery: Vec<DiscoveryMessage>,
    retained: BTreeMap<String, Vec<u8>>,
    sessions: u32,
    failures: u64,
}

impl<P> std::fmt::Debug for MqttAdapter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttAdapter")
            .field("topics", &self.topics)
            .field("retained", &self.retained.len())
            .field("sessions", &self.sessions)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl<P: Publisher> MqttAdapter<P> {
    /// The scale starts out `offline` until the core reports otherwise.
    pub fn new(publisher: P, topics: Topics, discovery: Vec<DiscoveryMessage>) -> Self {
        let mut retained = BTreeMap::new();
        retained.insert(
            topics.availability.clone(),
            Availability::Offline.as_str().as_bytes().to_vec(),
        );
        Self {
            publisher,
            topics,
            discovery,
            retained,
            sessions: 0,
            failures: 0,
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Publish failures since start.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Last retained payload for `topic`, if any.
    pub fn retained(&self, topic: &str) -> Option<&[u8]> {
        self.retained.get(topic).map(Vec::as_slice)
    }

    /// Handle one message. Returns `false` once the adapter should stop.
    pub fn handle(&mut self, msg: Outbound) -> bool {
        match msg {
            Outbound::Event(event) => self.on_event(event),
            Outbound::Button { id, pressed } => {
                let topic = self.topics.button(&id);
                let payload: &[u8] = if pressed { b"ON" } else { b"OFF" };
                self.send(&topic, payload, false);
            }
            Outbound::SessionStarted => self.on_session(),
            Outbound::Shutdown => {
                info!("adapter shutting down");
                let topic = self.topics.bridge.clone();
                self.send(&topic, b"offline", true);
                return false;
            }
        }
        true
    }

    /// Consume messages until `Shutdown` or until every sender is gone.
    pub fn run(mut self, rx: &xch::Receiver<Outbound>) -> P {
        while let Ok(msg) = rx.recv() {
            if !self.handle(msg) {
                break;
            }
        }
        self.publisher
    }

    fn on_event(&mut self, event: PublishEvent) {
        match event {
            PublishEvent::Weight(w) => self.on_weight(&w),
            PublishEvent::Status(status) => {
                let topic = self.topics.status.clone();
                self.set_retained(topic, status.as_str().as_bytes().to_vec());
            }
            PublishEvent::Availability(a) => {
                let topic = self.topics.availability.clone();
                self.set_retained(topic, a.as_str().as_bytes().to_vec());
            }
        }
    }

    fn on_weight(&mut self, w: &WeightUpdate) {
        let attrs = Attributes {
            weight: (cg_to_grams(w.weight_cg) * 10.0).round() / 10.0,
            unit: w.unit.as_str(),
            status: w.status.as_str(),
            forced: w.forced,
        };
        match serde_json::to_vec(&attrs) {
            Ok(json) => {
                let topic = self.topics.attributes.clone();
                self.set_retained(topic, json);
            }
            Err(e) => warn!(error = %e, "attribute encoding failed"),
        }
        // The status seeded silently after a fresh start rides along here.
        let status_topic = self.topics.status.clone();
        if self.retained(&status_topic) != Some(w.status.as_str().as_bytes()) {
            self.set_retained(status_topic, w.status.as_str().as_bytes().to_vec());
        }
        let weight_topic = self.topics.weight.clone();
        self.set_retained(weight_topic, format_weight(w.weight_cg).into_bytes());
        debug!(weight_cg = w.weight_cg, forced = w.forced, "weight published");
    }

    fn on_session(&mut self) {
        self.sessions += 1;
        info!(session = self.sessions, "broker session started");
        let bridge = self.topics.bridge.clone();
        self.send(&bridge, b"online", true);

        let discovery = std::mem::take(&mut self.discovery);
        for msg in &discovery {
            self.send(&msg.topic, msg.payload.as_bytes(), true);
        }
        self.discovery = discovery;

        let retained = std::mem::take(&mut self.retained);
        for (topic, payload) in &retained {
            self.send(topic, payload, true);
        }
        self.retained = retained;
    }

    fn set_retained(&mut self, topic: String, payload: Vec<u8>) {
        self.send(&topic, &payload, true);
        self.retained.insert(topic, payload);
    }

    fn send(&mut self, topic: &str, payload: &[u8], retain: bool) {
        if let Err(e) = self.publisher.publish(topic, payload, retain) {
            self.failures += 1;
            warn!(topic, error = %e, "publish failed; dropping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_has_one_decimal() {
        assert_eq!(format_weight(100_000), "1000.0");
        assert_eq!(format_weight(2_834), "28.3");
        assert_eq!(format_weight(-1_200), "-12.0");
        assert_eq!(format_weight(0), "0.0");
    }
}
