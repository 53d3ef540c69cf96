//! Home Assistant MQTT discovery payloads.
//!
//! Published retained on every new broker session so a restarted Home
//! Assistant (or a wiped broker) picks the entities up again.

use scale_config::{ButtonCfg, MqttCfg};
use serde::Serialize;

use crate::topics::Topics;

const PAYLOAD_ONLINE: &str = "online";
const PAYLOAD_OFFLINE: &str = "offline";

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo<'a> {
    pub name: &'a str,
    pub identifiers: [String; 1],
    pub manufacturer: &'a str,
    pub model: &'a str,
    pub sw_version: &'a str,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityTopic<'a> {
    pub topic: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SensorDiscovery<'a> {
    pub name: &'a str,
    pub unique_id: String,
    pub state_topic: &'a str,
    pub availability: Vec<AvailabilityTopic<'a>>,
    pub availability_mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_display_precision: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_attributes_topic: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'a str>,
    pub device: DeviceInfo<'a>,
}

#[derive(Debug, Serialize)]
pub struct BinarySensorDiscovery<'a> {
    pub name: &'a str,
    pub unique_id: String,
    pub state_topic: &'a str,
    pub payload_on: &'a str,
    pub payload_off: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_topic: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_category: Option<&'a str>,
    pub device: DeviceInfo<'a>,
}

/// A ready-to-publish discovery config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryMessage {
    pub topic: String,
    pub payload: String,
}

/// All discovery configs for the scale, the bridge and each button.
pub fn discovery_messages(
    cfg: &MqttCfg,
    topics: &Topics,
    buttons: &[ButtonCfg],
) -> Result<Vec<DiscoveryMessage>, serde_json::Error> {
    let device = DeviceInfo {
        name: &cfg.device_name,
        identifiers: [format!("scale_bridge_{}", cfg.device_id)],
        manufacturer: "Dymo",
        model: "USB HID scale",
        sw_version: env!("CARGO_PKG_VERSION"),
    };
    let mut out = Vec::with_capacity(4 + buttons.len());

    let weight = SensorDiscovery {
        name: "Weight",
        unique_id: topics.unique_id("weight"),
        state_topic: &topics.weight,
        availability: vec![
            AvailabilityTopic {
                topic: &topics.bridge,
            },
            AvailabilityTopic {
                topic: &topics.availability,
            },
        ],
        availability_mode: "all",
        unit_of_measurement: Some("g"),
        device_class: Some("weight"),
        state_class: Some("measurement"),
        suggested_display_precision: Some(1),
        json_attributes_topic: Some(&topics.attributes),
        icon: Some("mdi:scale-balance"),
        device: device.clone(),
    };
    push(&mut out, topics.discovery("sensor", "weight"), &weight)?;

    let status = SensorDiscovery {
        name: "Status",
        unique_id: topics.unique_id("status"),
        state_topic: &topics.status,
        availability: vec![
            AvailabilityTopic {
                topic: &topics.bridge,
            },
            AvailabilityTopic {
                topic: &topics.availability,
            },
        ],
        availability_mode: "all",
        unit_of_measurement: None,
        device_class: None,
        state_class: None,
        suggested_display_precision: None,
        json_attributes_topic: None,
        icon: Some("mdi:list-status"),
        device: device.clone(),
    };
    push(&mut out, topics.discovery("sensor", "status"), &status)?;

    let scale = BinarySensorDiscovery {
        name: "Scale connected",
        unique_id: topics.unique_id("availability"),
        state_topic: &topics.availability,
        payload_on: PAYLOAD_ONLINE,
        payload_off: PAYLOAD_OFFLINE,
        device_class: Some("connectivity"),
        availability_topic: Some(&topics.bridge),
        entity_category: Some("diagnostic"),
        device: device.clone(),
    };
    push(
        &mut out,
        topics.discovery("binary_sensor", "availability"),
        &scale,
    )?;

    let bridge = BinarySensorDiscovery {
        name: "Bridge",
        unique_id: topics.unique_id("bridge"),
        state_topic: &topics.bridge,
        payload_on: PAYLOAD_ONLINE,
        payload_off: PAYLOAD_OFFLINE,
        device_class: Some("connectivity"),
        availability_topic: None,
        entity_category: Some("diagnostic"),
        device: device.clone(),
    };
    push(&mut out, topics.discovery("binary_sensor", "bridge"), &bridge)?;

    for button in buttons {
        let slug = button.slug();
        let state_topic = topics.button(&slug);
        let payload = BinarySensorDiscovery {
            name: &button.name,
            unique_id: topics.unique_id(&format!("button_{}", button.pin)),
            state_topic: &state_topic,
            payload_on: "ON",
            payload_off: "OFF",
            device_class: None,
            availability_topic: Some(&topics.bridge),
            entity_category: None,
            device: device.clone(),
        };
        push(&mut out, topics.discovery("binary_sensor", &slug), &payload)?;
    }

    Ok(out)
}

fn push<T: Serialize>(
    out: &mut Vec<DiscoveryMessage>,
    topic: String,
    payload: &T,
) -> Result<(), serde_json::Error> {
    out.push(DiscoveryMessage {
        topic,
        payload: serde_json::to_string(payload)?,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn messages() -> Vec<DiscoveryMessage> {
        let cfg = MqttCfg::default();
        let topics = Topics::new(&cfg);
        let buttons = scale_config::ButtonsCfg::default().buttons;
        discovery_messages(&cfg, &topics, &buttons).unwrap()
    }

    #[test]
    fn one_config_per_entity() {
        let topics: Vec<String> = messages().into_iter().map(|m| m.topic).collect();
        assert_eq!(
            topics,
            vec![
                "homeassistant/sensor/scale/weight/config",
                "homeassistant/sensor/scale/status/config",
                "homeassistant/binary_sensor/scale/availability/config",
                "homeassistant/binary_sensor/scale/bridge/config",
                "homeassistant/binary_sensor/scale/button_1/config",
                "homeassistant/binary_sensor/scale/button_2/config",
            ]
        );
    }

    #[test]
    fn weight_sensor_needs_bridge_and_scale() {
        let weight = &messages()[0];
        let v: Value = serde_json::from_str(&weight.payload).unwrap();
        assert_eq!(v["state_topic"], "dymo/scale/weight");
        assert_eq!(v["unit_of_measurement"], "g");
        assert_eq!(v["availability_mode"], "all");
        assert_eq!(v["availability"][0]["topic"], "dymo/scale/bridge");
        assert_eq!(v["availability"][1]["topic"], "dymo/scale/availability");
        assert_eq!(v["device"]["identifiers"][0], "scale_bridge_scale");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let status = &messages()[1];
        let v: Value = serde_json::from_str(&status.payload).unwrap();
        assert!(v.get("unit_of_measurement").is_none());
        assert!(v.get("device_class").is_none());
    }
}
