//! Topic layout.
//!
//! State topics live under `<topic_prefix>/<device_id>/`; discovery configs
//! under `<discovery_prefix>/<component>/<device_id>/<object>/config`.

use scale_config::MqttCfg;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
    discovery_prefix: String,
    device_id: String,
    pub weight: String,
    pub status: String,
    pub availability: String,
    pub attributes: String,
    /// Bridge process liveness; also the MQTT last will.
    pub bridge: String,
}

impl Topics {
    pub fn new(cfg: &MqttCfg) -> Self {
        let base = format!("{}/{}", cfg.topic_prefix, cfg.device_id);
        Self {
            weight: format!("{base}/weight"),
            status: format!("{base}/status"),
            availability: format!("{base}/availability"),
            attributes: format!("{base}/attributes"),
            bridge: format!("{base}/bridge"),
            discovery_prefix: cfg.discovery_prefix.clone(),
            device_id: cfg.device_id.clone(),
            base,
        }
    }

    pub fn button(&self, slug: &str) -> String {
        format!("{}/button/{slug}", self.base)
    }

    pub fn discovery(&self, component: &str, object: &str) -> String {
        format!(
            "{}/{component}/{}/{object}/config",
            self.discovery_prefix, self.device_id
        )
    }

    /// `<device_id>_<object>`, unique per entity.
    pub fn unique_id(&self, object: &str) -> String {
        format!("{}_{object}", self.device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let t = Topics::new(&MqttCfg::default());
        assert_eq!(t.weight, "dymo/scale/weight");
        assert_eq!(t.availability, "dymo/scale/availability");
        assert_eq!(t.bridge, "dymo/scale/bridge");
        assert_eq!(t.button("button_1"), "dymo/scale/button/button_1");
        assert_eq!(
            t.discovery("sensor", "weight"),
            "homeassistant/sensor/scale/weight/config"
        );
        assert_eq!(t.unique_id("weight"), "scale_weight");
    }
}
