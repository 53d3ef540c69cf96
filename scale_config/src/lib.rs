#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the scale bridge.
//!
//! - `Config` and sub-structs are deserialized from TOML; every field has a
//!   default, so an empty file is a complete configuration.
//! - `apply_env_overrides` layers the container-style environment variables
//!   (`MQTT_BROKER`, `MQTT_PORT`, ...) on top of the file.
//! - `validate` is the single startup gate: anything it rejects is fatal
//!   before the bridge core is constructed.
use serde::Deserialize;

/// USB vendor id of DYMO scales.
pub const DYMO_VENDOR_ID: u16 = 0x0922;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MqttCfg {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Defaults to `scale_bridge_<device_id>` when unset.
    pub client_id: Option<String>,
    /// State topics live under `<topic_prefix>/<device_id>/...`
    pub topic_prefix: String,
    pub device_id: String,
    /// Home Assistant discovery prefix
    pub discovery_prefix: String,
    /// Friendly device name shown by Home Assistant
    pub device_name: String,
    pub keep_alive_secs: u64,
}

impl Default for MqttCfg {
    fn default() -> Self {
        Self {
            host: "homeassistant.local".to_string(),
            port: 1883,
            username: None,
            password: None,
            client_id: None,
            topic_prefix: "dymo".to_string(),
            device_id: "scale".to_string(),
            discovery_prefix: "homeassistant".to_string(),
            device_name: "Dymo M2 Scale".to_string(),
            keep_alive_secs: 60,
        }
    }
}

impl MqttCfg {
    pub fn effective_client_id(&self) -> String {
        match &self.client_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("scale_bridge_{}", self.device_id),
        }
    }

    pub fn has_auth(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceCfg {
    /// USB vendor id used to find the hidraw node (accepts decimal or a TOML hex literal)
    pub vendor_id: u16,
    /// Optional product id filter
    pub product_id: Option<u16>,
    /// Explicit device node (e.g. "/dev/hidraw0"); skips discovery when set
    pub path: Option<String>,
}

impl Default for DeviceCfg {
    fn default() -> Self {
        Self {
            vendor_id: DYMO_VENDOR_ID,
            product_id: None,
            path: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineCfg {
    /// Minimum weight change (grams) that triggers a publish
    pub debounce_g: f32,
    /// Device open but silent for longer than this is reported offline
    pub silence_timeout_ms: u64,
    /// Delay between polls while the device is present
    pub poll_interval_ms: u64,
    /// Upper bound on a single device read
    pub read_timeout_ms: u64,
    /// Consecutive failed polls (absent/io) before going offline
    pub failure_threshold: u32,
    /// Delay between polls while the device is unplugged
    pub absent_backoff_ms: u64,
}

impl Default for EngineCfg {
    fn default() -> Self {
        Self {
            debounce_g: 2.0,
            silence_timeout_ms: 30_000,
            poll_interval_ms: 100,
            read_timeout_ms: 1_000,
            failure_threshold: 3,
            absent_backoff_ms: 5_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ButtonAction {
    /// Re-establish the zero reference
    Tare,
    /// Publish the current reading immediately
    Send,
    /// Only report presses over MQTT
    #[default]
    None,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ButtonCfg {
    /// BCM GPIO pin number
    pub pin: u8,
    pub name: String,
    #[serde(default)]
    pub action: ButtonAction,
}

impl ButtonCfg {
    /// Topic/entity-safe identifier derived from the display name.
    pub fn slug(&self) -> String {
        self.name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ButtonsCfg {
    pub enabled: bool,
    /// Edges closer together than this are treated as contact bounce
    pub bounce_ms: u64,
    #[serde(rename = "button")]
    pub buttons: Vec<ButtonCfg>,
}

impl Default for ButtonsCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            bounce_ms: 50,
            buttons: vec![
                ButtonCfg {
                    pin: 17,
                    name: "Button 1".to_string(),
                    action: ButtonAction::Tare,
                },
                ButtonCfg {
                    pin: 27,
                    name: "Button 2".to_string(),
                    action: ButtonAction::Send,
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub mqtt: MqttCfg,
    pub device: DeviceCfg,
    pub engine: EngineCfg,
    pub buttons: ButtonsCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {e}", path.display()))?;
    load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration in {}: {e}", path.display()))
}

impl Config {
    /// Apply environment overrides on top of the file values.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> eyre::Result<()> {
        if let Some(host) = lookup("MQTT_BROKER").filter(|v| !v.trim().is_empty()) {
            self.mqtt.host = host.trim().to_string();
        }
        if let Some(port) = lookup("MQTT_PORT") {
            self.mqtt.port = port
                .trim()
                .parse()
                .map_err(|e| eyre::eyre!("MQTT_PORT must be a port number, got {port:?}: {e}"))?;
        }
        if let Some(user) = lookup("MQTT_USER") {
            self.mqtt.username = Some(user);
        }
        if let Some(pass) = lookup("MQTT_PASS") {
            self.mqtt.password = Some(pass);
        }
        if let Some(id) = lookup("SCALE_DEVICE_ID").filter(|v| !v.trim().is_empty()) {
            self.mqtt.device_id = id.trim().to_string();
        } else if let Some(uuid) = lookup("BALENA_DEVICE_UUID")
            && self.mqtt.device_id == MqttCfg::default().device_id
        {
            let id = topic_safe(&uuid);
            if !id.is_empty() {
                self.mqtt.device_id = id;
            }
        }
        if let Some(map) = lookup("BUTTON_MAP") {
            self.buttons.buttons = match parse_button_map(&map, &self.buttons.buttons) {
                Ok(buttons) => buttons,
                Err(e) => {
                    tracing::warn!(error = %e, "invalid BUTTON_MAP; using default buttons");
                    ButtonsCfg::default().buttons
                }
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // MQTT
        if self.mqtt.host.trim().is_empty() {
            eyre::bail!("mqtt.host must not be empty");
        }
        if self.mqtt.port == 0 {
            eyre::bail!("mqtt.port must be > 0");
        }
        if self.mqtt.keep_alive_secs < 5 {
            eyre::bail!("mqtt.keep_alive_secs must be >= 5");
        }
        validate_topic_segment("mqtt.topic_prefix", &self.mqtt.topic_prefix, true)?;
        validate_topic_segment("mqtt.discovery_prefix", &self.mqtt.discovery_prefix, true)?;
        validate_topic_segment("mqtt.device_id", &self.mqtt.device_id, false)?;
        if self.mqtt.password.is_some() && !self.mqtt.has_auth() {
            eyre::bail!("mqtt.password is set but mqtt.username is missing");
        }

        // Device
        if self.device.vendor_id == 0 {
            eyre::bail!("device.vendor_id must be > 0");
        }
        if let Some(path) = &self.device.path
            && path.trim().is_empty()
        {
            eyre::bail!("device.path must not be empty when set");
        }

        // Engine
        let e = &self.engine;
        if !(e.debounce_g.is_finite() && e.debounce_g > 0.0) {
            eyre::bail!("engine.debounce_g must be > 0");
        }
        if e.debounce_g > 1000.0 {
            eyre::bail!("engine.debounce_g is unreasonably large (>1kg)");
        }
        if e.read_timeout_ms == 0 {
            eyre::bail!("engine.read_timeout_ms must be >= 1");
        }
        if e.read_timeout_ms > 10_000 {
            eyre::bail!("engine.read_timeout_ms must be <= 10000");
        }
        if e.poll_interval_ms == 0 {
            eyre::bail!("engine.poll_interval_ms must be >= 1");
        }
        if e.failure_threshold == 0 {
            eyre::bail!("engine.failure_threshold must be >= 1");
        }
        if e.silence_timeout_ms <= e.read_timeout_ms {
            eyre::bail!("engine.silence_timeout_ms must be greater than engine.read_timeout_ms");
        }
        if e.silence_timeout_ms <= e.poll_interval_ms {
            eyre::bail!("engine.silence_timeout_ms must be greater than engine.poll_interval_ms");
        }
        if e.silence_timeout_ms > 24 * 60 * 60 * 1000 {
            eyre::bail!("engine.silence_timeout_ms is unreasonably large (>24h)");
        }
        if e.absent_backoff_ms < e.poll_interval_ms {
            eyre::bail!("engine.absent_backoff_ms must be >= engine.poll_interval_ms");
        }

        // Buttons
        if self.buttons.bounce_ms > 1_000 {
            eyre::bail!("buttons.bounce_ms must be <= 1000");
        }
        for (i, b) in self.buttons.buttons.iter().enumerate() {
            if b.name.trim().is_empty() {
                eyre::bail!("buttons.button[{i}].name must not be empty");
            }
            if b.pin > 27 {
                eyre::bail!("buttons.button[{i}].pin must be a BCM GPIO number (0..=27)");
            }
            for other in &self.buttons.buttons[..i] {
                if other.pin == b.pin {
                    eyre::bail!("buttons: pin {} is configured twice", b.pin);
                }
                if other.slug() == b.slug() {
                    eyre::bail!("buttons: name {:?} collides with {:?}", b.name, other.name);
                }
            }
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

/// A `BUTTON_MAP` value: either just a name or a name plus action.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ButtonMapEntry {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        action: Option<ButtonAction>,
    },
}

/// Parse `BUTTON_MAP`, a JSON object keyed by BCM pin:
/// `{"17": "Tare", "27": {"name": "Send", "action": "send"}}`.
///
/// A bare name keeps the action already configured for that pin, if any.
pub fn parse_button_map(
    json: &str,
    current: &[ButtonCfg],
) -> Result<Vec<ButtonCfg>, serde_json::Error> {
    let raw: std::collections::BTreeMap<u8, ButtonMapEntry> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .map(|(pin, entry)| {
            let configured = current
                .iter()
                .find(|b| b.pin == pin)
                .map(|b| b.action)
                .unwrap_or_default();
            let (name, action) = match entry {
                ButtonMapEntry::Name(name) => (name, configured),
                ButtonMapEntry::Full { name, action } => (name, action.unwrap_or(configured)),
            };
            ButtonCfg { pin, name, action }
        })
        .collect())
}

/// Lowercase ASCII alphanumerics, everything else becomes `_`.
fn topic_safe(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn validate_topic_segment(field: &str, value: &str, allow_slash: bool) -> eyre::Result<()> {
    if value.is_empty() {
        eyre::bail!("{field} must not be empty");
    }
    if value.contains(['+', '#']) {
        eyre::bail!("{field} must not contain MQTT wildcards");
    }
    if value.starts_with('/') || value.ends_with('/') {
        eyre::bail!("{field} must not start or end with '/'");
    }
    if !allow_slash && value.contains('/') {
        eyre::bail!("{field} must not contain '/'");
    }
    if value.chars().any(char::is_whitespace) {
        eyre::bail!("{field} must not contain whitespace");
    }
    Ok(())
}
