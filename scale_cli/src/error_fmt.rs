//! Human-readable error descriptions and structured JSON error formatting.

use scale_core::BuildError;
use scale_hardware::HwError;
use scale_mqtt::TransportError;
use scale_traits::ReadError;

/// Failures the CLI classifies before they reach `main`.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("scale device: {0}")]
    Device(String),
}

pub const EXIT_OTHER: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_DEVICE: i32 = 3;
pub const EXIT_TRANSPORT: i32 = 4;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ce) = err.downcast_ref::<CliError>() {
        return match ce {
            CliError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: A typo, a missing section or an out-of-range value in the TOML, or a bad MQTT_* environment variable.\nHow to fix: Edit the config file (see etc/scale_bridge.toml for a sample), then rerun."
            ),
            CliError::Device(msg) => format!(
                "What happened: The scale could not be opened ({msg}).\nLikely causes: Scale unplugged or switched off, wrong device.path, or no read permission on /dev/hidraw*.\nHow to fix: Plug in and power the scale, check vendor_id/product_id in [device], and add a udev rule granting access."
            ),
        };
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSource => {
                "What happened: No scale was provided to the bridge.\nLikely causes: The device failed to open and was not wired into the builder.\nHow to fix: Make sure a report source is passed via with_source(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid engine configuration ({msg}).\nLikely causes: Out-of-range values in [engine].\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(re) = err.downcast_ref::<ReadError>() {
        return match re {
            ReadError::Timeout => "What happened: The scale sent no report within the read timeout.\nLikely causes: The scale went to sleep, or engine.read_timeout_ms is too low.\nHow to fix: Press a button on the scale to wake it, or raise engine.read_timeout_ms.".to_string(),
            ReadError::Absent => "What happened: No scale is attached.\nLikely causes: Scale unplugged, powered off, or a different vendor/product id.\nHow to fix: Plug in the scale and check [device] in the config.".to_string(),
            other => format!(
                "What happened: Reading the scale failed ({other}).\nLikely causes: USB glitch or permission problem on the hidraw node.\nHow to fix: Re-plug the scale and check permissions on /dev/hidraw*."
            ),
        };
    }

    if let Some(he) = err.downcast_ref::<HwError>() {
        return format!(
            "What happened: Hardware setup failed ({he}).\nLikely causes: Wrong button pins or insufficient GPIO permissions.\nHow to fix: Fix [buttons] in the config, or run as a user in the gpio group."
        );
    }

    if let Some(te) = err.downcast_ref::<TransportError>() {
        return format!(
            "What happened: The MQTT client could not be started ({te}).\nLikely causes: Invalid broker settings or resource exhaustion.\nHow to fix: Check [mqtt] host/port and MQTT_BROKER/MQTT_PORT, then rerun."
        );
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: config 2, device 3, transport 4, anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(ce) = err.downcast_ref::<CliError>() {
        return match ce {
            CliError::Config(_) => EXIT_CONFIG,
            CliError::Device(_) => EXIT_DEVICE,
        };
    }
    if let Some(BuildError::InvalidConfig(_)) = err.downcast_ref::<BuildError>() {
        return EXIT_CONFIG;
    }
    if err.downcast_ref::<ReadError>().is_some() || err.downcast_ref::<HwError>().is_some() {
        return EXIT_DEVICE;
    }
    if err.downcast_ref::<TransportError>().is_some() {
        return EXIT_TRANSPORT;
    }
    EXIT_OTHER
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match exit_code_for_error(err) {
        EXIT_CONFIG => "Config",
        EXIT_DEVICE => "Device",
        EXIT_TRANSPORT => "Transport",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
