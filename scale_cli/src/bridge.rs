//! Bridge assembly: device, MQTT transport, adapter thread, buttons and the poll loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel as xch;
use scale_config::{ButtonAction, ButtonCfg, ButtonsCfg, Config, DeviceCfg};
use scale_core::{Bridge, BridgeCfg, OperatorCommand, RunSummary, classify, decode};
use scale_hardware::SimulatedScale;
use scale_mqtt::{MqttAdapter, MqttTransport, Outbound, Topics, discovery_messages};
use scale_traits::ReportSource;

use crate::error_fmt::CliError;

/// Events waiting for the adapter thread. The poll loop drops weight overflow
/// and holds availability changes until there is room.
const OUTBOUND_CAP: usize = 256;
const COMMAND_CAP: usize = 16;

#[cfg(all(feature = "hardware", target_os = "linux"))]
type ButtonGuard = Option<scale_hardware::ButtonWatcher>;
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
type ButtonGuard = Option<std::convert::Infallible>;

/// The scheduler command a button press stands for.
#[cfg_attr(
    not(all(feature = "hardware", target_os = "linux")),
    allow(dead_code)
)]
pub fn command_for(action: ButtonAction) -> Option<OperatorCommand> {
    match action {
        ButtonAction::Tare => Some(OperatorCommand::Tare),
        ButtonAction::Send => Some(OperatorCommand::Send),
        ButtonAction::None => None,
    }
}

pub fn open_source(cfg: &DeviceCfg, simulate: bool) -> eyre::Result<Box<dyn ReportSource>> {
    if simulate {
        tracing::info!("using simulated scale");
        return Ok(Box::new(SimulatedScale::demo()));
    }
    open_hidraw(cfg)
}

#[cfg(target_os = "linux")]
fn open_hidraw(cfg: &DeviceCfg) -> eyre::Result<Box<dyn ReportSource>> {
    use scale_hardware::HidrawScale;

    let scale = match &cfg.path {
        Some(path) => HidrawScale::at_path(path),
        None => HidrawScale::discover(cfg.vendor_id, cfg.product_id),
    };
    // A missing scale is not fatal: the bridge reports it offline and keeps looking.
    match scale.locate() {
        Ok(path) => tracing::info!(path = %path.display(), "scale device"),
        Err(e) => tracing::warn!(error = %e, "scale not found yet"),
    }
    Ok(Box::new(scale))
}

#[cfg(not(target_os = "linux"))]
fn open_hidraw(_cfg: &DeviceCfg) -> eyre::Result<Box<dyn ReportSource>> {
    Err(CliError::Device("hidraw is only available on Linux; use --simulate".into()).into())
}

/// Buttons announced to Home Assistant: only those `start_buttons` will watch.
fn advertised_buttons(cfg: &ButtonsCfg) -> &[ButtonCfg] {
    if cfg!(all(feature = "hardware", target_os = "linux")) && cfg.enabled {
        &cfg.buttons
    } else {
        &[]
    }
}

/// Run the bridge until `shutdown` is set.
pub fn run_bridge(
    cfg: &Config,
    simulate: bool,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<RunSummary> {
    let topics = Topics::new(&cfg.mqtt);
    let discovery = discovery_messages(&cfg.mqtt, &topics, advertised_buttons(&cfg.buttons))?;

    let source = open_source(&cfg.device, simulate)?;
    let mut bridge = Bridge::builder()
        .with_source(source)
        .with_config(BridgeCfg::from(&cfg.engine))
        .try_build()?;

    let (out_tx, out_rx) = xch::bounded::<Outbound>(OUTBOUND_CAP);
    let (cmd_tx, cmd_rx) = xch::bounded::<OperatorCommand>(COMMAND_CAP);

    tracing::info!(
        broker = %format!("{}:{}", cfg.mqtt.host, cfg.mqtt.port),
        prefix = %cfg.mqtt.topic_prefix,
        device_id = %cfg.mqtt.device_id,
        "starting mqtt"
    );
    let transport = MqttTransport::start(&cfg.mqtt, &topics, out_tx.clone())?;
    let adapter = MqttAdapter::new(transport.publisher.clone(), topics, discovery);
    let adapter_thread = thread::Builder::new()
        .name("mqtt-adapter".into())
        .spawn(move || adapter.run(&out_rx))?;

    let button_guard = start_buttons(&cfg.buttons, out_tx.clone(), cmd_tx)?;

    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })?;
    }

    let mut sink = out_tx.clone();
    let summary = bridge.run(&mut sink, &cmd_rx, &shutdown);
    tracing::info!(
        ticks = summary.ticks,
        emitted = summary.emitted,
        dropped = summary.dropped,
        "bridge stopped"
    );

    drop(button_guard);
    if out_tx.send(Outbound::Shutdown).is_err() {
        tracing::warn!("adapter already gone at shutdown");
    }
    if adapter_thread.join().is_err() {
        tracing::error!("adapter thread panicked");
    }
    transport.shutdown()?;
    Ok(summary)
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn start_buttons(
    cfg: &ButtonsCfg,
    out: xch::Sender<Outbound>,
    commands: xch::Sender<OperatorCommand>,
) -> eyre::Result<ButtonGuard> {
    use scale_hardware::{ButtonEdge, ButtonWatcher};
    use std::collections::HashMap;
    use std::time::Duration;

    if !cfg.enabled || cfg.buttons.is_empty() {
        return Ok(None);
    }
    let by_pin: HashMap<u8, (String, ButtonAction)> = cfg
        .buttons
        .iter()
        .map(|b| (b.pin, (b.slug(), b.action)))
        .collect();
    let pins: Vec<u8> = cfg.buttons.iter().map(|b| b.pin).collect();

    let watcher = ButtonWatcher::start(
        &pins,
        Duration::from_millis(cfg.bounce_ms),
        move |edge: ButtonEdge| {
            let Some((slug, action)) = by_pin.get(&edge.pin) else {
                return;
            };
            tracing::debug!(pin = edge.pin, pressed = edge.pressed, "button edge");
            let msg = Outbound::Button {
                id: slug.clone(),
                pressed: edge.pressed,
            };
            if out.try_send(msg).is_err() {
                tracing::warn!(pin = edge.pin, "event queue full; button edge dropped");
            }
            if edge.pressed
                && let Some(cmd) = command_for(*action)
                && commands.try_send(cmd).is_err()
            {
                tracing::warn!(pin = edge.pin, ?cmd, "command queue full; press ignored");
            }
        },
    )?;
    Ok(Some(watcher))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn start_buttons(
    cfg: &ButtonsCfg,
    _out: xch::Sender<Outbound>,
    _commands: xch::Sender<OperatorCommand>,
) -> eyre::Result<ButtonGuard> {
    if cfg.enabled && !cfg.buttons.is_empty() {
        tracing::info!("built without the hardware feature; buttons are not watched");
    }
    Ok(None)
}

/// Decoded result of a single read, as printed by `self-check`.
pub fn self_check(cfg: &Config, simulate: bool) -> eyre::Result<serde_json::Value> {
    let mut source = open_source(&cfg.device, simulate)?;
    let timeout = BridgeCfg::from(&cfg.engine).read_timeout;
    let report = source.read_report(timeout)?;
    let reading = decode(&report).map_err(|e| CliError::Device(e.to_string()))?;
    let status = classify(reading.raw_status);
    let raw: Vec<String> = report.iter().map(|b| format!("{b:02x}")).collect();
    Ok(serde_json::json!({
        "weight_g": scale_core::fixed_point::cg_to_grams(reading.weight_cg),
        "unit": reading.unit.as_str(),
        "status": status.as_str(),
        "raw": raw.join(" "),
    }))
}

/// Discovery messages as JSON lines, payloads inlined as objects.
pub fn discovery_lines(cfg: &Config) -> eyre::Result<Vec<String>> {
    let topics = Topics::new(&cfg.mqtt);
    discovery_messages(&cfg.mqtt, &topics, advertised_buttons(&cfg.buttons))?
        .into_iter()
        .map(|m| {
            let payload: serde_json::Value = serde_json::from_str(&m.payload)?;
            Ok(serde_json::json!({ "topic": m.topic, "payload": payload }).to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_tare_and_send_reach_the_scheduler() {
        assert_eq!(command_for(ButtonAction::Tare), Some(OperatorCommand::Tare));
        assert_eq!(command_for(ButtonAction::Send), Some(OperatorCommand::Send));
        assert_eq!(command_for(ButtonAction::None), None);
    }

    #[test]
    fn simulated_self_check_decodes() {
        let v = self_check(&Config::default(), true).unwrap();
        assert_eq!(v["unit"], "g");
        assert!(v["weight_g"].is_number());
        assert_eq!(v["raw"].as_str().unwrap().split(' ').count(), 6);
    }

    #[test]
    fn disabled_buttons_leave_four_entities() {
        let mut cfg = Config::default();
        cfg.buttons.enabled = false;
        assert_eq!(discovery_lines(&cfg).unwrap().len(), 4);
    }

    #[test]
    fn buttons_are_announced_only_when_watched() {
        let cfg = Config::default();
        let watched = cfg!(all(feature = "hardware", target_os = "linux"));
        let expected = if watched { cfg.buttons.buttons.len() } else { 0 };
        assert_eq!(advertised_buttons(&cfg.buttons).len(), expected);
        assert_eq!(discovery_lines(&cfg).unwrap().len(), 4 + expected);
    }
}
