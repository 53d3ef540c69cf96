#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are fine; panics are not.
    if let Ok(mut cfg) = scale_config::load_toml(data) {
        let _ = cfg.apply_env_overrides(|k| (k == "MQTT_PORT").then(|| data.to_string()));
        if cfg.validate().is_ok() {
            // A config that validates must also convert for the core.
            let _ = scale_core::BridgeCfg::from(&cfg.engine);
        }
    }
});
