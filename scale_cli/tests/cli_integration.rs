use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

const ENV_OVERRIDES: [&str; 7] = [
    "MQTT_BROKER",
    "MQTT_PORT",
    "MQTT_USER",
    "MQTT_PASS",
    "SCALE_DEVICE_ID",
    "BALENA_DEVICE_UUID",
    "BUTTON_MAP",
];

// Minimal config: everything else falls back to defaults
fn write_config(dir: &tempfile::TempDir, toml: &str) -> PathBuf {
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn scale_cli() -> Command {
    let mut cmd = Command::cargo_bin("scale_cli").unwrap();
    for key in ENV_OVERRIDES {
        cmd.env_remove(key);
    }
    cmd.arg("--log-level").arg("error");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["discovery"], 0, "homeassistant/sensor/kitchen/weight/config", "stdout")]
#[case(&["self-check", "--simulate"], 0, "Scale OK", "stdout")]
#[case(&["bogus"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[mqtt]\ndevice_id = \"kitchen\"\n");

    let mut cmd = scale_cli();
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
#[case("[mqtt]\nport = 0\n", "mqtt.port")]
#[case("[engine]\ndebounce_g = -1.0\n", "engine.debounce_g")]
#[case("[engine]\nsilence_timeout_ms = 500\n", "engine.silence_timeout_ms")]
#[case("[mqtt\nhost = ", "Invalid configuration")]
fn invalid_config_exits_2(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, toml);

    scale_cli()
        .arg("--config")
        .arg(&cfg)
        .arg("discovery")
        .assert()
        .code(2)
        .stderr(predicate::str::contains(needle))
        .stderr(predicate::str::contains("How to fix"));
}

#[rstest]
fn missing_explicit_config_is_a_config_error() {
    let dir = tempdir().unwrap();
    scale_cli()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("discovery")
        .assert()
        .code(2);
}

#[rstest]
fn env_overrides_apply_on_top_of_the_file() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[mqtt]\ndevice_id = \"kitchen\"\n");

    scale_cli()
        .env("SCALE_DEVICE_ID", "pantry")
        .arg("--config")
        .arg(&cfg)
        .arg("discovery")
        .assert()
        .success()
        .stdout(predicate::str::contains("dymo/pantry/weight"))
        .stdout(predicate::str::contains("kitchen").not());
}

#[rstest]
fn bad_port_override_exits_2() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    scale_cli()
        .env("MQTT_PORT", "eighteen")
        .arg("--config")
        .arg(&cfg)
        .arg("discovery")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("MQTT_PORT"));
}

#[cfg(target_os = "linux")]
#[rstest]
fn self_check_without_device_exits_3() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("hidraw-missing");
    let cfg = write_config(
        &dir,
        &format!("[device]\npath = \"{}\"\n", missing.display()),
    );

    scale_cli()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No scale is attached"));
}

#[rstest]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[mqtt]\nkeep_alive_secs = 1\n");

    let out = scale_cli()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("discovery")
        .assert()
        .code(2)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&out);
    let line = stderr.lines().last().unwrap_or("");
    let v: serde_json::Value = serde_json::from_str(line).expect("valid JSON");
    assert_eq!(v["reason"], "Config");
    assert_eq!(v["exit_code"], 2);
}
