mod bridge;
mod cli;
mod error_fmt;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use error_fmt::{CliError, exit_code_for_error, format_error_json, humanize};
use scale_config::{Config, Logging};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG: &str = "etc/scale_bridge.toml";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Run { simulate } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            bridge::run_bridge(&cfg, simulate, shutdown)?;
        }
        Commands::SelfCheck { simulate } => {
            let report = bridge::self_check(&cfg, simulate)?;
            if cli.json {
                println!("{report}");
            } else {
                let field = |k: &str| report[k].as_str().unwrap_or("?").to_string();
                println!(
                    "Scale OK: {} g ({}), unit {}, raw [{}]",
                    report["weight_g"],
                    field("status"),
                    field("unit"),
                    field("raw")
                );
            }
        }
        Commands::Discovery => {
            for line in bridge::discovery_lines(&cfg)? {
                println!("{line}");
            }
        }
    }
    Ok(())
}

/// Read, override from the environment, validate.
///
/// The built-in default path may be missing; defaults are used then.
fn load_config(path: &Path) -> eyre::Result<Config> {
    let mut cfg = if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        Config::default()
    } else {
        scale_config::load_file(path).map_err(|e| CliError::Config(format!("{e:#}")))?
    };
    cfg.apply_env_overrides(|k| std::env::var(k).ok())
        .map_err(|e| CliError::Config(format!("{e:#}")))?;
    cfg.validate()
        .map_err(|e| CliError::Config(format!("{e:#}")))?;
    Ok(cfg)
}

/// Console logs go to stderr so stdout stays machine-readable.
///
/// `RUST_LOG` wins over `--log-level` for the console. The optional file sink
/// always writes JSON lines at `logging.level` (default info).
fn init_tracing(json: bool, level: &str, logging: &Logging) -> eyre::Result<()> {
    let console_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console: BoxedLayer = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };
    layers.push(console);

    if let Some(file) = logging.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| CliError::Config(format!("logging.file has no file name: {file}")))?;
        let appender = match logging.rotation.as_deref().unwrap_or("never") {
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| eyre::eyre!("init tracing: {e}"))?;
    Ok(())
}
