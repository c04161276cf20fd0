//! Jukebridge daemon entry point.
//!
//! This binary connects the jukebox player to an MQTT broker and runs until
//! interrupted.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use jukebridge_core::config::{Config, Directories};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Jukebridge daemon - exposes the jukebox player over MQTT
#[derive(Parser, Debug)]
#[command(name = "jukebridge-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Config file (defaults to `$XDG_CONFIG_HOME/jukebridge/config.json`)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Broker host, overrides `mqtt.host`
    #[arg(long)]
    host: Option<String>,

    /// Broker port, overrides `mqtt.port`
    #[arg(long)]
    port: Option<u16>,

    /// Base topic, overrides `mqtt.baseTopic`
    #[arg(long)]
    base_topic: Option<String>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.mqtt.host = host;
        }
        if let Some(port) = self.port {
            config.mqtt.port = port;
        }
        if let Some(base_topic) = self.base_topic {
            config.mqtt.base_topic = base_topic;
        }
    }
}

/// Set up logging with file output for debugging.
/// In debug builds, defaults to debug level and logs to timestamped file.
/// In release builds, defaults to info level and logs to stderr.
fn setup_logging() {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("jukebridge={default_level}")));

    if cfg!(debug_assertions) {
        let temp_dir = std::env::temp_dir();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("jukebridge-daemon-{timestamp}.log");
        let log_path = temp_dir.join(&log_filename);

        #[cfg(unix)]
        {
            let symlink_path = temp_dir.join("jukebridge-daemon.log");
            let _ = std::fs::remove_file(&symlink_path);
            let _ = std::os::unix::fs::symlink(&log_path, &symlink_path);
        }

        let file_appender = tracing_appender::rolling::never(&temp_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true);

        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer)
            .with(filter)
            .init();

        eprintln!("Logging to: {} (and stderr)", log_path.display());
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    setup_logging();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| Directories::new().config_file);
    info!("Loading config from {}", config_path.display());

    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    args.apply(&mut config);

    info!("Starting jukebridge daemon...");

    jukebridge_daemon::run(config).await?;

    info!("Jukebridge daemon stopped");
    Ok(())
}
