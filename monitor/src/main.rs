//! hostpulse: combined host telemetry sampler.
//!
//! Prints one JSON object per tick with `cpu`, `memory`, `thermal`, `uptime`
//! and `sessions` fields.

mod sampler;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use hostpulse_core::{GlobalConfig, SystemHost};
use sampler::Monitor;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Ron,
}

#[derive(Parser)]
#[command(name = "hostpulse")]
#[command(about = "Host telemetry sampler: CPU, memory, thermal, uptime and console time")]
#[command(version)]
struct Args {
    /// Update interval in milliseconds (minimum 100ms)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(GlobalConfig::MIN_UPDATE_INTERVAL..))]
    interval: Option<u64>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// One-shot mode (sample twice one interval apart, print once and exit)
    #[arg(short, long)]
    once: bool,

    /// Report which data sources are available and exit
    #[arg(long)]
    probe: bool,

    /// Output format for --probe
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Generate example config file and exit
    #[arg(long)]
    generate_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<GlobalConfig> {
    match path {
        Some(path) => GlobalConfig::load_from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(GlobalConfig::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            GlobalConfig::default()
        })),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .init();

    if args.generate_config {
        let Some(config_path) = GlobalConfig::default_config_path() else {
            bail!("could not determine config directory");
        };
        GlobalConfig::save_example_config_to_file(&config_path)?;
        println!("Generated example config at: {}", config_path.display());
        return Ok(());
    }

    let mut config = load_config(args.config.as_ref())?;
    if let Some(interval) = args.interval {
        config.update_interval = interval;
    }

    let host = SystemHost::new();
    let mut monitor = Monitor::from_config(&config)?;

    if args.probe {
        let report = monitor.probe(&host);
        match args.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Ron => println!(
                "{}",
                ron::ser::to_string_pretty(&report, ron::ser::PrettyConfig::default())?
            ),
        }
        return Ok(());
    }

    let mut interval = time::interval(Duration::from_millis(config.update_interval));

    if args.once {
        // The first tick only establishes the CPU baseline and starts `last`
        interval.tick().await;
        monitor.tick(&host).await;
        monitor.finish_sessions().await;
        interval.tick().await;
        let report = monitor.tick(&host).await;
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }

    loop {
        interval.tick().await;
        let report = monitor.tick(&host).await;
        println!("{}", serde_json::to_string(&report)?);
        io::stdout().flush()?;
    }
}
