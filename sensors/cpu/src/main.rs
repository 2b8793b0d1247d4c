//! hostpulse-cpu: CPU load sampler.
//!
//! Prints one JSON object per sample on stdout.

use clap::Parser;
use hostpulse_core::{GlobalConfig, Sensor, SystemHost};
use hostpulse_cpu::CpuSensor;
use std::io::{self, Write};
use std::process;
use std::time::Duration;
use tokio::time;

/// Command-line arguments for the CPU sensor.
#[derive(Parser)]
#[command(name = "hostpulse-cpu")]
#[command(about = "CPU load sampler for hostpulse")]
#[command(version)]
#[command(author)]
struct Args {
    /// Update interval in milliseconds (minimum 100ms)
    #[arg(short, long, value_parser = validate_interval)]
    interval: Option<u64>,

    /// One-shot mode (sample twice one interval apart, print once and exit)
    #[arg(short, long)]
    once: bool,

    /// Verify tick counters can be read and exit
    #[arg(long)]
    check: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Validate that the interval is at least 100ms.
fn validate_interval(s: &str) -> Result<u64, String> {
    let interval = s
        .parse::<u64>()
        .map_err(|_| "Interval must be a positive integer".to_owned())?;

    if interval < GlobalConfig::MIN_UPDATE_INTERVAL {
        return Err(format!(
            "Interval must be at least {}ms",
            GlobalConfig::MIN_UPDATE_INTERVAL
        ));
    }

    Ok(interval)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .init();

    let host = SystemHost::new();
    let mut cpu_sensor = CpuSensor::new();

    if args.check {
        match cpu_sensor.check_availability(&host) {
            Ok(()) => {
                println!("CPU sensor is available");
                return Ok(());
            }
            Err(e) => {
                eprintln!("CPU sensor is not available: {}", e);
                process::exit(1);
            }
        }
    }

    let global_config = GlobalConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        GlobalConfig::default()
    });
    let interval_ms = args.interval.unwrap_or(global_config.update_interval);

    let mut interval = time::interval(Duration::from_millis(interval_ms));

    if args.once {
        // The first sample is only a baseline
        interval.tick().await;
        cpu_sensor.sample_utilization(&host);
        interval.tick().await;
        let output = cpu_sensor.read(&host)?;
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    loop {
        interval.tick().await;

        match cpu_sensor.read(&host) {
            Ok(output) => {
                println!("{}", serde_json::to_string(&output)?);
                io::stdout().flush()?;
            }
            Err(e) => {
                tracing::error!(error = %e, "error reading CPU stats");
            }
        }
    }
}
