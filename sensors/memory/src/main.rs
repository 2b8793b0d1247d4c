//! hostpulse-memory: memory pressure sampler.
//!
//! Prints one JSON object per sample on stdout.

use clap::Parser;
use hostpulse_core::{GlobalConfig, Sensor, SystemHost};
use hostpulse_memory::MemorySensor;
use std::io::{self, Write};
use std::process;
use std::time::Duration;
use tokio::time;

/// Command-line arguments for the memory sensor.
#[derive(Parser)]
#[command(name = "hostpulse-memory")]
#[command(about = "Memory pressure sampler for hostpulse")]
#[command(version)]
#[command(author)]
struct Args {
    /// Update interval in milliseconds (minimum 100ms)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(GlobalConfig::MIN_UPDATE_INTERVAL..))]
    interval: Option<u64>,

    /// Include swap usage in calculations
    #[arg(long)]
    include_swap: bool,

    /// Show available memory percentage instead of used
    #[arg(long)]
    show_available: bool,

    /// One-shot mode (output once and exit)
    #[arg(short, long)]
    once: bool,

    /// Verify memory statistics can be read and exit
    #[arg(long)]
    check: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
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
    let mut memory_sensor = MemorySensor::new(args.include_swap, args.show_available);

    if args.check {
        match memory_sensor.check_availability(&host) {
            Ok(()) => {
                println!("Memory sensor is available");
                return Ok(());
            }
            Err(e) => {
                eprintln!("Memory sensor is not available: {}", e);
                process::exit(1);
            }
        }
    }

    let global_config = GlobalConfig::load().unwrap_or_default();
    let interval_ms = args.interval.unwrap_or(global_config.update_interval);

    if args.once {
        match memory_sensor.read(&host) {
            Ok(output) => println!("{}", serde_json::to_string(&output)?),
            Err(e) => {
                eprintln!("Error reading memory stats: {}", e);
                process::exit(1);
            }
        }
        return Ok(());
    }

    let mut interval = time::interval(Duration::from_millis(interval_ms));
    loop {
        interval.tick().await;

        match memory_sensor.read(&host) {
            Ok(output) => {
                println!("{}", serde_json::to_string(&output)?);
                io::stdout().flush()?;
            }
            Err(e) => {
                tracing::error!(error = %e, "error reading memory stats");
            }
        }
    }
}
