use clap::Parser;
use hostpulse_core::{GlobalConfig, HostTelemetry, Sensor, SystemHost};
use hostpulse_thermal::{fan_key, query_key, MetricSelector, SmcKey, ThermalSensor};
use std::io::{self, Write};
use std::process;
use std::time::Duration;
use tokio::time;

#[derive(Parser)]
#[command(name = "hostpulse-thermal")]
#[command(about = "Temperature and fan speed sampler for hostpulse")]
#[command(version)]
struct Args {
    /// Update interval in milliseconds (minimum 100ms)
    #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(GlobalConfig::MIN_UPDATE_INTERVAL..))]
    interval: Option<u64>,

    /// Temperature shown as 100% (°C)
    #[arg(short, long, default_value = "100")]
    critical: f64,

    /// Temperature key to try, in order (repeatable; overrides the config file)
    #[arg(short, long = "key")]
    keys: Vec<SmcKey>,

    /// One-shot mode (don't loop)
    #[arg(short, long)]
    once: bool,

    /// Dump raw values of all candidate keys and exit
    #[arg(long)]
    list_keys: bool,

    /// Check controller availability and exit
    #[arg(long)]
    check: bool,

    /// Generate example config file and exit
    #[arg(long)]
    generate_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn list_keys(host: &dyn HostTelemetry, selector: &MetricSelector) -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = selector.open(host)?;

    println!("{:<6} {:<6} {:>4}  bytes", "key", "type", "size");
    let fan_keys = (0..selector.fan_channels()).map(fan_key);
    for key in selector.temperature_keys().iter().copied().chain(fan_keys) {
        match query_key(conn.as_mut(), key) {
            Ok(reading) => {
                let hex: Vec<String> = reading.payload().iter().map(|b| format!("{b:02x}")).collect();
                println!(
                    "{:<6} {:<6} {:>4}  {}",
                    key.to_string(),
                    reading.data_type.to_string(),
                    reading.data_size,
                    hex.join(" ")
                );
            }
            Err(e) => println!("{:<6} {}", key.to_string(), e),
        }
    }
    Ok(())
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

    if args.generate_config {
        if let Some(config_path) = GlobalConfig::default_config_path() {
            GlobalConfig::save_example_config_to_file(&config_path)?;
            println!("Generated example config at: {}", config_path.display());
        } else {
            eprintln!("Could not determine config directory");
            process::exit(1);
        }
        return Ok(());
    }

    let global_config = GlobalConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        GlobalConfig::default()
    });

    let mut thermal_sensor = if args.keys.is_empty() {
        ThermalSensor::from_config(&global_config, args.critical)?
    } else {
        let selector = MetricSelector::new(args.keys, global_config.fan_channels);
        ThermalSensor::new(selector, args.critical)
    };

    let host = SystemHost::new();

    if args.list_keys {
        return list_keys(&host, thermal_sensor.selector());
    }

    if args.check {
        match thermal_sensor.check_availability(&host) {
            Ok(()) => {
                println!("Thermal sensor is available");
                return Ok(());
            }
            Err(e) => {
                eprintln!("Thermal sensor is not available: {}", e);
                process::exit(1);
            }
        }
    }

    let interval_ms = args.interval.unwrap_or(global_config.update_interval);

    if args.once {
        let output = thermal_sensor.read(&host)?;
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    let mut interval = time::interval(Duration::from_millis(interval_ms));
    loop {
        interval.tick().await;

        match thermal_sensor.read(&host) {
            Ok(output) => {
                println!("{}", serde_json::to_string(&output)?);
                io::stdout().flush()?;
            }
            Err(e) => {
                tracing::error!(error = %e, "error reading thermal sensor");
            }
        }
    }
}
