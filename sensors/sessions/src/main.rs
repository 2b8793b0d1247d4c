//! hostpulse-sessions: console time today and this week.

use chrono::Local;
use clap::Parser;
use hostpulse_core::{GlobalConfig, SensorOutput};
use hostpulse_sessions::{compute_login_times_with_marker, SessionTracker};
use std::io::{self, Read, Write};
use std::time::Duration;
use tokio::time;

#[derive(Parser)]
#[command(name = "hostpulse-sessions")]
#[command(about = "Console session time tracker for hostpulse")]
#[command(version)]
struct Args {
    /// Seconds between recomputations (overrides the config file)
    #[arg(long)]
    cooldown: Option<u64>,

    /// Terminal field that marks a console session
    #[arg(long)]
    marker: Option<String>,

    /// Read the login history from stdin instead of running `last`, print once and exit
    #[arg(long)]
    stdin: bool,

    /// One-shot mode (don't loop)
    #[arg(short, long)]
    once: bool,

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

    let mut config = GlobalConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        GlobalConfig::default()
    });
    if let Some(secs) = args.cooldown {
        config.session_cooldown_secs = secs;
    }
    if let Some(marker) = args.marker {
        config.console_marker = marker;
    }

    if args.stdin {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        let times = compute_login_times_with_marker(&text, &config.console_marker, Local::now().naive_local());
        println!("{}", serde_json::to_string(&SensorOutput::from(times))?);
        return Ok(());
    }

    let mut tracker = SessionTracker::from_config(&config);

    if args.once {
        let times = tracker.refresh().await;
        println!("{}", serde_json::to_string(&SensorOutput::from(times))?);
        return Ok(());
    }

    // Ticks are cheap; the tracker decides when to rerun the command.
    let mut interval = time::interval(Duration::from_millis(config.update_interval));
    loop {
        interval.tick().await;
        let times = tracker.refresh().await;
        println!("{}", serde_json::to_string(&SensorOutput::from(times))?);
        io::stdout().flush()?;
    }
}
