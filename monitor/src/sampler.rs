//! One sampling tick across every sensor.

use hostpulse_core::{format, GlobalConfig, HostTelemetry, Sensor, SensorOutput};
use hostpulse_cpu::CpuSensor;
use hostpulse_memory::MemorySensor;
use hostpulse_sessions::{LoginTimes, SessionTracker};
use hostpulse_thermal::{ThermalSensor, ThermalSnapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::warn;

/// Everything printed for one tick.
#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub cpu: SensorOutput,
    pub memory: SensorOutput,
    pub thermal: ThermalSnapshot,
    pub uptime: String,
    pub sessions: LoginTimes,
}

/// Availability of each sensor, as reported by `--probe`.
pub type ProbeReport = BTreeMap<&'static str, String>;

/// Owns every sensor's state between ticks.
pub struct Monitor {
    cpu: CpuSensor,
    memory: MemorySensor,
    thermal: ThermalSensor,
    sessions: SessionTracker,
}

fn read_or_sentinel<S>(sensor: &mut S, host: &dyn HostTelemetry) -> SensorOutput
where
    S: Sensor,
    S::Error: std::fmt::Display,
{
    sensor.read(host).unwrap_or_else(|e| {
        warn!(sensor = sensor.name(), error = %e, "sensor read failed");
        SensorOutput::unavailable()
    })
}

impl Monitor {
    pub fn new(cpu: CpuSensor, memory: MemorySensor, thermal: ThermalSensor, sessions: SessionTracker) -> Self {
        Self {
            cpu,
            memory,
            thermal,
            sessions,
        }
    }

    /// Monitor built from the global configuration.
    pub fn from_config(config: &GlobalConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let thermal = ThermalSensor::from_config(config, 100.0)?;

        Ok(Self::new(
            CpuSensor::new(),
            MemorySensor::default(),
            thermal,
            SessionTracker::from_config(config),
        ))
    }

    /// Whether a login-history computation is running in the background.
    #[must_use]
    pub fn sessions_pending(&self) -> bool {
        self.sessions.is_in_flight()
    }

    /// Whether the background computation has finished but not been collected.
    #[must_use]
    pub fn sessions_ready(&self) -> bool {
        self.sessions.is_ready()
    }

    /// Wait for a running computation, if any, and record its result.
    pub async fn finish_sessions(&mut self) {
        self.sessions.finish().await;
    }

    pub async fn tick_at(&mut self, host: &dyn HostTelemetry, now: Instant) -> HostReport {
        let cpu = read_or_sentinel(&mut self.cpu, host);
        let memory = read_or_sentinel(&mut self.memory, host);
        let thermal = self.thermal.selector().sample(host);

        let uptime = match host.uptime() {
            Ok(uptime) => format::duration_to_human(uptime),
            Err(e) => {
                warn!(error = %e, "uptime unavailable");
                format::UNAVAILABLE.to_owned()
            }
        };

        let sessions = self.sessions.poll_at(now).await;

        HostReport {
            cpu,
            memory,
            thermal,
            uptime,
            sessions,
        }
    }

    pub async fn tick(&mut self, host: &dyn HostTelemetry) -> HostReport {
        self.tick_at(host, Instant::now()).await
    }

    /// Check each data source once without sampling.
    pub fn probe(&self, host: &dyn HostTelemetry) -> ProbeReport {
        fn status<E: std::fmt::Display>(result: Result<(), E>) -> String {
            match result {
                Ok(()) => "available".to_owned(),
                Err(e) => e.to_string(),
            }
        }

        let mut report = ProbeReport::new();
        report.insert("cpu", status(self.cpu.check_availability(host)));
        report.insert("memory", status(self.memory.check_availability(host)));
        report.insert("thermal", status(self.thermal.check_availability(host)));
        report.insert("uptime", status(host.uptime().map(drop)));
        report
    }
}
