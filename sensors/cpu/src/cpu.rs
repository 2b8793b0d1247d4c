//! CPU load differencer for hostpulse.
//!
//! Utilization is the share of non-idle ticks between two consecutive
//! samples, computed per core and averaged across cores.

use hostpulse_core::{format, CoreTicks, HostTelemetry, Sensor, SensorError, SensorOutput};
use tracing::{debug, warn};

/// CPU load sensor that keeps one generation of tick counters as baseline.
///
/// # Examples
///
/// ```rust,no_run
/// use hostpulse_core::{Sensor, SystemHost};
/// use hostpulse_cpu::CpuSensor;
///
/// let host = SystemHost::new();
/// let mut sensor = CpuSensor::new();
/// let output = sensor.read(&host)?;
/// println!("CPU usage: {}", output.text);
/// # Ok::<(), hostpulse_core::SensorError>(())
/// ```
#[derive(Debug)]
pub struct CpuSensor {
    name: String,
    baseline: Option<Vec<CoreTicks>>,
    core_usages: Vec<f64>,
}

/// Utilization of a single core between two samples, in percent.
///
/// Counter regressions count as zero progress. Returns 0.0 if no ticks
/// elapsed.
#[must_use]
pub fn core_usage_percent(prev: &CoreTicks, current: &CoreTicks) -> f64 {
    let busy = current.user.saturating_sub(prev.user)
        + current.system.saturating_sub(prev.system)
        + current.nice.saturating_sub(prev.nice);
    let total = busy + current.idle.saturating_sub(prev.idle);

    if total == 0 {
        0.0
    } else {
        ((busy as f64) / (total as f64) * 100.0).clamp(0.0, 100.0)
    }
}

/// Per-core utilization and their mean, or `None` if the core counts differ.
#[must_use]
pub fn average_usage(prev: &[CoreTicks], current: &[CoreTicks]) -> Option<(f64, Vec<f64>)> {
    if prev.len() != current.len() {
        return None;
    }

    let per_core: Vec<f64> = prev
        .iter()
        .zip(current)
        .map(|(p, c)| core_usage_percent(p, c))
        .collect();
    let cores = per_core.len().max(1);
    let mean = per_core.iter().sum::<f64>() / cores as f64;

    Some((mean, per_core))
}

impl CpuSensor {
    /// Create a CPU sensor with no baseline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "cpu".to_owned(),
            baseline: None,
            core_usages: Vec::new(),
        }
    }

    /// Take a sample and return utilization since the previous one.
    ///
    /// Returns 0 on the first call, when the core count changed, or when the
    /// provider fails. The new sample always replaces the baseline; a failed
    /// read leaves the old baseline in place.
    pub fn sample_utilization(&mut self, host: &dyn HostTelemetry) -> f64 {
        let current = match host.tick_counters() {
            Ok(ticks) => ticks,
            Err(e) => {
                warn!(error = %e, "failed to read tick counters");
                return 0.0;
            }
        };

        let usage = match self
            .baseline
            .as_deref()
            .and_then(|prev| average_usage(prev, &current))
        {
            Some((mean, per_core)) => {
                self.core_usages = per_core;
                mean
            }
            None => {
                debug!(cores = current.len(), "establishing new tick baseline");
                self.core_usages.clear();
                0.0
            }
        };

        self.baseline = Some(current);
        usage
    }

    /// Per-core utilization from the most recent delta.
    #[must_use]
    pub fn core_usages(&self) -> &[f64] {
        &self.core_usages
    }
}

impl Default for CpuSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for CpuSensor {
    type Error = SensorError;

    fn read(&mut self, host: &dyn HostTelemetry) -> Result<SensorOutput, Self::Error> {
        let usage = self.sample_utilization(host);

        let mut tooltip = format!("Overall Usage: {:.1}%", usage);
        for (core_id, core_usage) in self.core_usages.iter().enumerate() {
            tooltip.push_str(&format!("\nCore {:2}: {:5.1}%", core_id, core_usage));
        }

        Ok(SensorOutput::new(format!("{:3.0}%", usage))
            .with_tooltip(tooltip)
            .with_percentage(format::clamp_percentage(usage)))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn check_availability(&self, host: &dyn HostTelemetry) -> Result<(), Self::Error> {
        let ticks = host.tick_counters()?;
        if ticks.is_empty() {
            return Err(SensorError::unavailable("no per-core tick counters reported"));
        }
        Ok(())
    }
}
