//! Memory pressure sensor for hostpulse.
//!
//! Reports the share of physical memory in use, optionally including swap,
//! from the provider's [`MemoryStats`].

use hostpulse_core::{format, HostTelemetry, MemoryStats, Sensor, SensorError, SensorOutput};

/// Memory usage sensor.
///
/// Supports showing either used memory percentage or available memory
/// percentage, and optionally folds swap into the headline figure.
#[derive(Debug)]
pub struct MemorySensor {
    name: String,
    include_swap: bool,
    show_available: bool,
}

/// Percentage of RAM plus swap in use.
#[must_use]
pub fn combined_used_percentage(stats: &MemoryStats) -> f64 {
    let capacity = stats.total + stats.swap_total;
    if capacity == 0 {
        0.0
    } else {
        (stats.used() + stats.swap_used()) as f64 / capacity as f64 * 100.0
    }
}

impl MemorySensor {
    /// Create a new memory sensor.
    ///
    /// * `include_swap` - Whether to include swap usage in the headline figure
    /// * `show_available` - Whether to show available memory instead of used
    #[must_use]
    pub fn new(include_swap: bool, show_available: bool) -> Self {
        Self {
            name: "memory".to_owned(),
            include_swap,
            show_available,
        }
    }

    fn build_tooltip(&self, stats: &MemoryStats) -> String {
        let mut tooltip = format!(
            "Used: {} ({:.1}%)\nAvailable: {}\nTotal: {}",
            format::bytes_to_human(stats.used()),
            stats.used_percentage(),
            format::bytes_to_human(stats.available),
            format::bytes_to_human(stats.total),
        );

        if stats.swap_total > 0 {
            tooltip.push_str(&format!(
                "\nSwap: {} of {} ({:.1}%)",
                format::bytes_to_human(stats.swap_used()),
                format::bytes_to_human(stats.swap_total),
                stats.swap_used_percentage(),
            ));
        }

        tooltip
    }
}

impl Default for MemorySensor {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl Sensor for MemorySensor {
    type Error = SensorError;

    fn read(&mut self, host: &dyn HostTelemetry) -> Result<SensorOutput, Self::Error> {
        let stats = host.memory_stats()?;

        let (text, used_percent) = if self.show_available {
            let available = 100.0 - stats.used_percentage();
            (format!("{:.0}% free", available), stats.used_percentage())
        } else if self.include_swap {
            let combined = combined_used_percentage(&stats);
            (format!("{:3.0}%", combined), combined)
        } else {
            let used = stats.used_percentage();
            (format!("{:3.0}%", used), used)
        };

        Ok(SensorOutput::new(text)
            .with_tooltip(self.build_tooltip(&stats))
            .with_percentage(format::clamp_percentage(used_percent)))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn check_availability(&self, host: &dyn HostTelemetry) -> Result<(), Self::Error> {
        host.memory_stats().map(|_| ())
    }
}
