use crate::selector::{MetricSelector, ThermalSnapshot};
use hostpulse_core::{format, GlobalConfig, HostTelemetry, Sensor, SensorError, SensorOutput};

/// Temperature and fan sensor backed by the management controller.
///
/// Reading never fails: a missing controller or missing keys show up as
/// `N/A` and an empty fan list.
#[derive(Debug)]
pub struct ThermalSensor {
    name: String,
    selector: MetricSelector,
    critical_threshold: f64,
}

impl ThermalSensor {
    pub fn new(selector: MetricSelector, critical_threshold: f64) -> Self {
        Self {
            name: "thermal".to_owned(),
            selector,
            critical_threshold,
        }
    }

    /// Sensor using the key lists from the global configuration.
    pub fn from_config(global: &GlobalConfig, critical_threshold: f64) -> Result<Self, SensorError> {
        let selector = MetricSelector::from_config(global)?;
        Ok(Self::new(selector, critical_threshold))
    }

    #[must_use]
    pub fn selector(&self) -> &MetricSelector {
        &self.selector
    }

    fn build_tooltip(snapshot: &ThermalSnapshot) -> String {
        let mut tooltip = match snapshot.temperature {
            Some(celsius) => format!("Temperature: {celsius:.1}°C"),
            None => format!("Temperature: {}", format::UNAVAILABLE),
        };

        if snapshot.fans.is_empty() {
            tooltip.push_str("\nFans: none detected");
        }
        for fan in &snapshot.fans {
            tooltip.push_str(&format!("\nFan {}: {:.0} RPM", fan.channel, fan.rpm));
        }
        tooltip
    }
}

impl Default for ThermalSensor {
    fn default() -> Self {
        Self::new(MetricSelector::default(), 100.0)
    }
}

impl Sensor for ThermalSensor {
    type Error = SensorError;

    fn read(&mut self, host: &dyn HostTelemetry) -> Result<SensorOutput, Self::Error> {
        let snapshot = self.selector.sample(host);

        let mut output = match snapshot.temperature {
            Some(celsius) => SensorOutput::new(format!("{celsius:3.0}°C")).with_percentage(
                format::clamp_percentage(celsius / self.critical_threshold * 100.0),
            ),
            None => SensorOutput::unavailable(),
        };
        output.set_tooltip(Self::build_tooltip(&snapshot));
        Ok(output)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn check_availability(&self, host: &dyn HostTelemetry) -> Result<(), Self::Error> {
        self.selector.open(host).map(drop).map_err(SensorError::from)
    }
}
