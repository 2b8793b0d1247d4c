//! # hostpulse-core
//!
//! Core library for the hostpulse sampling suite providing the shared pieces
//! every sensor crate builds on.
//!
//! ## Features
//!
//! - **Host telemetry provider** - Injectable access to tick counters, memory
//!   statistics, uptime and the management controller
//! - **JSON output format** - One plain object per reading for any display
//! - **Common sensor traits** - Standardized sensor interface
//! - **Configuration management** - RON-based configuration with validation
//! - **Error handling** - Comprehensive error types with context
//!
//! ## Quick Start
//!
//! ```rust
//! use hostpulse_core::{HostTelemetry, Sensor, SensorOutput};
//!
//! // Implement the Sensor trait for your custom sensor
//! struct MySensor {
//!     name: String,
//! }
//!
//! impl Sensor for MySensor {
//!     type Error = hostpulse_core::SensorError;
//!
//!     fn read(&mut self, host: &dyn HostTelemetry) -> Result<SensorOutput, Self::Error> {
//!         let uptime = host.uptime()?;
//!         Ok(SensorOutput::new(hostpulse_core::format::duration_to_human(uptime)))
//!     }
//!
//!     fn name(&self) -> &str {
//!         &self.name
//!     }
//! }
//! ```

pub mod host;

pub use host::{
    ControllerBuffer, ControllerConnection, CoreTicks, HostTelemetry, MemoryStats, SystemHost,
    CONTROLLER_BUFFER_LEN,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Plain output record handed to the display layer.
///
/// All fields except `text` are optional and will be omitted from JSON
/// serialization if they are `None`.
///
/// # Examples
///
/// ```rust
/// use hostpulse_core::SensorOutput;
///
/// let output = SensorOutput::new("50%".to_string())
///     .with_tooltip("CPU Usage: 50%")
///     .with_percentage(50);
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SensorOutput {
    /// The main text to display
    pub text: String,
    /// Optional detail text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    /// Optional percentage value (0-100) for progress indicators
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u8>,
}

impl SensorOutput {
    /// Create a new SensorOutput with just the required text field.
    #[must_use]
    pub const fn new(text: String) -> Self {
        Self {
            text,
            tooltip: None,
            percentage: None,
        }
    }

    /// Create a new SensorOutput from a string literal.
    #[must_use]
    pub fn from_str(text: &str) -> Self {
        Self::new(text.to_owned())
    }

    /// The sentinel shown whenever a reading is unavailable.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::from_str(format::UNAVAILABLE)
    }

    /// Add a tooltip to this output.
    #[must_use]
    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    /// Add a percentage value to this output.
    ///
    /// # Panics
    ///
    /// Panics if `percentage` is greater than 100.
    #[must_use]
    pub fn with_percentage(mut self, percentage: u8) -> Self {
        assert!(
            percentage <= 100,
            "Percentage must be <= 100, got {}",
            percentage
        );
        self.percentage = Some(percentage);
        self
    }

    /// Set the tooltip on this output (mutable version).
    pub fn set_tooltip(&mut self, tooltip: impl Into<String>) {
        self.tooltip = Some(tooltip.into());
    }
}

/// Global configuration loaded from ~/.config/hostpulse/config.ron
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Sampling interval in milliseconds
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
    /// Minimum time between two login-history computations, in seconds
    #[serde(default = "default_session_cooldown")]
    pub session_cooldown_secs: u64,
    /// Terminal field that marks a console session in `last` output
    #[serde(default = "default_console_marker")]
    pub console_marker: String,
    /// Temperature keys tried in priority order
    #[serde(default = "default_temperature_keys")]
    pub temperature_keys: Vec<String>,
    /// Number of fan channels probed (`F0Ac`, `F1Ac`, ...)
    #[serde(default = "default_fan_channels")]
    pub fan_channels: u8,
    /// Command producing the login history
    #[serde(default = "default_last_command")]
    pub last_command: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
            session_cooldown_secs: default_session_cooldown(),
            console_marker: default_console_marker(),
            temperature_keys: default_temperature_keys(),
            fan_channels: default_fan_channels(),
            last_command: default_last_command(),
        }
    }
}

fn default_update_interval() -> u64 {
    1000
}

fn default_session_cooldown() -> u64 {
    60
}

fn default_console_marker() -> String {
    "console".to_owned()
}

/// Temperature keys in the order they are tried.
pub const DEFAULT_TEMPERATURE_KEYS: [&str; 6] = ["TC0P", "TC0D", "TC0E", "TC1C", "TC2C", "TCXC"];

fn default_temperature_keys() -> Vec<String> {
    DEFAULT_TEMPERATURE_KEYS.iter().map(|k| (*k).to_owned()).collect()
}

fn default_fan_channels() -> u8 {
    4
}

fn default_last_command() -> String {
    "last".to_owned()
}

impl GlobalConfig {
    /// Minimum allowed update interval in milliseconds.
    pub const MIN_UPDATE_INTERVAL: u64 = 100;

    /// Load configuration from the standard config file location.
    ///
    /// Searches for config in:
    /// 1. ~/.config/hostpulse/config.ron
    /// 2. ~/.hostpulse/config.ron (fallback)
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self, SensorError> {
        if let Some(config_path) = Self::find_config_file() {
            tracing::debug!(path = %config_path.display(), "loading config");
            Self::load_from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self, SensorError> {
        let content = std::fs::read_to_string(path)?;

        let config: GlobalConfig = ron::from_str(&content).map_err(|e| SensorError::Parse {
            message: format!("Failed to parse config file: {}", e),
            source: None,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the samplers cannot work with.
    pub fn validate(&self) -> Result<(), SensorError> {
        if self.update_interval < Self::MIN_UPDATE_INTERVAL {
            return Err(SensorError::config_with_value(
                format!(
                    "Update interval must be at least {}ms",
                    Self::MIN_UPDATE_INTERVAL
                ),
                self.update_interval.to_string(),
            ));
        }
        if let Some(bad) = self.temperature_keys.iter().find(|k| k.len() != 4 || !k.is_ascii()) {
            return Err(SensorError::config_with_value(
                "Temperature keys must be exactly four ASCII characters",
                bad.clone(),
            ));
        }
        if self.fan_channels > 10 {
            return Err(SensorError::config_with_value(
                "At most 10 fan channels can be addressed",
                self.fan_channels.to_string(),
            ));
        }
        Ok(())
    }

    /// Find the config file in standard locations.
    pub fn find_config_file() -> Option<PathBuf> {
        // Try XDG config directory first
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_path = config_dir.join("hostpulse").join("config.ron");
            if xdg_path.exists() {
                return Some(xdg_path);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".hostpulse").join("config.ron");
            if home_path.exists() {
                return Some(home_path);
            }
        }

        None
    }

    /// Get the default config file path for writing.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hostpulse").join("config.ron"))
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> Result<(), SensorError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| SensorError::Parse {
                message: format!("Failed to serialize config: {}", e),
                source: None,
            })?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Sampling interval as a Duration.
    #[must_use]
    pub fn update_interval_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.update_interval)
    }

    /// Session cooldown as a Duration.
    #[must_use]
    pub fn session_cooldown(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_cooldown_secs)
    }

    /// Save example configuration with full documentation to a file.
    pub fn save_example_config_to_file(path: &Path) -> Result<(), SensorError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = r##"// hostpulse Configuration File
// ============================
// Copy this to ~/.config/hostpulse/config.ron and customize as needed.
//
// Note: Command line arguments override these settings.

(
    // Sampling interval in milliseconds (minimum 100ms)
    update_interval: 1000,

    // Minimum seconds between two login-history computations.
    // Measured from the end of the previous computation.
    session_cooldown_secs: 60,

    // Terminal field identifying console sessions in `last` output
    console_marker: "console",

    // Management controller temperature keys, tried in order.
    // The first plausible reading (0-120 C) wins.
    temperature_keys: ["TC0P", "TC0D", "TC0E", "TC1C", "TC2C", "TCXC"],

    // Fan channels probed as F0Ac, F1Ac, ...
    fan_channels: 4,

    // Command printing the login history
    last_command: "last",
)
"##;

        std::fs::write(path, template)?;
        Ok(())
    }
}

/// Trait for all per-tick sensors.
///
/// Sensors never touch the operating system directly; every raw counter
/// comes from the [`HostTelemetry`] passed into [`Sensor::read`], so tests
/// can substitute a fake provider.
///
/// # Examples
///
/// ```rust
/// use hostpulse_core::{HostTelemetry, Sensor, SensorOutput, SensorError};
///
/// struct MemorySensor {
///     name: String,
/// }
///
/// impl Sensor for MemorySensor {
///     type Error = SensorError;
///
///     fn read(&mut self, host: &dyn HostTelemetry) -> Result<SensorOutput, Self::Error> {
///         let stats = host.memory_stats()?;
///         Ok(SensorOutput::new(format!("{:.0}%", stats.used_percentage())))
///     }
///
///     fn name(&self) -> &str {
///         &self.name
///     }
/// }
/// ```
pub trait Sensor {
    /// Error type for sensor operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Take one reading through the given provider.
    ///
    /// Called once per sampling tick, so it must stay lightweight.
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor data cannot be read or parsed.
    fn read(&mut self, host: &dyn HostTelemetry) -> Result<SensorOutput, Self::Error>;

    /// Get the unique name/identifier for this sensor.
    fn name(&self) -> &str;

    /// Check if the sensor is available on this host.
    ///
    /// Default implementation returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor is not available or supported.
    fn check_availability(&self, _host: &dyn HostTelemetry) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Utility functions for formatting sensor data.
pub mod format {
    use std::time::Duration;

    /// Text shown in place of any reading that could not be taken.
    pub const UNAVAILABLE: &str = "N/A";

    /// Format a duration as hours and minutes.
    ///
    /// A non-zero hour component gives `"{h}h {m}m"`, anything shorter
    /// gives `"{m}m"`. Seconds are truncated. Session totals and uptime
    /// share this rule.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hostpulse_core::format;
    /// use std::time::Duration;
    ///
    /// assert_eq!(format::duration_to_human(Duration::from_secs(59)), "0m");
    /// assert_eq!(format::duration_to_human(Duration::from_secs(5_400)), "1h 30m");
    /// ```
    #[must_use]
    pub fn duration_to_human(duration: Duration) -> String {
        let total = duration.as_secs();
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        if hours > 0 {
            format!("{hours}h {minutes}m")
        } else {
            format!("{minutes}m")
        }
    }

    /// Format an optional duration, using [`UNAVAILABLE`] for `None`.
    #[must_use]
    pub fn optional_duration_to_human(duration: Option<Duration>) -> String {
        duration.map_or_else(|| UNAVAILABLE.to_owned(), duration_to_human)
    }

    /// Format bytes into a human-readable string with appropriate units.
    ///
    /// Uses binary units (1024-based) and shows 1 decimal place for values >= 1KB.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hostpulse_core::format;
    ///
    /// assert_eq!(format::bytes_to_human(512), "512B");
    /// assert_eq!(format::bytes_to_human(1536), "1.5KB");
    /// ```
    #[must_use]
    pub fn bytes_to_human(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
        const THRESHOLD: f64 = 1024.0;

        if bytes == 0 {
            return "0B".to_owned();
        }

        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= THRESHOLD && unit_idx < UNITS.len() - 1 {
            size /= THRESHOLD;
            unit_idx += 1;
        }

        if unit_idx == 0 {
            format!("{size:.0}{}", UNITS[unit_idx])
        } else {
            format!("{size:.1}{}", UNITS[unit_idx])
        }
    }

    /// Round a percentage into the 0-100 range used by [`super::SensorOutput`].
    #[must_use]
    pub fn clamp_percentage(value: f64) -> u8 {
        if value.is_nan() {
            return 0;
        }
        value.round().clamp(0.0, 100.0) as u8
    }
}

/// Common error types for sensor operations.
///
/// This enum provides a comprehensive set of error types that cover
/// the most common failure modes in sensor implementations.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// I/O error occurred while reading sensor data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing sensor data from text format.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what failed to parse
        message: String,
        /// Optional source error for chaining
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error (invalid settings, etc.).
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration issue
        message: String,
        /// The invalid configuration value if applicable
        value: Option<String>,
    },

    /// Sensor is not available on this system.
    #[error("Sensor unavailable: {reason}")]
    Unavailable {
        /// Reason why the sensor is unavailable
        reason: String,
    },

    /// Permission denied accessing sensor data.
    #[error("Permission denied: {resource}")]
    PermissionDenied {
        /// The resource that couldn't be accessed
        resource: String,
    },

    /// A platform call returned a failure code.
    #[error("{call} failed with code {code}")]
    Platform {
        /// Name of the failing call
        call: &'static str,
        /// Raw return code
        code: i32,
    },

    /// Invalid data format or unexpected values.
    #[error("Invalid data: {message}")]
    InvalidData {
        /// Description of what makes the data invalid
        message: String,
        /// The invalid data if it can be safely displayed
        data: Option<String>,
    },
}

impl SensorError {
    /// Create a new parse error with a simple message.
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new parse error with a source error.
    pub fn parse_with_source<S: Into<String>, E>(message: S, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new configuration error with the invalid value.
    pub fn config_with_value<S: Into<String>, V: Into<String>>(message: S, value: V) -> Self {
        Self::Config {
            message: message.into(),
            value: Some(value.into()),
        }
    }

    /// Create a new unavailable error.
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a new permission denied error.
    pub fn permission_denied<S: Into<String>>(resource: S) -> Self {
        Self::PermissionDenied {
            resource: resource.into(),
        }
    }

    /// Create a new platform call error.
    pub fn platform(call: &'static str, code: i32) -> Self {
        Self::Platform { call, code }
    }

    /// Create a new invalid data error.
    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        Self::InvalidData {
            message: message.into(),
            data: None,
        }
    }

    /// Create a new invalid data error with the problematic data.
    pub fn invalid_data_with_value<S: Into<String>, D: Into<String>>(message: S, data: D) -> Self {
        Self::InvalidData {
            message: message.into(),
            data: Some(data.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_sensor_output_builder() {
        let output = SensorOutput::from_str("50%")
            .with_tooltip("CPU Usage: 50%")
            .with_percentage(50);

        assert_eq!(output.text, "50%");
        assert_eq!(output.tooltip, Some("CPU Usage: 50%".to_owned()));
        assert_eq!(output.percentage, Some(50));
    }

    #[test]
    #[should_panic(expected = "Percentage must be <= 100")]
    fn test_sensor_output_invalid_percentage() {
        let _ = SensorOutput::from_str("150%").with_percentage(150);
    }

    #[test]
    fn test_sensor_output_skips_empty_fields() {
        let json = serde_json::to_string(&SensorOutput::unavailable()).unwrap();
        assert_eq!(json, r#"{"text":"N/A"}"#);
    }

    #[test]
    fn test_duration_to_human() {
        assert_eq!(format::duration_to_human(Duration::ZERO), "0m");
        assert_eq!(format::duration_to_human(Duration::from_secs(59)), "0m");
        assert_eq!(format::duration_to_human(Duration::from_secs(45 * 60)), "45m");
        assert_eq!(format::duration_to_human(Duration::from_secs(3600)), "1h 0m");
        assert_eq!(
            format::duration_to_human(Duration::from_secs(26 * 3600 + 5 * 60 + 30)),
            "26h 5m"
        );
        assert_eq!(format::optional_duration_to_human(None), "N/A");
    }

    #[test]
    fn test_bytes_to_human() {
        assert_eq!(format::bytes_to_human(0), "0B");
        assert_eq!(format::bytes_to_human(512), "512B");
        assert_eq!(format::bytes_to_human(1024), "1.0KB");
        assert_eq!(format::bytes_to_human(1048576), "1.0MB");
        assert_eq!(format::bytes_to_human(1073741824), "1.0GB");
    }

    #[test]
    fn test_clamp_percentage() {
        assert_eq!(format::clamp_percentage(-3.0), 0);
        assert_eq!(format::clamp_percentage(49.6), 50);
        assert_eq!(format::clamp_percentage(180.0), 100);
        assert_eq!(format::clamp_percentage(f64::NAN), 0);
    }

    #[test]
    fn test_global_config_defaults() {
        let config = GlobalConfig::default();
        assert_eq!(config.update_interval, 1000);
        assert_eq!(config.session_cooldown(), Duration::from_secs(60));
        assert_eq!(config.console_marker, "console");
        assert_eq!(config.temperature_keys[0], "TC0P");
        assert_eq!(config.temperature_keys.len(), 6);
        assert_eq!(config.fan_channels, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_global_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ron");

        let mut config = GlobalConfig::default();
        config.session_cooldown_secs = 120;
        config.temperature_keys = vec!["TC0P".to_owned()];
        config.save_to_file(&path).unwrap();

        let loaded = GlobalConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_example_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ron");
        GlobalConfig::save_example_config_to_file(&path).unwrap();

        let loaded = GlobalConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, GlobalConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ron");
        std::fs::write(&path, "(update_interval: 2000)").unwrap();

        let loaded = GlobalConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.update_interval, 2000);
        assert_eq!(loaded.last_command, "last");
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let mut config = GlobalConfig::default();
        config.temperature_keys.push("TOOLONG".to_owned());
        assert!(matches!(config.validate(), Err(SensorError::Config { .. })));

        let mut config = GlobalConfig::default();
        config.update_interval = 10;
        assert!(config.validate().is_err());
        config.update_interval = GlobalConfig::MIN_UPDATE_INTERVAL;
        assert!(config.validate().is_ok());
        assert_eq!(config.update_interval_duration(), Duration::from_millis(100));
    }

    #[test]
    fn test_sensor_error_constructors() {
        let err = SensorError::parse("Invalid format");
        assert!(matches!(err, SensorError::Parse { .. }));

        let err = SensorError::config_with_value("Invalid setting", "bad_value");
        assert!(matches!(err, SensorError::Config { .. }));

        let err = SensorError::unavailable("Not supported");
        assert_eq!(err.to_string(), "Sensor unavailable: Not supported");

        let err = SensorError::platform("IOServiceOpen", -536870212);
        assert_eq!(err.to_string(), "IOServiceOpen failed with code -536870212");
    }
}
