//! Picks temperature and fan readings out of the controller's key space.
//!
//! Controller models expose different subsets of keys, so each metric is
//! backed by an ordered candidate list. Failures on individual keys are
//! expected and only logged at `debug`.

use crate::client::{query_key, SmcReading};
use crate::error::{Result, SmcError};
use crate::protocol::{fan_key, DataType, FourCc, SmcKey};
use hostpulse_core::{ControllerConnection, GlobalConfig, HostTelemetry, DEFAULT_TEMPERATURE_KEYS};
use serde::Serialize;
use tracing::debug;

/// Signed 7.8 fixed point.
pub const TYPE_SP78: DataType = FourCc::from_bytes(*b"sp78");
/// Unsigned 14.2 fixed point, big-endian.
pub const TYPE_FPE2: DataType = FourCc::from_bytes(*b"fpe2");
/// Little-endian IEEE-754 single.
pub const TYPE_FLT: DataType = FourCc::from_bytes(*b"flt ");

/// Highest fan channel count a key name can address.
pub const MAX_FAN_CHANNELS: u8 = 10;

/// Whether a decoded temperature is physically believable.
#[must_use]
pub fn is_plausible_temperature(celsius: f64) -> bool {
    celsius > 0.0 && celsius < 120.0
}

fn decode_flt(reading: &SmcReading) -> Option<f64> {
    (reading.data_type == TYPE_FLT && reading.data_size == 4).then(|| {
        let mut word = [0u8; 4];
        word.copy_from_slice(&reading.bytes[..4]);
        f64::from(f32::from_le_bytes(word))
    })
}

/// Decode a temperature reading in degrees Celsius.
///
/// `flt ` values of size 4 are taken as `f32`; everything else as
/// `byte0 + byte1 / 256`.
pub fn decode_temperature(reading: &SmcReading) -> Result<f64> {
    if let Some(value) = decode_flt(reading) {
        return Ok(value);
    }
    if reading.data_size < 2 {
        return Err(SmcError::decode_failed(
            reading.key,
            reading.data_type,
            reading.data_size,
            "need two bytes of fixed point",
        ));
    }
    Ok(f64::from(reading.bytes[0]) + f64::from(reading.bytes[1]) / 256.0)
}

/// Decode a fan speed reading in RPM.
pub fn decode_fan_rpm(reading: &SmcReading) -> Result<f64> {
    if let Some(value) = decode_flt(reading) {
        return Ok(value);
    }
    if reading.data_type != TYPE_FPE2 || reading.data_size < 2 {
        return Err(SmcError::decode_failed(
            reading.key,
            reading.data_type,
            reading.data_size,
            "expected fpe2 or flt",
        ));
    }
    Ok(f64::from(u16::from_be_bytes([reading.bytes[0], reading.bytes[1]])) / 4.0)
}

/// A fan channel that reported a positive speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FanReading {
    pub channel: u8,
    pub rpm: f64,
}

/// Everything read from the controller in one burst.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThermalSnapshot {
    pub temperature: Option<f64>,
    pub fans: Vec<FanReading>,
}

/// Ordered candidate keys per metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSelector {
    temperature_keys: Vec<SmcKey>,
    fan_channels: u8,
}

impl MetricSelector {
    /// # Panics
    ///
    /// Panics if `fan_channels` exceeds [`MAX_FAN_CHANNELS`].
    #[must_use]
    pub fn new(temperature_keys: Vec<SmcKey>, fan_channels: u8) -> Self {
        assert!(
            fan_channels <= MAX_FAN_CHANNELS,
            "at most {MAX_FAN_CHANNELS} fan channels"
        );
        Self {
            temperature_keys,
            fan_channels,
        }
    }

    /// Build from the configured key list and channel count.
    pub fn from_config(config: &GlobalConfig) -> Result<Self> {
        if config.fan_channels > MAX_FAN_CHANNELS {
            return Err(SmcError::invalid_key(
                format!("F{}Ac", config.fan_channels),
                "fan channel out of range",
            ));
        }
        let keys = config
            .temperature_keys
            .iter()
            .map(|k| k.parse())
            .collect::<Result<Vec<SmcKey>>>()?;
        Ok(Self::new(keys, config.fan_channels))
    }

    #[must_use]
    pub fn temperature_keys(&self) -> &[SmcKey] {
        &self.temperature_keys
    }

    #[must_use]
    pub fn fan_channels(&self) -> u8 {
        self.fan_channels
    }

    /// First plausible temperature among the candidate keys.
    pub fn read_temperature(&self, conn: &mut dyn ControllerConnection) -> Option<f64> {
        self.temperature_keys.iter().find_map(|&key| {
            match query_key(&mut *conn, key).and_then(|r| decode_temperature(&r)) {
                Ok(celsius) if is_plausible_temperature(celsius) => Some(celsius),
                Ok(celsius) => {
                    debug!(%key, celsius, "implausible temperature");
                    None
                }
                Err(e) => {
                    debug!(%key, category = e.category(), error = %e, "temperature key unavailable");
                    None
                }
            }
        })
    }

    /// Lazily probe each fan channel in order.
    pub fn fan_speeds<'a>(&self, conn: &'a mut dyn ControllerConnection) -> FanSpeeds<'a> {
        FanSpeeds {
            conn,
            next: 0,
            end: self.fan_channels,
        }
    }

    /// Open a connection to the controller service.
    pub fn open(&self, host: &dyn HostTelemetry) -> Result<Box<dyn ControllerConnection>> {
        host.open_controller()
            .map_err(|e| SmcError::service_unavailable(e.to_string()))
    }

    /// Open one connection, read every metric, and close it again.
    pub fn sample(&self, host: &dyn HostTelemetry) -> ThermalSnapshot {
        let mut conn = match self.open(host) {
            Ok(conn) => conn,
            Err(e) => {
                debug!(category = e.category(), error = %e, "controller unavailable");
                return ThermalSnapshot::default();
            }
        };

        let temperature = self.read_temperature(conn.as_mut());
        let fans = self.fan_speeds(conn.as_mut()).collect();
        ThermalSnapshot { temperature, fans }
    }
}

impl Default for MetricSelector {
    fn default() -> Self {
        Self::new(
            DEFAULT_TEMPERATURE_KEYS
                .iter()
                .map(|k| FourCc::from_bytes(k.as_bytes().try_into().unwrap_or(*b"????")))
                .collect(),
            4,
        )
    }
}

/// Iterator over fan channels reporting a positive RPM.
///
/// Each `next` call issues controller queries, so it is single-pass.
pub struct FanSpeeds<'a> {
    conn: &'a mut dyn ControllerConnection,
    next: u8,
    end: u8,
}

impl Iterator for FanSpeeds<'_> {
    type Item = FanReading;

    fn next(&mut self) -> Option<FanReading> {
        while self.next < self.end {
            let channel = self.next;
            self.next += 1;

            let key = fan_key(channel);
            match query_key(&mut *self.conn, key).and_then(|r| decode_fan_rpm(&r)) {
                Ok(rpm) if rpm > 0.0 => return Some(FanReading { channel, rpm }),
                Ok(_) => debug!(channel, "fan stopped"),
                Err(e) => {
                    debug!(channel, category = e.category(), error = %e, "fan channel unavailable")
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(usize::from(self.end - self.next)))
    }
}
