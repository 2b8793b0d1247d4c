//! System Management Controller client for hostpulse.
//!
//! [`query_key`] performs the two-phase key query over an open
//! [`hostpulse_core::ControllerConnection`]; [`MetricSelector`] turns the raw
//! key space into a temperature and a list of fan speeds.

pub mod client;
pub mod error;
pub mod protocol;
pub mod selector;
pub mod thermal;

#[cfg(test)]
mod testing;

pub use client::{query_key, SmcReading};
pub use error::SmcError;
pub use protocol::{fan_key, DataType, FourCc, SmcKey, SmcReply, SmcRequest};
pub use selector::{
    decode_fan_rpm, decode_temperature, is_plausible_temperature, FanReading, FanSpeeds,
    MetricSelector, ThermalSnapshot,
};
pub use thermal::ThermalSensor;
