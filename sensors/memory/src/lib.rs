//! Memory pressure monitoring for hostpulse.
//!
//! This crate reports physical memory usage from the statistics a
//! [`hostpulse_core::HostTelemetry`] provider exposes.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hostpulse_core::{Sensor, SystemHost};
//! use hostpulse_memory::MemorySensor;
//!
//! let mut sensor = MemorySensor::new(false, false);
//! let output = sensor.read(&SystemHost::new())?;
//! println!("Memory usage: {}", output.text);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod memory;

pub use memory::MemorySensor;
