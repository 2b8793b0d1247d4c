//! CPU load monitoring for hostpulse.
//!
//! This crate turns the cumulative per-core tick counters reported by a
//! [`hostpulse_core::HostTelemetry`] provider into an instantaneous
//! utilization percentage by differencing consecutive samples.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hostpulse_core::SystemHost;
//! use hostpulse_cpu::CpuSensor;
//!
//! let host = SystemHost::new();
//! let mut sensor = CpuSensor::new();
//!
//! // The first sample only establishes a baseline and reports 0
//! let _ = sensor.sample_utilization(&host);
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! println!("CPU usage: {:.1}%", sensor.sample_utilization(&host));
//! ```

pub mod cpu;

pub use cpu::{average_usage, core_usage_percent, CpuSensor};
