//! Host telemetry provider.
//!
//! Every raw counter the sensors consume comes through [`HostTelemetry`].
//! [`SystemHost`] talks to the running operating system; tests implement
//! the trait with canned data.

pub mod procfs;

#[cfg(target_os = "macos")]
pub mod macos;

use crate::SensorError;
use std::time::Duration;

/// Size in bytes of one management-controller request or reply.
pub const CONTROLLER_BUFFER_LEN: usize = 80;

/// Raw request/reply buffer exchanged with the management controller.
pub type ControllerBuffer = [u8; CONTROLLER_BUFFER_LEN];

/// Cumulative tick counters of one logical core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreTicks {
    /// Time spent in user mode
    pub user: u64,
    /// Time spent in kernel mode
    pub system: u64,
    /// Time spent in user mode at low priority
    pub nice: u64,
    /// Time spent idle
    pub idle: u64,
}

impl CoreTicks {
    /// Ticks spent doing work.
    #[must_use]
    pub const fn busy(&self) -> u64 {
        self.user + self.system + self.nice
    }

    /// All ticks.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.busy() + self.idle
    }
}

/// Physical memory statistics, all in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Total physical memory
    pub total: u64,
    /// Completely unused memory
    pub free: u64,
    /// Memory that can be handed to applications without swapping
    pub available: u64,
    /// Total swap space
    pub swap_total: u64,
    /// Free swap space
    pub swap_free: u64,
}

impl MemoryStats {
    /// Physical memory currently in use.
    #[must_use]
    pub const fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }

    /// Percentage of physical memory in use.
    #[must_use]
    pub fn used_percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.used() as f64 / self.total as f64) * 100.0
        }
    }

    /// Swap currently in use.
    #[must_use]
    pub const fn swap_used(&self) -> u64 {
        self.swap_total.saturating_sub(self.swap_free)
    }

    /// Percentage of swap in use.
    #[must_use]
    pub fn swap_used_percentage(&self) -> f64 {
        if self.swap_total == 0 {
            0.0
        } else {
            (self.swap_used() as f64 / self.swap_total as f64) * 100.0
        }
    }
}

/// An open connection to the platform management controller.
///
/// The connection is released when the value is dropped, so a query burst
/// is scoped by the lifetime of the boxed connection.
pub trait ControllerConnection: Send {
    /// Send one request buffer and return the controller's reply.
    fn call(&mut self, request: &ControllerBuffer) -> Result<ControllerBuffer, SensorError>;
}

/// Source of raw host counters.
pub trait HostTelemetry: Send + Sync {
    /// Per-core cumulative tick counters, in core order.
    fn tick_counters(&self) -> Result<Vec<CoreTicks>, SensorError>;

    /// Current physical memory statistics.
    fn memory_stats(&self) -> Result<MemoryStats, SensorError>;

    /// Open a fresh connection to the management controller.
    fn open_controller(&self) -> Result<Box<dyn ControllerConnection>, SensorError>;

    /// Time since boot.
    fn uptime(&self) -> Result<Duration, SensorError>;
}

/// The provider backed by the running operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl SystemHost {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "linux")]
impl HostTelemetry for SystemHost {
    fn tick_counters(&self) -> Result<Vec<CoreTicks>, SensorError> {
        procfs::ProcFs::default().tick_counters()
    }

    fn memory_stats(&self) -> Result<MemoryStats, SensorError> {
        procfs::ProcFs::default().memory_stats()
    }

    fn open_controller(&self) -> Result<Box<dyn ControllerConnection>, SensorError> {
        Err(SensorError::unavailable(
            "no system management controller on this platform",
        ))
    }

    fn uptime(&self) -> Result<Duration, SensorError> {
        procfs::ProcFs::default().uptime()
    }
}

#[cfg(target_os = "macos")]
impl HostTelemetry for SystemHost {
    fn tick_counters(&self) -> Result<Vec<CoreTicks>, SensorError> {
        macos::tick_counters()
    }

    fn memory_stats(&self) -> Result<MemoryStats, SensorError> {
        macos::memory_stats()
    }

    fn open_controller(&self) -> Result<Box<dyn ControllerConnection>, SensorError> {
        Ok(Box::new(macos::SmcConnection::open()?))
    }

    fn uptime(&self) -> Result<Duration, SensorError> {
        macos::uptime()
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
impl HostTelemetry for SystemHost {
    fn tick_counters(&self) -> Result<Vec<CoreTicks>, SensorError> {
        Err(SensorError::unavailable("tick counters are not supported on this platform"))
    }

    fn memory_stats(&self) -> Result<MemoryStats, SensorError> {
        Err(SensorError::unavailable("memory statistics are not supported on this platform"))
    }

    fn open_controller(&self) -> Result<Box<dyn ControllerConnection>, SensorError> {
        Err(SensorError::unavailable(
            "no system management controller on this platform",
        ))
    }

    fn uptime(&self) -> Result<Duration, SensorError> {
        Err(SensorError::unavailable("uptime is not supported on this platform"))
    }
}
