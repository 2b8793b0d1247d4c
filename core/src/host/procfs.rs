//! Counters read from the Linux `/proc` filesystem.

use super::{CoreTicks, MemoryStats};
use crate::SensorError;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Reader for `/proc/stat`, `/proc/meminfo` and `/proc/uptime`.
///
/// The root is configurable so tests can point it at a fixture directory.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, name: &str) -> Result<String, SensorError> {
        let path = self.root.join(name);
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                SensorError::permission_denied(path.display().to_string())
            }
            _ => SensorError::Io(e),
        })
    }

    /// Per-core tick counters from `stat`.
    pub fn tick_counters(&self) -> Result<Vec<CoreTicks>, SensorError> {
        parse_stat(&self.read("stat")?)
    }

    /// Memory statistics from `meminfo`.
    pub fn memory_stats(&self) -> Result<MemoryStats, SensorError> {
        parse_meminfo(&self.read("meminfo")?)
    }

    /// Time since boot from `uptime`.
    pub fn uptime(&self) -> Result<Duration, SensorError> {
        parse_uptime(&self.read("uptime")?)
    }
}

/// Parse the per-core `cpuN` lines of `/proc/stat`.
///
/// The aggregate `cpu ` line is skipped. iowait is folded into idle and
/// irq, softirq and steal into system, so the four buckets still cover
/// all elapsed time.
pub fn parse_stat(content: &str) -> Result<Vec<CoreTicks>, SensorError> {
    let mut cores = Vec::new();

    for line in content.lines() {
        if !line.starts_with("cpu") || line.starts_with("cpu ") {
            continue;
        }

        let mut fields = line.split_whitespace();
        let label = fields.next().unwrap_or_default();
        if label["cpu".len()..].parse::<usize>().is_err() {
            continue;
        }

        let values: Result<Vec<u64>, _> = fields.take(8).map(str::parse).collect();
        let values = values
            .map_err(|e| SensorError::parse_with_source("Failed to parse CPU statistics", e))?;

        if values.len() < 4 {
            return Err(SensorError::parse(format!(
                "Insufficient CPU statistics: expected at least 4, got {}",
                values.len()
            )));
        }

        let extra = |i: usize| values.get(i).copied().unwrap_or(0);
        cores.push(CoreTicks {
            user: values[0],
            nice: values[1],
            system: values[2] + extra(5) + extra(6) + extra(7),
            idle: values[3] + extra(4),
        });
    }

    Ok(cores)
}

/// Parse `/proc/meminfo` into byte counts.
pub fn parse_meminfo(content: &str) -> Result<MemoryStats, SensorError> {
    let mut stats = MemoryStats::default();
    let mut buffers = 0;
    let mut cached = 0;

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let key = parts[0].trim_end_matches(':');
        let value = parts[1].parse::<u64>().map_err(|e| {
            SensorError::parse_with_source(format!("Failed to parse {} value", key), e)
        })?;

        // meminfo values are in kB
        let value_bytes = value * 1024;

        match key {
            "MemTotal" => stats.total = value_bytes,
            "MemFree" => stats.free = value_bytes,
            "MemAvailable" => stats.available = value_bytes,
            "Buffers" => buffers = value_bytes,
            "Cached" => cached = value_bytes,
            "SwapTotal" => stats.swap_total = value_bytes,
            "SwapFree" => stats.swap_free = value_bytes,
            _ => {}
        }
    }

    if stats.total == 0 {
        return Err(SensorError::invalid_data("meminfo has no MemTotal"));
    }

    // Kernels older than 3.14 have no MemAvailable
    if stats.available == 0 {
        stats.available = stats.free + buffers + cached;
    }

    Ok(stats)
}

/// Parse the first field of `/proc/uptime`.
pub fn parse_uptime(content: &str) -> Result<Duration, SensorError> {
    let first = content
        .split_whitespace()
        .next()
        .ok_or_else(|| SensorError::invalid_data("Empty uptime file"))?;
    let secs: f64 = first
        .parse()
        .map_err(|e| SensorError::parse_with_source("Failed to parse uptime", e))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| SensorError::invalid_data_with_value("Uptime out of range", first))
}
