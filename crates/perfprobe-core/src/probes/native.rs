//! In-process probes backed by the `sysinfo` introspection library.
//!
//! Each query builds a fresh `System`, so no state is carried between
//! invocations. CPU usage needs two refreshes separated by
//! `MINIMUM_CPU_UPDATE_INTERVAL`, which is part of its latency.

use std::time::Duration;

use sysinfo::System;

use crate::error::ErrorKind;
use crate::probe::{Probe, ProbeInfo, ProbeKind};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Metric read from `sysinfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeMetric {
    /// Global CPU usage in percent.
    CpuUsage,
    /// Mean CPU frequency across logical processors, MHz.
    CpuFrequency,
    /// Available physical memory, MB.
    MemoryAvailable,
    /// Used physical memory, percent of total.
    MemoryUsed,
}

impl NativeMetric {
    fn unit(self) -> &'static str {
        match self {
            Self::CpuUsage | Self::MemoryUsed => "pct",
            Self::CpuFrequency => "MHz",
            Self::MemoryAvailable => "MB",
        }
    }
}

pub struct SysinfoProbe {
    info: ProbeInfo,
    metric: NativeMetric,
}

impl SysinfoProbe {
    pub fn new(name: &str, description: &str, metric: NativeMetric) -> Self {
        Self {
            info: ProbeInfo::new(name, description, ProbeKind::Native, metric.unit()),
            metric,
        }
    }

    pub fn metric(&self) -> NativeMetric {
        self.metric
    }
}

impl Probe for SysinfoProbe {
    fn info(&self) -> &ProbeInfo {
        &self.info
    }

    fn is_available(&self) -> bool {
        sysinfo::IS_SUPPORTED_SYSTEM
    }

    fn query(&self, _timeout: Duration) -> Result<f64, ErrorKind> {
        let mut sys = System::new();
        match self.metric {
            NativeMetric::CpuUsage => {
                sys.refresh_cpu_usage();
                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
                sys.refresh_cpu_usage();
                if sys.cpus().is_empty() {
                    return Err(ErrorKind::QueryFailed("no CPUs reported".to_string()));
                }
                Ok(f64::from(sys.global_cpu_usage()))
            }
            NativeMetric::CpuFrequency => {
                sys.refresh_cpu_frequency();
                let cpus = sys.cpus();
                if cpus.is_empty() {
                    return Err(ErrorKind::QueryFailed("no CPUs reported".to_string()));
                }
                let total: u64 = cpus.iter().map(|c| c.frequency()).sum();
                Ok(total as f64 / cpus.len() as f64)
            }
            NativeMetric::MemoryAvailable => {
                sys.refresh_memory();
                if sys.total_memory() == 0 {
                    return Err(ErrorKind::QueryFailed("memory size unknown".to_string()));
                }
                Ok(sys.available_memory() as f64 / BYTES_PER_MB)
            }
            NativeMetric::MemoryUsed => {
                sys.refresh_memory();
                let total = sys.total_memory();
                if total == 0 {
                    return Err(ErrorKind::QueryFailed("memory size unknown".to_string()));
                }
                Ok(sys.used_memory() as f64 / total as f64 * 100.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units() {
        assert_eq!(SysinfoProbe::new("a", "a", NativeMetric::CpuUsage).info().unit, "pct");
        assert_eq!(SysinfoProbe::new("a", "a", NativeMetric::CpuFrequency).info().unit, "MHz");
        assert_eq!(SysinfoProbe::new("a", "a", NativeMetric::MemoryAvailable).info().unit, "MB");
        assert_eq!(SysinfoProbe::new("a", "a", NativeMetric::MemoryUsed).info().kind, ProbeKind::Native);
    }

    #[test]
    fn test_cpu_usage_in_range() {
        let p = SysinfoProbe::new("cpu.sysinfo", "cpu", NativeMetric::CpuUsage);
        if !p.is_available() {
            return;
        }
        let v = p.query(Duration::from_secs(2)).unwrap();
        assert!((0.0..=100.0).contains(&v), "usage {v}");
    }

    #[test]
    fn test_memory_used_in_range() {
        let p = SysinfoProbe::new("mem.sysinfo", "mem", NativeMetric::MemoryUsed);
        if !p.is_available() {
            return;
        }
        let v = p.query(Duration::from_secs(2)).unwrap();
        assert!(v > 0.0 && v <= 100.0, "used {v}");
    }
}
