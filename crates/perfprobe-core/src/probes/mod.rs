//! Built-in probe backends and the catalogue of named probes.

pub mod helpers;

pub mod command;
pub mod native;
pub mod synthetic;

use std::sync::Arc;
use std::time::Duration;

use crate::probe::Probe;
use command::{cim_property, nvidia_smi, performance_counter, rocm_smi};
use helpers::Extract;
use native::{NativeMetric, SysinfoProbe};
use synthetic::FixedProbe;

const BYTES_TO_MB: f64 = 1.0 / (1024.0 * 1024.0);
const KB_TO_MB: f64 = 1.0 / 1024.0;

/// Overall CPU utilization, percent.
pub fn cpu_probes() -> Vec<Arc<dyn Probe>> {
    vec![
        Arc::new(performance_counter(
            "cpu.counter",
            "Processor(_Total) % Processor Time counter",
            r"\Processor(_Total)\% Processor Time",
            "pct",
        )),
        Arc::new(cim_property(
            "cpu.perfos",
            "PerfOS_Processor formatted counter class",
            "Win32_PerfFormattedData_PerfOS_Processor",
            "PercentProcessorTime",
            Some("_Total"),
            "pct",
        )),
        Arc::new(
            cim_property(
                "cpu.load",
                "Win32_Processor LoadPercentage",
                "Win32_Processor",
                "LoadPercentage",
                None,
                "pct",
            )
            .extract(Extract::Mean),
        ),
        Arc::new(SysinfoProbe::new(
            "cpu.sysinfo",
            "sysinfo global CPU usage",
            NativeMetric::CpuUsage,
        )),
    ]
}

/// 3D engine utilization, percent.
pub fn gpu_probes() -> Vec<Arc<dyn Probe>> {
    vec![
        Arc::new(
            performance_counter(
                "gpu.counter",
                "GPU Engine 3D Utilization Percentage counter",
                r"\GPU Engine(*engtype_3D)\Utilization Percentage",
                "pct",
            )
            .extract(Extract::Sum),
        ),
        Arc::new(
            cim_property(
                "gpu.cim",
                "GPUPerformanceCounters GPUEngine class",
                "Win32_PerfFormattedData_GPUPerformanceCounters_GPUEngine",
                "UtilizationPercentage",
                Some("*engtype_3D"),
                "pct",
            )
            .extract(Extract::Sum),
        ),
        Arc::new(nvidia_smi(
            "gpu.nvidia",
            "nvidia-smi utilization.gpu",
            "utilization.gpu",
            "pct",
        )),
        Arc::new(rocm_smi(
            "gpu.rocm",
            "rocm-smi GPU use",
            "--showuse",
            "pct",
        )),
    ]
}

/// Dedicated GPU memory in use, MB.
pub fn gpu_memory_probes() -> Vec<Arc<dyn Probe>> {
    vec![
        Arc::new(
            performance_counter(
                "gpu-memory.counter",
                "GPU Adapter Memory Dedicated Usage counter",
                r"\GPU Adapter Memory(*)\Dedicated Usage",
                "MB",
            )
            .extract(Extract::Sum)
            .scale(BYTES_TO_MB),
        ),
        Arc::new(
            cim_property(
                "gpu-memory.cim",
                "GPUPerformanceCounters GPUAdapterMemory class",
                "Win32_PerfFormattedData_GPUPerformanceCounters_GPUAdapterMemory",
                "DedicatedUsage",
                None,
                "MB",
            )
            .extract(Extract::Sum)
            .scale(BYTES_TO_MB),
        ),
        Arc::new(
            nvidia_smi(
                "gpu-memory.nvidia",
                "nvidia-smi memory.used",
                "memory.used",
                "MB",
            )
            .extract(Extract::Sum),
        ),
    ]
}

/// Available physical memory, MB.
pub fn memory_probes() -> Vec<Arc<dyn Probe>> {
    vec![
        Arc::new(performance_counter(
            "memory.counter",
            r"\Memory\Available MBytes counter",
            r"\Memory\Available MBytes",
            "MB",
        )),
        Arc::new(
            cim_property(
                "memory.cim",
                "Win32_OperatingSystem FreePhysicalMemory",
                "Win32_OperatingSystem",
                "FreePhysicalMemory",
                None,
                "MB",
            )
            .scale(KB_TO_MB),
        ),
        Arc::new(SysinfoProbe::new(
            "memory.sysinfo",
            "sysinfo available memory",
            NativeMetric::MemoryAvailable,
        )),
    ]
}

/// Current processor clock, MHz.
pub fn clock_probes() -> Vec<Arc<dyn Probe>> {
    vec![
        Arc::new(performance_counter(
            "clock.counter",
            "Processor Information Processor Frequency counter",
            r"\Processor Information(_Total)\Processor Frequency",
            "MHz",
        )),
        Arc::new(
            cim_property(
                "clock.cim",
                "Win32_Processor CurrentClockSpeed",
                "Win32_Processor",
                "CurrentClockSpeed",
                None,
                "MHz",
            )
            .extract(Extract::Mean),
        ),
        Arc::new(SysinfoProbe::new(
            "clock.sysinfo",
            "sysinfo mean CPU frequency",
            NativeMetric::CpuFrequency,
        )),
    ]
}

/// Two constant probes that answer at different speeds.
pub fn demo_probes() -> Vec<Arc<dyn Probe>> {
    vec![
        Arc::new(FixedProbe::new("demo.fast", 10.0, Duration::from_millis(5))),
        Arc::new(FixedProbe::new("demo.slow", 13.0, Duration::from_millis(40))),
    ]
}

/// Every built-in probe, grouped by metric.
pub fn all_probes() -> Vec<Arc<dyn Probe>> {
    let mut all = Vec::new();
    all.extend(cpu_probes());
    all.extend(gpu_probes());
    all.extend(gpu_memory_probes());
    all.extend(memory_probes());
    all.extend(clock_probes());
    all.extend(demo_probes());
    all
}

/// Built-in probes whose backend is present on this machine.
pub fn detect_available_probes() -> Vec<Arc<dyn Probe>> {
    all_probes()
        .into_iter()
        .filter(|p| p.is_available())
        .collect()
}

/// Look up a built-in probe by name (case-insensitive).
pub fn find_probe(name: &str) -> Option<Arc<dyn Probe>> {
    all_probes()
        .into_iter()
        .find(|p| p.name().eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalogue_names_unique() {
        let probes = all_probes();
        let names: HashSet<String> = probes.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names.len(), probes.len());
    }

    #[test]
    fn test_catalogue_names_are_grouped() {
        for p in all_probes() {
            assert!(p.name().contains('.'), "{} has no group prefix", p.name());
        }
    }

    #[test]
    fn test_find_probe() {
        assert!(find_probe("cpu.counter").is_some());
        assert!(find_probe("CPU.SYSINFO").is_some());
        assert!(find_probe("npu.xrt").is_none());
    }

    #[test]
    fn test_detect_includes_demo() {
        let names: Vec<String> = detect_available_probes()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert!(names.contains(&"demo.fast".to_string()));
    }

    #[test]
    fn test_demo_probes_available() {
        assert!(demo_probes().iter().all(|p| p.is_available()));
    }
}
