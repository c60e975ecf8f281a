//! Hardware identity: which CPUs and GPUs this machine has, and who made them.
//!
//! CPU names come from `sysinfo`. GPU names come from `Win32_VideoController`
//! on Windows and from `nvidia-smi` elsewhere when it is installed.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use sysinfo::{CpuRefreshKind, RefreshKind, System};

use crate::probes::command::{cim_script, powershell};
use crate::probes::helpers::{command_exists, run_command};

const VENDOR_KEYWORDS: &[(&str, Vendor)] = &[
    ("qualcomm", Vendor::Qualcomm),
    ("snapdragon", Vendor::Qualcomm),
    ("adreno", Vendor::Qualcomm),
    ("nvidia", Vendor::Nvidia),
    ("geforce", Vendor::Nvidia),
    ("quadro", Vendor::Nvidia),
    ("amd", Vendor::Amd),
    ("radeon", Vendor::Amd),
    ("ryzen", Vendor::Amd),
    ("intel", Vendor::Intel),
    ("apple", Vendor::Apple),
];

/// Silicon vendor recognised from a device name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Intel,
    Amd,
    Nvidia,
    Qualcomm,
    Apple,
}

impl Vendor {
    /// Vendor named in `device`, matched case-insensitively on whole words.
    pub fn detect(device: &str) -> Option<Vendor> {
        let lower = device.to_ascii_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        VENDOR_KEYWORDS
            .iter()
            .find(|(kw, _)| words.contains(kw))
            .map(|(_, vendor)| *vendor)
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Intel => "Intel",
            Self::Amd => "AMD",
            Self::Nvidia => "NVIDIA",
            Self::Qualcomm => "Qualcomm",
            Self::Apple => "Apple",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub name: String,
    pub vendor: Option<Vendor>,
}

impl Device {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let vendor = Vendor::detect(&name);
        Self { name, vendor }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inventory {
    pub os: String,
    pub arch: String,
    pub cpus: Vec<Device>,
    pub gpus: Vec<Device>,
}

impl Inventory {
    /// Query the host. Backends that are missing or fail leave their list
    /// empty; `timeout` bounds each external command.
    pub fn collect(timeout: Duration) -> Self {
        let os = System::long_os_version().unwrap_or_else(|| std::env::consts::OS.to_string());
        Self {
            os,
            arch: std::env::consts::ARCH.to_string(),
            cpus: cpu_names().into_iter().map(Device::new).collect(),
            gpus: gpu_names(timeout).into_iter().map(Device::new).collect(),
        }
    }

    /// True if any CPU or GPU was made by `vendor`.
    pub fn has_vendor(&self, vendor: Vendor) -> bool {
        self.cpus
            .iter()
            .chain(&self.gpus)
            .any(|d| d.vendor == Some(vendor))
    }
}

/// Distinct CPU brand strings, in first-seen order.
fn cpu_names() -> Vec<String> {
    let sys = System::new_with_specifics(
        RefreshKind::new().with_cpu(CpuRefreshKind::new().with_frequency()),
    );
    distinct(sys.cpus().iter().map(|cpu| cpu.brand().to_string()))
}

fn gpu_names(timeout: Duration) -> Vec<String> {
    let output = if cfg!(windows) {
        let (program, args) = powershell(cim_script("Win32_VideoController", "Name", None));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_command(&program, &args, timeout)
    } else if command_exists("nvidia-smi") {
        run_command(
            "nvidia-smi",
            &["--query-gpu=name", "--format=csv,noheader"],
            timeout,
        )
    } else {
        return Vec::new();
    };
    match output {
        Ok(text) => distinct(text.lines().map(str::to_string)),
        Err(e) => {
            log::debug!("GPU inventory unavailable: {e}");
            Vec::new()
        }
    }
}

/// Trimmed, non-empty, de-duplicated names in first-seen order.
fn distinct(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_detect() {
        assert_eq!(
            Vendor::detect("Snapdragon(R) X Elite - X1E78100 - Qualcomm(R) Oryon(TM) CPU"),
            Some(Vendor::Qualcomm)
        );
        assert_eq!(Vendor::detect("Qualcomm(R) Adreno(TM) X1-85 GPU"), Some(Vendor::Qualcomm));
        assert_eq!(Vendor::detect("NVIDIA GeForce RTX 4070"), Some(Vendor::Nvidia));
        assert_eq!(Vendor::detect("AMD Radeon 780M Graphics"), Some(Vendor::Amd));
        assert_eq!(
            Vendor::detect("Intel(R) Core(TM) i7-1185G7 @ 3.00GHz"),
            Some(Vendor::Intel)
        );
        assert_eq!(Vendor::detect("Apple M2"), Some(Vendor::Apple));
    }

    #[test]
    fn test_vendor_needs_whole_word() {
        assert_eq!(Vendor::detect("Microsoft Basic Display Adapter"), None);
        assert_eq!(Vendor::detect("Camdenton Graphics"), None);
        assert_eq!(Vendor::detect(""), None);
    }

    #[test]
    fn test_distinct_names() {
        let names = ["  GPU A ", "", "GPU B", "GPU A", "\r"].map(String::from);
        assert_eq!(distinct(names.into_iter()), vec!["GPU A", "GPU B"]);
    }

    #[test]
    fn test_has_vendor() {
        let inv = Inventory {
            os: "test".into(),
            arch: "aarch64".into(),
            cpus: vec![Device::new("Snapdragon X Plus")],
            gpus: vec![Device::new("Microsoft Basic Render Driver")],
        };
        assert!(inv.has_vendor(Vendor::Qualcomm));
        assert!(!inv.has_vendor(Vendor::Nvidia));
        assert_eq!(inv.gpus[0].vendor, None);
    }

    #[test]
    fn test_collect_reports_arch() {
        let inv = Inventory::collect(Duration::from_secs(5));
        assert_eq!(inv.arch, std::env::consts::ARCH);
        assert!(!inv.os.is_empty());
    }
}
