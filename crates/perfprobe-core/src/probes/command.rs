//! Probes backed by an external command.
//!
//! A [`CommandProbe`] spawns a program, waits for it under the invocation
//! timeout, and extracts a number from stdout. Windows performance counters
//! and CIM classes are read through PowerShell; vendor tools are invoked
//! directly.

use std::time::Duration;

use super::helpers::{Extract, command_exists, run_command};
use crate::error::ErrorKind;
use crate::probe::{Probe, ProbeInfo, ProbeKind};

const POWERSHELL: &str = "powershell";

/// External command probe.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    info: ProbeInfo,
    program: String,
    args: Vec<String>,
    extract: Extract,
    scale: f64,
    windows_only: bool,
}

impl CommandProbe {
    pub fn new(info: ProbeInfo, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            info,
            program: program.into(),
            args,
            extract: Extract::First,
            scale: 1.0,
            windows_only: false,
        }
    }

    /// Choose how the number is pulled out of stdout.
    pub fn extract(mut self, extract: Extract) -> Self {
        self.extract = extract;
        self
    }

    /// Multiply the extracted number (unit conversion).
    pub fn scale(mut self, factor: f64) -> Self {
        self.scale = factor;
        self
    }

    fn windows_only(mut self) -> Self {
        self.windows_only = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Full command line, for display.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(' ') {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }

    /// Parse a command's stdout the same way `query` does.
    pub fn parse_output(&self, stdout: &str) -> Result<f64, ErrorKind> {
        self.extract.apply(stdout).map(|v| v * self.scale)
    }
}

impl Probe for CommandProbe {
    fn info(&self) -> &ProbeInfo {
        &self.info
    }

    fn is_available(&self) -> bool {
        if self.windows_only && !cfg!(windows) {
            return false;
        }
        command_exists(&self.program)
    }

    fn query(&self, timeout: Duration) -> Result<f64, ErrorKind> {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        let stdout = run_command(&self.program, &args, timeout)?;
        self.parse_output(&stdout)
    }
}

// ---------------------------------------------------------------------------
// PowerShell-backed probes
// ---------------------------------------------------------------------------

pub(crate) fn powershell(script: String) -> (String, Vec<String>) {
    (
        POWERSHELL.to_string(),
        vec![
            "-NoProfile".to_string(),
            "-NonInteractive".to_string(),
            "-Command".to_string(),
            script,
        ],
    )
}

/// Script printing one `CookedValue` per counter instance.
pub fn counter_script(path: &str) -> String {
    format!(
        "(Get-Counter -Counter '{path}' -SampleInterval 1 -MaxSamples 1 -ErrorAction Stop).CounterSamples \
         | ForEach-Object {{ $_.CookedValue }}"
    )
}

/// Script printing `property` for each instance of a CIM class, optionally
/// restricted to instances whose `Name` matches `instance` (wildcards allowed).
pub fn cim_script(class: &str, property: &str, instance: Option<&str>) -> String {
    let filter = instance
        .map(|name| {
            let op = if name.contains('*') { "-like" } else { "-eq" };
            format!(" | Where-Object {{ $_.Name {op} '{name}' }}")
        })
        .unwrap_or_default();
    format!(
        "Get-CimInstance -ClassName {class} -ErrorAction Stop{filter} \
         | ForEach-Object {{ $_.{property} }}"
    )
}

/// Windows performance counter read through `Get-Counter`.
///
/// Wildcard paths (`\GPU Engine(*)\...`) print one value per instance; pick
/// an aggregate with [`CommandProbe::extract`].
pub fn performance_counter(
    name: &str,
    description: &str,
    path: &str,
    unit: &str,
) -> CommandProbe {
    let (program, args) = powershell(counter_script(path));
    CommandProbe::new(
        ProbeInfo::new(name, description, ProbeKind::Counter, unit),
        program,
        args,
    )
    .windows_only()
}

/// WMI / CIM class property read through `Get-CimInstance`.
pub fn cim_property(
    name: &str,
    description: &str,
    class: &str,
    property: &str,
    instance: Option<&str>,
    unit: &str,
) -> CommandProbe {
    let (program, args) = powershell(cim_script(class, property, instance));
    CommandProbe::new(
        ProbeInfo::new(name, description, ProbeKind::Management, unit),
        program,
        args,
    )
    .windows_only()
}

// ---------------------------------------------------------------------------
// Vendor tools
// ---------------------------------------------------------------------------

/// `nvidia-smi --query-gpu=<field>`; one line per GPU, averaged.
pub fn nvidia_smi(name: &str, description: &str, field: &str, unit: &str) -> CommandProbe {
    CommandProbe::new(
        ProbeInfo::new(name, description, ProbeKind::Command, unit),
        "nvidia-smi",
        vec![
            format!("--query-gpu={field}"),
            "--format=csv,noheader,nounits".to_string(),
        ],
    )
    .extract(Extract::Mean)
}

/// `rocm-smi <flag> --csv`; one row per card, averaged.
pub fn rocm_smi(name: &str, description: &str, flag: &str, unit: &str) -> CommandProbe {
    CommandProbe::new(
        ProbeInfo::new(name, description, ProbeKind::Command, unit),
        "rocm-smi",
        vec![flag.to_string(), "--csv".to_string()],
    )
    .extract(Extract::Mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_script_shape() {
        let s = counter_script(r"\Processor(_Total)\% Processor Time");
        assert!(s.starts_with(r"(Get-Counter -Counter '\Processor(_Total)\% Processor Time'"));
        assert!(s.contains("CookedValue"));
    }

    #[test]
    fn test_cim_script_with_instance() {
        let s = cim_script("Win32_PerfFormattedData_PerfOS_Processor", "PercentProcessorTime", Some("_Total"));
        assert!(s.contains("-ClassName Win32_PerfFormattedData_PerfOS_Processor"));
        assert!(s.contains("$_.Name -eq '_Total'"));
        assert!(s.ends_with("$_.PercentProcessorTime }"));
    }

    #[test]
    fn test_cim_script_wildcard_instance() {
        let s = cim_script("Win32_PerfFormattedData_GPUPerformanceCounters_GPUEngine", "UtilizationPercentage", Some("*engtype_3D"));
        assert!(s.contains("$_.Name -like '*engtype_3D'"));
    }

    #[test]
    fn test_cim_script_without_instance() {
        let s = cim_script("Win32_Processor", "LoadPercentage", None);
        assert!(!s.contains("Where-Object"));
    }

    #[test]
    fn test_performance_counter_probe_info() {
        let p = performance_counter("cpu.counter", "cpu", r"\Processor(_Total)\% Processor Time", "pct");
        assert_eq!(p.info().kind, ProbeKind::Counter);
        assert_eq!(p.program(), "powershell");
        assert_eq!(p.args()[2], "-Command");
        #[cfg(not(windows))]
        assert!(!p.is_available());
    }

    #[test]
    fn test_parse_output_with_scale() {
        let p = cim_property("mem.wmi", "free", "Win32_OperatingSystem", "FreePhysicalMemory", None, "MB")
            .scale(1.0 / 1024.0);
        assert_eq!(p.parse_output("2048").unwrap(), 2.0);
    }

    #[test]
    fn test_nvidia_smi_mean_across_gpus() {
        let p = nvidia_smi("gpu.nvidia", "util", "utilization.gpu", "pct");
        assert_eq!(p.parse_output("30\n50\n").unwrap(), 40.0);
        assert_eq!(
            p.command_line(),
            "nvidia-smi --query-gpu=utilization.gpu --format=csv,noheader,nounits"
        );
    }

    #[test]
    fn test_rocm_smi_csv_rows() {
        let p = rocm_smi("gpu.rocm", "util", "--showuse", "pct");
        let out = "device,GPU use (%)\ncard0,12\ncard1,18";
        assert_eq!(p.parse_output(out).unwrap(), 15.0);
    }

    #[test]
    fn test_missing_program_is_query_failed() {
        let p = CommandProbe::new(
            ProbeInfo::new("x", "x", ProbeKind::Command, "pct"),
            "perfprobe-missing-tool",
            vec![],
        );
        assert!(!p.is_available());
        assert!(matches!(
            p.query(Duration::from_secs(1)),
            Err(ErrorKind::QueryFailed(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_query_runs_command() {
        let p = CommandProbe::new(
            ProbeInfo::new("echo", "echo", ProbeKind::Command, "pct"),
            "sh",
            vec!["-c".to_string(), "echo 'CPU Utilization: 12.5%'".to_string()],
        )
        .extract(Extract::After("utilization:".to_string()));
        assert_eq!(p.query(Duration::from_secs(5)).unwrap(), 12.5);
    }
}
