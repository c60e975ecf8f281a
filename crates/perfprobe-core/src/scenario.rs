//! Canned comparisons: one metric, several backends that claim to report it.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::probe::Probe;
use crate::probes;
use crate::report::Report;

/// A named group of probes measuring the same quantity.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> Vec<Arc<dyn Probe>>,
}

impl Scenario {
    /// Fresh probe instances for this scenario.
    pub fn probes(&self) -> Vec<Arc<dyn Probe>> {
        (self.build)()
    }

    /// Probes whose backend is present on this machine.
    pub fn available_probes(&self) -> Vec<Arc<dyn Probe>> {
        self.probes()
            .into_iter()
            .filter(|p| {
                let ok = p.is_available();
                if !ok {
                    log::warn!("probe '{}' unavailable on this host; skipping", p.name());
                }
                ok
            })
            .collect()
    }
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "cpu",
        description: "Overall CPU utilization (%)",
        build: probes::cpu_probes,
    },
    Scenario {
        name: "gpu",
        description: "GPU 3D engine utilization (%)",
        build: probes::gpu_probes,
    },
    Scenario {
        name: "gpu-memory",
        description: "Dedicated GPU memory in use (MB)",
        build: probes::gpu_memory_probes,
    },
    Scenario {
        name: "memory",
        description: "Available physical memory (MB)",
        build: probes::memory_probes,
    },
    Scenario {
        name: "clock",
        description: "Processor clock speed (MHz)",
        build: probes::clock_probes,
    },
    Scenario {
        name: "demo",
        description: "Synthetic fast and slow probes",
        build: probes::demo_probes,
    },
];

pub fn all() -> &'static [Scenario] {
    SCENARIOS
}

pub fn find(name: &str) -> Result<Scenario> {
    SCENARIOS
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .copied()
        .ok_or_else(|| Error::UnknownScenario(name.to_string()))
}

/// Outcome of one scenario within an "all scenarios" sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// At least one probe produced data.
    Passed,
    /// Every probe failed, or none was available.
    Failed(String),
}

impl Verdict {
    pub fn of(report: &Report) -> Self {
        if report.probes.iter().any(|p| p.has_data()) {
            Self::Passed
        } else if report.probes.is_empty() {
            Self::Failed("no samples".to_string())
        } else {
            Self::Failed(format!("no data from {} probe(s)", report.probes.len()))
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Failed(reason) => write!(f, "FAILED ({reason})"),
        }
    }
}
