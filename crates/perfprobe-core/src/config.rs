//! Harness configuration.
//!
//! A flat, serde-backed settings struct. Every field has a default, so a TOML
//! file only needs the keys it changes:
//!
//! ```toml
//! probes = ["cpu.counter", "cpu.sysinfo"]
//! interval_ms = 500
//! count = 20
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::probe::Probe;
use crate::report::DEFAULT_TOLERANCE;
use crate::sampler::{DEFAULT_TIMEOUT, Sampler, StopCondition};

/// Sampling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Built-in probe names to sample; empty means "the scenario's probes".
    #[serde(default)]
    pub probes: Vec<String>,
    /// Time between tick starts
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Per-invocation timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Stop after this many ticks
    #[serde(default)]
    pub count: Option<u64>,
    /// Stop once this much time has passed
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Max offset distance for pairing samples of two probes
    #[serde(default = "default_tolerance_ms")]
    pub tolerance_ms: u64,
    /// Invoke all probes of a tick concurrently. Sequential ticks spread a
    /// tick's samples over the sum of the probes' latencies.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Unrecorded invocations before the first tick
    #[serde(default)]
    pub warmup: u32,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_parallel() -> bool {
    true
}

fn default_tolerance_ms() -> u64 {
    DEFAULT_TOLERANCE.as_millis() as u64
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            probes: Vec::new(),
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
            count: None,
            duration_ms: None,
            tolerance_ms: default_tolerance_ms(),
            parallel: default_parallel(),
            warmup: 0,
        }
    }
}

impl HarnessConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(Error::InvalidConfig("interval_ms must be positive".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeout_ms must be positive".to_string()));
        }
        if self.duration_ms == Some(0) {
            return Err(Error::InvalidConfig("duration_ms must be positive".to_string()));
        }
        let mut seen = HashSet::new();
        for name in &self.probes {
            if !seen.insert(name.as_str()) {
                return Err(Error::DuplicateProbe(name.clone()));
            }
        }
        if self.timeout_ms > self.interval_ms {
            log::warn!(
                "timeout {}ms exceeds interval {}ms; slow probes will skip ticks",
                self.timeout_ms,
                self.interval_ms
            );
        }
        if !self.parallel && self.tolerance_ms < self.timeout_ms {
            log::warn!(
                "sequential ticks with tolerance {}ms below timeout {}ms; slow probes may never pair",
                self.tolerance_ms,
                self.timeout_ms
            );
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn tolerance(&self) -> Duration {
        Duration::from_millis(self.tolerance_ms)
    }

    pub fn stop_condition(&self) -> StopCondition {
        StopCondition {
            max_ticks: self.count,
            max_duration: self.duration_ms.map(Duration::from_millis),
        }
    }

    /// Build a sampler with these settings and the given probes.
    pub fn sampler(&self, probes: Vec<Arc<dyn Probe>>) -> Result<Sampler> {
        self.validate()?;
        let mut sampler = Sampler::new(self.interval())
            .timeout(self.timeout())
            .stop(self.stop_condition())
            .parallel(self.parallel)
            .warmup(self.warmup);
        for probe in probes {
            sampler.add_probe(probe)?;
        }
        Ok(sampler)
    }
}

/// Parse a duration such as `250ms`, `5s`, `2m`, or `1h`. A bare number is
/// seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    let (numeric, multiplier) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 1u64)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1000)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60_000)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3_600_000)
    } else {
        (s, 1000)
    };

    let value: u64 = numeric
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("invalid duration: {s}")))?;

    value
        .checked_mul(multiplier)
        .map(Duration::from_millis)
        .ok_or_else(|| Error::InvalidConfig(format!("duration too large: {s}")))
}
