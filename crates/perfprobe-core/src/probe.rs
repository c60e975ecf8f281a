//! Abstract probe trait and bounded invocation.
//!
//! Every telemetry backend implements the [`Probe`] trait, which provides
//! metadata via [`ProbeInfo`], availability checking, and a single numeric
//! query. [`invoke`] wraps a query with a hard deadline and turns the outcome
//! into a [`Sample`].

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{Error, ErrorKind, Result};
use crate::sample::{RunClock, Sample};

/// Query mechanism behind a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// OS performance counter (e.g. `Get-Counter`).
    Counter,
    /// Structured management interface (WMI / CIM class).
    Management,
    /// Vendor command-line tool.
    Command,
    /// In-process introspection library.
    Native,
    /// Deterministic test or demo backend.
    Synthetic,
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Management => write!(f, "management"),
            Self::Command => write!(f, "command"),
            Self::Native => write!(f, "native"),
            Self::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Metadata about a probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeInfo {
    /// Unique identifier within a run (e.g. `"cpu.counter"`).
    pub name: String,
    /// One-line human-readable description.
    pub description: String,
    pub kind: ProbeKind,
    /// Unit of the returned value (`"pct"`, `"MB"`, `"MHz"`, ...).
    pub unit: String,
}

impl ProbeInfo {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: ProbeKind,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            unit: unit.into(),
        }
    }
}

/// Trait that every probe backend must implement.
///
/// Implementations hold no connection between calls; each `query` is an
/// independent attempt.
pub trait Probe: Send + Sync {
    /// Probe metadata.
    fn info(&self) -> &ProbeInfo;

    /// Check if the backend can operate on the current machine.
    fn is_available(&self) -> bool {
        true
    }

    /// Run one query and extract a number.
    ///
    /// `timeout` is advisory here; [`invoke`] enforces it regardless.
    fn query(&self, timeout: Duration) -> std::result::Result<f64, ErrorKind>;

    /// Convenience: name from info.
    fn name(&self) -> &str {
        &self.info().name
    }
}

/// An invocation running on its own worker thread.
pub struct Pending {
    probe: String,
    tick: u64,
    started: Instant,
    deadline: Instant,
    rx: Receiver<std::result::Result<f64, ErrorKind>>,
}

impl Pending {
    /// Start `probe.query` on a worker thread.
    ///
    /// Only failing to spawn the worker is an error; everything the backend
    /// does ends up in the sample.
    pub fn start(probe: &Arc<dyn Probe>, tick: u64, timeout: Duration) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let worker = Arc::clone(probe);
        let started = Instant::now();
        std::thread::Builder::new()
            .name(format!("probe-{}", probe.name()))
            .spawn(move || {
                let result = worker.query(timeout);
                // Receiver is gone when the invocation was abandoned.
                let _ = tx.send(result);
            })
            .map_err(Error::Spawn)?;

        Ok(Self {
            probe: probe.name().to_string(),
            tick,
            started,
            deadline: started + timeout,
            rx,
        })
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Block until the worker answers or the deadline passes.
    pub fn wait(self, clock: &RunClock) -> Sample {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let outcome = match self.rx.recv_timeout(remaining) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ErrorKind::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                Err(ErrorKind::QueryFailed("probe worker panicked".to_string()))
            }
        };
        let latency = self.started.elapsed();
        let offset_us = clock.offset_us(self.started);
        let unix_ms = clock.unix_ms(self.started);

        match outcome {
            Ok(value) if value.is_finite() => {
                Sample::success(self.probe, self.tick, offset_us, unix_ms, value, latency)
            }
            Ok(value) => Sample::failure(
                self.probe,
                self.tick,
                offset_us,
                unix_ms,
                ErrorKind::ParseFailed(format!("non-finite value {value}")),
                latency,
            ),
            Err(kind) => {
                log::debug!("probe '{}' tick {} failed: {kind}", self.probe, self.tick);
                Sample::failure(self.probe, self.tick, offset_us, unix_ms, kind, latency)
            }
        }
    }
}

/// Invoke a probe once, bounded by `timeout`.
pub fn invoke(
    probe: &Arc<dyn Probe>,
    tick: u64,
    timeout: Duration,
    clock: &RunClock,
) -> Result<Sample> {
    Ok(Pending::start(probe, tick, timeout)?.wait(clock))
}

/// Invoke a probe once outside of any run.
pub fn invoke_once(probe: &Arc<dyn Probe>, timeout: Duration) -> Result<Sample> {
    invoke(probe, 0, timeout, &RunClock::start())
}
