//! # perfprobe-core
//!
//! **Which telemetry backend should you trust?**
//!
//! `perfprobe-core` samples several backends that report the same machine
//! metric (a Windows performance counter, a WMI/CIM class, a vendor tool such
//! as `nvidia-smi`, or an in-process library) on a fixed cadence, then
//! compares how fast, how reliably, and how consistently each one answers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use perfprobe_core::{Report, Sampler, StopCondition, scenario};
//!
//! let mut sampler = Sampler::new(Duration::from_secs(1)).stop(StopCondition::count(10));
//! for probe in scenario::find("cpu")?.available_probes() {
//!     sampler.add_probe(probe)?;
//! }
//! let run = sampler.run()?;
//! let report = Report::from_run(&run, Duration::from_millis(500))?;
//! println!("{}", report.render_text());
//! # Ok::<(), perfprobe_core::Error>(())
//! ```
//!
//! ## Architecture
//!
//! Probes → Sampler (fixed interval, bounded invocations) → Run → Report
//!
//! Every backend implements the [`Probe`] trait. Each invocation runs under a
//! hard timeout and yields a [`Sample`] holding either a value or an
//! [`ErrorKind`]; probe failures never abort a run. A finished [`Run`] is
//! immutable and is the only input to [`summarize`], [`compare`], and
//! [`Report`].

pub mod config;
pub mod error;
pub mod inventory;
pub mod probe;
pub mod probes;
pub mod report;
pub mod sample;
pub mod sampler;
pub mod scenario;
pub mod stats;

pub use config::{HarnessConfig, parse_duration};
pub use error::{Error, ErrorKind, Result};
pub use probe::{Pending, Probe, ProbeInfo, ProbeKind, invoke, invoke_once};
pub use probes::command::CommandProbe;
pub use probes::helpers::Extract;
pub use probes::native::{NativeMetric, SysinfoProbe};
pub use probes::{all_probes, detect_available_probes, find_probe};
pub use report::{DEFAULT_TOLERANCE, RankEntry, Report};
pub use sample::{RunClock, Sample, Series};
pub use sampler::{
    CancelToken, DEFAULT_TIMEOUT, Run, RunState, Sampler, StopCondition, TickReport,
};
pub use inventory::{Device, Inventory, Vendor};
pub use scenario::{Scenario, Verdict};
pub use stats::{Aggregate, PairStats, ProbeStats, compare, summarize};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
