//! Fixed-cadence sampling of registered probes.
//!
//! A [`Sampler`] owns a set of probes and drives them on a fixed interval
//! until a [`StopCondition`] or a [`CancelToken`] ends the run. Each tick
//! invokes every probe once (sequentially or all at once) and appends exactly
//! one [`Sample`] per probe. The finished [`Run`] is immutable.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::probe::{Pending, Probe, ProbeInfo, invoke};
use crate::sample::{RunClock, Sample, Series};

/// Default per-invocation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a single sleep so cancellation is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// Stop conditions
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag shared between the sampler and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The underlying flag, for signal handlers.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

/// When a run ends on its own. Whichever limit is reached first wins; with
/// neither set the run continues until cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopCondition {
    pub max_ticks: Option<u64>,
    pub max_duration: Option<Duration>,
}

impl StopCondition {
    pub fn count(ticks: u64) -> Self {
        Self {
            max_ticks: Some(ticks),
            max_duration: None,
        }
    }

    pub fn duration(duration: Duration) -> Self {
        Self {
            max_ticks: None,
            max_duration: Some(duration),
        }
    }

    pub fn manual() -> Self {
        Self::default()
    }

    pub fn is_manual(&self) -> bool {
        self.max_ticks.is_none() && self.max_duration.is_none()
    }

    /// True once `ticks` ticks have run, or the next tick would start at or
    /// past the duration limit.
    fn reached(&self, ticks: u64, next_at: Duration) -> bool {
        self.max_ticks.is_some_and(|max| ticks >= max)
            || self.max_duration.is_some_and(|max| next_at >= max)
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Lifecycle of a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// A finished sampling run.
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    id: String,
    state: RunState,
    started_unix_ms: u64,
    #[serde(rename = "interval_ms", serialize_with = "as_millis")]
    interval: Duration,
    #[serde(rename = "timeout_ms", serialize_with = "as_millis")]
    timeout: Duration,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    elapsed: Duration,
    parallel: bool,
    ticks: u64,
    probes: Vec<ProbeInfo>,
    series: Vec<Series>,
}

impl Run {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `Completed` or `Cancelled`.
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn started_unix_ms(&self) -> u64 {
        self.started_unix_ms
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Probe metadata in registration order.
    pub fn probes(&self) -> &[ProbeInfo] {
        &self.probes
    }

    /// One series per probe, in registration order.
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn series_for(&self, probe: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.probe() == probe)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// What a tick produced, handed to the `run_with` callback before the
/// samples are appended.
#[derive(Debug)]
pub struct TickReport<'a> {
    pub tick: u64,
    /// Offset of the tick's scheduled start from the run origin.
    pub offset: Duration,
    /// One sample per probe, in registration order.
    pub samples: &'a [Sample],
}

/// Drives probes on a fixed interval.
pub struct Sampler {
    probes: Vec<Arc<dyn Probe>>,
    interval: Duration,
    timeout: Duration,
    stop: StopCondition,
    parallel: bool,
    warmup: u32,
    cancel: CancelToken,
    state: RunState,
}

impl Sampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            probes: Vec::new(),
            interval,
            timeout: DEFAULT_TIMEOUT,
            stop: StopCondition::manual(),
            parallel: false,
            warmup: 0,
            cancel: CancelToken::new(),
            state: RunState::Idle,
        }
    }

    /// Register a probe. Names must be unique within a run.
    pub fn add_probe(&mut self, probe: Arc<dyn Probe>) -> Result<()> {
        if self.state != RunState::Idle {
            return Err(Error::InvalidState(format!(
                "cannot add probes to a {} sampler",
                self.state
            )));
        }
        if self.probes.iter().any(|p| p.name() == probe.name()) {
            return Err(Error::DuplicateProbe(probe.name().to_string()));
        }
        self.probes.push(probe);
        Ok(())
    }

    /// Per-invocation timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stop(mut self, stop: StopCondition) -> Self {
        self.stop = stop;
        self
    }

    /// Invoke all probes of a tick at once instead of one after another.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Unrecorded invocations of every probe before tick 0.
    pub fn warmup(mut self, rounds: u32) -> Self {
        self.warmup = rounds;
        self
    }

    /// Use an externally owned cancellation token.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle that cancels this sampler's run.
    pub fn canceller(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Registered probe names, in registration order.
    pub fn probe_names(&self) -> Vec<String> {
        self.probes.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn run(&mut self) -> Result<Run> {
        self.run_with(|_| {})
    }

    /// Run to completion, calling `on_tick` after every tick.
    pub fn run_with<F>(&mut self, on_tick: F) -> Result<Run>
    where
        F: FnMut(&TickReport<'_>),
    {
        if self.state != RunState::Idle {
            return Err(Error::InvalidState(format!(
                "sampler already {}",
                self.state
            )));
        }
        if self.probes.is_empty() {
            return Err(Error::NoProbes);
        }
        if self.interval.is_zero() {
            return Err(Error::InvalidConfig("interval must be positive".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be positive".to_string()));
        }

        self.state = RunState::Running;
        let result = self.drive(on_tick);
        self.state = match &result {
            Ok(run) => run.state,
            Err(_) => RunState::Cancelled,
        };
        result
    }

    fn drive<F>(&self, mut on_tick: F) -> Result<Run>
    where
        F: FnMut(&TickReport<'_>),
    {
        let id = uuid::Uuid::new_v4().to_string();
        log::info!(
            "run {id}: {} probe(s), interval {:?}, timeout {:?}, {}",
            self.probes.len(),
            self.interval,
            self.timeout,
            if self.parallel { "parallel" } else { "sequential" }
        );

        for round in 0..self.warmup {
            if self.cancel.is_cancelled() {
                break;
            }
            log::debug!("warm-up round {}", round + 1);
            self.tick(0, &RunClock::start())?;
        }

        let clock = RunClock::start();
        let origin = clock.origin();
        let mut series: Vec<Series> = self.probes.iter().map(|p| Series::new(p.name())).collect();
        let mut ticks = 0u64;
        let mut next = origin;

        let state = loop {
            if self.cancel.is_cancelled() {
                break RunState::Cancelled;
            }
            if self.stop.reached(ticks, next - origin) {
                break RunState::Completed;
            }
            if !sleep_until(next, &self.cancel) {
                break RunState::Cancelled;
            }

            let samples = self.tick(ticks, &clock)?;
            on_tick(&TickReport {
                tick: ticks,
                offset: next - origin,
                samples: &samples,
            });
            for (series, sample) in series.iter_mut().zip(samples) {
                series.push(sample)?;
            }
            ticks += 1;

            next += self.interval;
            let now = Instant::now();
            if next <= now {
                let skipped = slots_to_skip(now.duration_since(next), self.interval);
                log::warn!("tick {} overran the interval; skipping {skipped} slot(s)", ticks - 1);
                next = next
                    .checked_add(self.interval.saturating_mul(skipped))
                    .unwrap_or(now + self.interval);
            }
        };

        let elapsed = origin.elapsed();
        log::info!("run {id} {state} after {ticks} tick(s) in {elapsed:?}");

        Ok(Run {
            id,
            state,
            started_unix_ms: clock.origin_unix_ms(),
            interval: self.interval,
            timeout: self.timeout,
            elapsed,
            parallel: self.parallel,
            ticks,
            probes: self.probes.iter().map(|p| p.info().clone()).collect(),
            series,
        })
    }

    /// Invoke every probe once; samples come back in registration order.
    fn tick(&self, tick: u64, clock: &RunClock) -> Result<Vec<Sample>> {
        if self.parallel {
            let pending = self
                .probes
                .iter()
                .map(|p| Pending::start(p, tick, self.timeout))
                .collect::<Result<Vec<_>>>()?;
            Ok(pending.into_iter().map(|p| p.wait(clock)).collect())
        } else {
            self.probes
                .iter()
                .map(|p| invoke(p, tick, self.timeout, clock))
                .collect()
        }
    }
}

/// Interval slots to advance when a tick ends `lag` past its successor's
/// start. Saturates at `u32::MAX`.
fn slots_to_skip(lag: Duration, interval: Duration) -> u32 {
    let behind = lag.as_nanos() / interval.as_nanos().max(1);
    u32::try_from(behind).unwrap_or(u32::MAX).saturating_add(1)
}

/// Sleep until `deadline` in short slices. Returns false if cancelled first.
fn sleep_until(deadline: Instant, cancel: &CancelToken) -> bool {
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}
