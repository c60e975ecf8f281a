//! Samples and per-probe series.
//!
//! A [`Sample`] is the outcome of one probe invocation. A [`Series`] is the
//! ordered history of samples for one probe within one run.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::{Error, ErrorKind, Result};

pub(crate) fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Reference point for sample timestamps within a run.
///
/// Offsets come from a monotonic clock; the wall-clock time is kept alongside
/// for display only.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    origin: Instant,
    origin_unix_ms: u64,
}

impl RunClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
            origin_unix_ms: unix_ms_now(),
        }
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn origin_unix_ms(&self) -> u64 {
        self.origin_unix_ms
    }

    /// Microseconds between the run origin and `at`.
    pub fn offset_us(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.origin).as_micros() as u64
    }

    pub fn unix_ms(&self, at: Instant) -> u64 {
        self.origin_unix_ms + at.saturating_duration_since(self.origin).as_millis() as u64
    }
}

impl Default for RunClock {
    fn default() -> Self {
        Self::start()
    }
}

/// One probe invocation's outcome.
///
/// Exactly one of `value` / `error` is set; the two constructors are the only
/// way to build a sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    probe: String,
    tick: u64,
    offset_us: u64,
    unix_ms: u64,
    value: Option<f64>,
    latency_ms: f64,
    error: Option<ErrorKind>,
}

impl Sample {
    pub fn success(
        probe: impl Into<String>,
        tick: u64,
        offset_us: u64,
        unix_ms: u64,
        value: f64,
        latency: Duration,
    ) -> Self {
        Self {
            probe: probe.into(),
            tick,
            offset_us,
            unix_ms,
            value: Some(value),
            latency_ms: latency.as_secs_f64() * 1000.0,
            error: None,
        }
    }

    pub fn failure(
        probe: impl Into<String>,
        tick: u64,
        offset_us: u64,
        unix_ms: u64,
        error: ErrorKind,
        latency: Duration,
    ) -> Self {
        Self {
            probe: probe.into(),
            tick,
            offset_us,
            unix_ms,
            value: None,
            latency_ms: latency.as_secs_f64() * 1000.0,
            error: Some(error),
        }
    }

    pub fn probe(&self) -> &str {
        &self.probe
    }

    /// Index of the tick that produced this sample (warm-up invocations are not recorded).
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Monotonic offset from the run start at which the invocation began.
    pub fn offset_us(&self) -> u64 {
        self.offset_us
    }

    pub fn offset(&self) -> Duration {
        Duration::from_micros(self.offset_us)
    }

    pub fn unix_ms(&self) -> u64 {
        self.unix_ms
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    pub fn error(&self) -> Option<&ErrorKind> {
        self.error.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }
}

/// Time-ordered samples for one probe across one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    probe: String,
    samples: Vec<Sample>,
}

impl Series {
    pub fn new(probe: impl Into<String>) -> Self {
        Self {
            probe: probe.into(),
            samples: Vec::new(),
        }
    }

    /// Build a series from already-ordered samples.
    ///
    /// Fails if a sample belongs to another probe or breaks the strictly
    /// increasing offset order.
    pub fn from_samples(probe: impl Into<String>, samples: Vec<Sample>) -> Result<Self> {
        let mut series = Self::new(probe);
        for sample in samples {
            series.push(sample)?;
        }
        Ok(series)
    }

    pub(crate) fn push(&mut self, sample: Sample) -> Result<()> {
        if sample.probe != self.probe {
            return Err(Error::UnknownProbe(sample.probe));
        }
        if let Some(last) = self.samples.last() {
            if sample.offset_us <= last.offset_us {
                return Err(Error::OutOfOrder {
                    probe: self.probe.clone(),
                    offset_us: sample.offset_us,
                    last_us: last.offset_us,
                });
            }
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn probe(&self) -> &str {
        &self.probe
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Values of the successful samples, in order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().filter_map(Sample::value)
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
