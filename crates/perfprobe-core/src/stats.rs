//! Summary statistics for one series and accuracy comparison between two.
//!
//! Aggregates are computed over successful samples only. A series with no
//! successful sample has no aggregate (`None`), which renders as "no signal"
//! rather than a misleading zero.

use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, ErrorKind, Result};
use crate::sample::{Sample, Series};

/// Mean, range, and spread of a set of numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aggregate {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub stddev: f64,
}

impl Aggregate {
    /// `None` for an empty input.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            stddev: variance.sqrt(),
        })
    }
}

/// Per-probe summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeStats {
    pub probe: String,
    pub count: usize,
    pub successes: usize,
    pub failures: usize,
    /// Failures that were timeouts (subset of `failures`).
    pub timeouts: usize,
    /// `successes / count`, in `[0, 1]`.
    pub success_rate: f64,
    /// Latency of successful invocations, ms.
    pub latency: Option<Aggregate>,
    pub value: Option<Aggregate>,
}

impl ProbeStats {
    pub fn has_data(&self) -> bool {
        self.successes > 0
    }
}

/// Summarize one series.
pub fn summarize(series: &Series) -> Result<ProbeStats> {
    if series.is_empty() {
        return Err(Error::EmptySeries(series.probe().to_string()));
    }

    let ok: Vec<&Sample> = series.iter().filter(|s| s.is_success()).collect();
    let values: Vec<f64> = ok.iter().filter_map(|s| s.value()).collect();
    let latencies: Vec<f64> = ok.iter().map(|s| s.latency_ms()).collect();
    let timeouts = series
        .iter()
        .filter(|s| s.error() == Some(&ErrorKind::Timeout))
        .count();

    let count = series.len();
    Ok(ProbeStats {
        probe: series.probe().to_string(),
        count,
        successes: ok.len(),
        failures: count - ok.len(),
        timeouts,
        success_rate: ok.len() as f64 / count as f64,
        latency: Aggregate::of(&latencies),
        value: Aggregate::of(&values),
    })
}

// ---------------------------------------------------------------------------
// Pairwise comparison
// ---------------------------------------------------------------------------

/// Agreement between two probes over time-aligned samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairStats {
    pub probe_a: String,
    pub probe_b: String,
    /// Sample pairs aligned within the tolerance.
    pub matched: usize,
    /// Matched pairs where both samples succeeded.
    pub compared: usize,
    pub unmatched_a: usize,
    pub unmatched_b: usize,
    /// Mean of `|a - b|` over compared pairs.
    pub mean_abs_difference: Option<f64>,
    pub max_abs_difference: Option<f64>,
    /// Mean of `a - b` (bias of `a` relative to `b`).
    pub mean_difference: Option<f64>,
}

/// Align two series by offset and measure how far their values disagree.
///
/// Every pair of samples whose offsets lie within `tolerance` is a candidate.
/// Candidates are taken closest first (ties broken by position in `a`, then
/// `b`), and a sample is used in at most one pair.
pub fn compare(a: &Series, b: &Series, tolerance: Duration) -> Result<PairStats> {
    if a.is_empty() {
        return Err(Error::EmptySeries(a.probe().to_string()));
    }
    if b.is_empty() {
        return Err(Error::EmptySeries(b.probe().to_string()));
    }

    let tol = u64::try_from(tolerance.as_micros()).unwrap_or(u64::MAX);
    let sa = a.samples();
    let sb = b.samples();

    let mut candidates = candidates(sa, sb, tol);
    candidates.sort_unstable();

    let mut used_a = vec![false; sa.len()];
    let mut used_b = vec![false; sb.len()];
    let mut matched = 0;
    let mut diffs = Vec::new();
    for (_, i, j) in candidates {
        if used_a[i] || used_b[j] {
            continue;
        }
        used_a[i] = true;
        used_b[j] = true;
        matched += 1;
        if let (Some(x), Some(y)) = (sa[i].value(), sb[j].value()) {
            diffs.push(x - y);
        }
    }

    let compared = diffs.len();
    let (mean_abs, max_abs, mean) = if diffs.is_empty() {
        (None, None, None)
    } else {
        let n = compared as f64;
        (
            Some(diffs.iter().map(|d| d.abs()).sum::<f64>() / n),
            Some(diffs.iter().map(|d| d.abs()).fold(0.0, f64::max)),
            Some(diffs.iter().sum::<f64>() / n),
        )
    };

    Ok(PairStats {
        probe_a: a.probe().to_string(),
        probe_b: b.probe().to_string(),
        matched,
        compared,
        unmatched_a: sa.len() - matched,
        unmatched_b: sb.len() - matched,
        mean_abs_difference: mean_abs,
        max_abs_difference: max_abs,
        mean_difference: mean,
    })
}

/// `(distance, i, j)` for every pair within `tol` microseconds. Both slices
/// are ordered by offset, so each `a` sample scans only its window of `b`.
fn candidates(sa: &[Sample], sb: &[Sample], tol: u64) -> Vec<(u64, usize, usize)> {
    let mut out = Vec::new();
    let mut lo = 0;
    for (i, x) in sa.iter().enumerate() {
        let from = x.offset_us().saturating_sub(tol);
        while lo < sb.len() && sb[lo].offset_us() < from {
            lo += 1;
        }
        for (j, y) in sb.iter().enumerate().skip(lo) {
            if y.offset_us() > x.offset_us().saturating_add(tol) {
                break;
            }
            out.push((x.offset_us().abs_diff(y.offset_us()), i, j));
        }
    }
    out
}
