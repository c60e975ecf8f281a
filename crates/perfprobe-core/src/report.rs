//! Comparative report over a finished run.
//!
//! [`Report::from_run`] summarizes every probe, compares every pair of
//! probes, and ranks the backends. Rendering (`to_json`, `render_text`) is a
//! pure projection of the report.

use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::sample::unix_ms_now;
use crate::sampler::{Run, RunState};
use crate::stats::{PairStats, ProbeStats, compare, summarize};

/// Default alignment tolerance when comparing probes.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_millis(500);

/// A probe's place in the ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub rank: usize,
    pub probe: String,
    pub success_rate: f64,
    /// Mean latency of successful invocations; absent when nothing succeeded.
    pub mean_latency_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_unix_ms: u64,
    pub run_id: String,
    pub state: RunState,
    pub ticks: u64,
    pub interval_ms: f64,
    pub tolerance_ms: f64,
    pub probes: Vec<ProbeStats>,
    pub pairs: Vec<PairStats>,
    /// Probes that never produced a value.
    pub no_data: Vec<String>,
    pub ranking: Vec<RankEntry>,
}

impl Report {
    pub fn from_run(run: &Run, tolerance: Duration) -> Result<Self> {
        let filled: Vec<_> = run.series().iter().filter(|s| !s.is_empty()).collect();

        let probes = filled
            .iter()
            .map(|s| summarize(s))
            .collect::<Result<Vec<_>>>()?;

        let mut pairs = Vec::new();
        for (i, a) in filled.iter().enumerate() {
            for b in &filled[i + 1..] {
                pairs.push(compare(a, b, tolerance)?);
            }
        }

        let no_data = run
            .series()
            .iter()
            .filter(|s| s.values().next().is_none())
            .map(|s| s.probe().to_string())
            .collect();

        Ok(Self {
            generated_unix_ms: unix_ms_now(),
            run_id: run.id().to_string(),
            state: run.state(),
            ticks: run.ticks(),
            interval_ms: run.interval().as_secs_f64() * 1000.0,
            tolerance_ms: tolerance.as_secs_f64() * 1000.0,
            ranking: rank(&probes),
            probes,
            pairs,
            no_data,
        })
    }

    /// Top-ranked probe that produced data.
    pub fn recommended(&self) -> Option<&RankEntry> {
        self.ranking.first().filter(|r| r.success_rate > 0.0)
    }

    pub fn stats_for(&self, probe: &str) -> Option<&ProbeStats> {
        self.probes.iter().find(|p| p.probe == probe)
    }

    pub fn pair(&self, a: &str, b: &str) -> Option<&PairStats> {
        self.pairs.iter().find(|p| {
            (p.probe_a == a && p.probe_b == b) || (p.probe_a == b && p.probe_b == a)
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable tables.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Run {} ({}, {} tick(s) every {:.0}ms)",
            self.run_id, self.state, self.ticks, self.interval_ms
        );
        let _ = writeln!(out);

        let width = self
            .probes
            .iter()
            .map(|p| p.probe.len())
            .max()
            .unwrap_or(5)
            .max(5);

        let _ = writeln!(
            out,
            "{:<width$} {:>7} {:>8} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "Probe", "Success", "Timeouts", "Value mean", "Value min", "Value max", "Latency ms", "Latency sd"
        );
        let _ = writeln!(out, "{}", "-".repeat(width + 82));
        for p in &self.probes {
            let (mean, min, max) = match &p.value {
                Some(v) => (fmt_num(v.mean), fmt_num(v.min), fmt_num(v.max)),
                None => ("no signal".to_string(), "-".to_string(), "-".to_string()),
            };
            let (lat, lat_sd) = match &p.latency {
                Some(l) => (format!("{:.1}", l.mean), format!("{:.1}", l.stddev)),
                None => ("-".to_string(), "-".to_string()),
            };
            let _ = writeln!(
                out,
                "{:<width$} {:>6.0}% {:>8} {:>12} {:>12} {:>12} {:>12} {:>12}",
                p.probe,
                p.success_rate * 100.0,
                p.timeouts,
                mean,
                min,
                max,
                lat,
                lat_sd
            );
        }

        if !self.pairs.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Agreement (tolerance {:.0}ms):", self.tolerance_ms);
            for pair in &self.pairs {
                let diff = match (pair.mean_abs_difference, pair.max_abs_difference) {
                    (Some(mean), Some(max)) => {
                        format!("mean |diff| {}, max {}", fmt_num(mean), fmt_num(max))
                    }
                    _ => "no comparable samples".to_string(),
                };
                let _ = writeln!(
                    out,
                    "  {} vs {}: {} matched ({} unmatched / {} unmatched), {}",
                    pair.probe_a, pair.probe_b, pair.matched, pair.unmatched_a, pair.unmatched_b, diff
                );
            }
        }

        if !self.no_data.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "No data: {}", self.no_data.join(", "));
        }

        let _ = writeln!(out);
        match self.recommended() {
            Some(best) => {
                let latency = best
                    .mean_latency_ms
                    .map(|l| format!(", {l:.1}ms mean latency"))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "Recommended: {} ({:.0}% success{latency})",
                    best.probe,
                    best.success_rate * 100.0
                );
            }
            None => {
                let _ = writeln!(out, "Recommended: none (no probe produced data)");
            }
        }
        out
    }
}

/// Success rate descending, then mean latency ascending, then name.
fn rank(stats: &[ProbeStats]) -> Vec<RankEntry> {
    let mut entries: Vec<RankEntry> = stats
        .iter()
        .map(|s| RankEntry {
            rank: 0,
            probe: s.probe.clone(),
            success_rate: s.success_rate,
            mean_latency_ms: s.latency.map(|l| l.mean),
        })
        .collect();
    entries.sort_by(|a, b| {
        b.success_rate
            .total_cmp(&a.success_rate)
            .then_with(|| {
                let la = a.mean_latency_ms.unwrap_or(f64::INFINITY);
                let lb = b.mean_latency_ms.unwrap_or(f64::INFINITY);
                la.total_cmp(&lb)
            })
            .then_with(|| a.probe.cmp(&b.probe))
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    entries
}

fn fmt_num(v: f64) -> String {
    if v.abs() >= 1000.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Probe;
    use crate::probes::synthetic::{FixedProbe, FlakyProbe, FnProbe};
    use crate::probe::{ProbeInfo, ProbeKind};
    use crate::error::ErrorKind;
    use crate::sampler::{Sampler, StopCondition};
    use std::sync::Arc;

    fn run_of(probes: Vec<Arc<dyn Probe>>, ticks: u64) -> Run {
        let mut s = Sampler::new(Duration::from_millis(20)).stop(StopCondition::count(ticks));
        for p in probes {
            s.add_probe(p).unwrap();
        }
        s.run().unwrap()
    }

    fn broken(name: &str) -> Arc<dyn Probe> {
        Arc::new(FnProbe::new(
            ProbeInfo::new(name, "broken", ProbeKind::Synthetic, "value"),
            |_| Err(ErrorKind::QueryFailed("down".to_string())),
        ))
    }

    #[test]
    fn test_report_from_run() {
        let run = run_of(
            vec![
                Arc::new(FixedProbe::new("a", 10.0, Duration::ZERO)),
                Arc::new(FixedProbe::new("b", 12.0, Duration::ZERO)),
                Arc::new(FixedProbe::new("c", 11.0, Duration::ZERO)),
            ],
            3,
        );
        let report = Report::from_run(&run, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(report.probes.len(), 3);
        assert_eq!(report.pairs.len(), 3);
        assert_eq!(report.ticks, 3);
        assert_eq!(report.run_id, run.id());
        let ab = report.pair("b", "a").unwrap();
        assert_eq!(ab.matched, 3);
        assert!((ab.mean_abs_difference.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_ranking_prefers_reliability_then_speed() {
        let run = run_of(
            vec![
                Arc::new(FlakyProbe::new("flaky", 1.0, 2)),
                Arc::new(FixedProbe::new("slow", 1.0, Duration::from_millis(15))),
                Arc::new(FixedProbe::new("fast", 1.0, Duration::ZERO)),
            ],
            4,
        );
        let report = Report::from_run(&run, DEFAULT_TOLERANCE).unwrap();
        let order: Vec<&str> = report.ranking.iter().map(|r| r.probe.as_str()).collect();
        assert_eq!(order, vec!["fast", "slow", "flaky"]);
        assert_eq!(report.ranking[0].rank, 1);
        assert_eq!(report.recommended().unwrap().probe, "fast");
    }

    #[test]
    fn test_no_data_listed() {
        let run = run_of(
            vec![
                Arc::new(FixedProbe::new("ok", 0.0, Duration::ZERO)),
                broken("down"),
            ],
            2,
        );
        let report = Report::from_run(&run, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(report.no_data, vec!["down".to_string()]);
        assert!(report.stats_for("down").unwrap().value.is_none());
        let text = report.render_text();
        assert!(text.contains("no signal"));
        assert!(text.contains("No data: down"));
        assert!(text.contains("Recommended: ok"));
    }

    #[test]
    fn test_nothing_recommended_without_data() {
        let run = run_of(vec![broken("x")], 1);
        let report = Report::from_run(&run, DEFAULT_TOLERANCE).unwrap();
        assert!(report.recommended().is_none());
        assert!(report.render_text().contains("Recommended: none"));
    }

    #[test]
    fn test_empty_run_reports_nothing() {
        let run = run_of(vec![Arc::new(FixedProbe::new("a", 1.0, Duration::ZERO))], 0);
        let report = Report::from_run(&run, DEFAULT_TOLERANCE).unwrap();
        assert!(report.probes.is_empty());
        assert!(report.pairs.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let run = run_of(
            vec![
                Arc::new(FixedProbe::new("a", 1.0, Duration::ZERO)),
                Arc::new(FixedProbe::new("b", 1.0, Duration::ZERO)),
            ],
            1,
        );
        let report = Report::from_run(&run, Duration::from_millis(100)).unwrap();
        let v: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(v["state"], "completed");
        assert_eq!(v["tolerance_ms"], 100.0);
        assert_eq!(v["probes"][0]["probe"], "a");
        assert_eq!(v["pairs"][0]["probe_b"], "b");
        assert!(v["ranking"].is_array());
    }
}
