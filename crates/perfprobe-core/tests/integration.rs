//! Integration tests for perfprobe-core.
//!
//! These tests drive the whole pipeline:
//! probes → sampler → run → summaries, comparisons, report.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use perfprobe_core::probes::synthetic::{FixedProbe, FlakyProbe, PanicProbe};
use perfprobe_core::{
    ErrorKind, HarnessConfig, Probe, Report, RunState, Sample, Sampler, StopCondition, compare,
    scenario, summarize,
};

fn fixed(name: &str, value: f64, delay_ms: u64) -> Arc<dyn Probe> {
    Arc::new(FixedProbe::new(name, value, Duration::from_millis(delay_ms)))
}

#[test]
fn fast_and_slow_probes_agree_within_tolerance() {
    let mut sampler = Sampler::new(Duration::from_millis(100)).stop(StopCondition::count(5));
    sampler.add_probe(fixed("fast", 42.0, 5)).unwrap();
    sampler.add_probe(fixed("slow", 45.0, 50)).unwrap();
    let run = sampler.run().unwrap();

    assert_eq!(run.state(), RunState::Completed);
    let fast = run.series_for("fast").unwrap();
    let slow = run.series_for("slow").unwrap();
    assert_eq!(fast.len(), 5);
    assert_eq!(slow.len(), 5);

    let fast_stats = summarize(fast).unwrap();
    let slow_stats = summarize(slow).unwrap();
    assert_eq!(fast_stats.success_rate, 1.0);
    assert_eq!(slow_stats.success_rate, 1.0);
    assert_eq!(fast_stats.value.unwrap().mean, 42.0);
    assert_eq!(slow_stats.value.unwrap().mean, 45.0);
    assert!(fast_stats.latency.unwrap().mean >= 5.0);
    assert!(slow_stats.latency.unwrap().mean >= 50.0);
    assert!(fast_stats.latency.unwrap().mean < slow_stats.latency.unwrap().mean);

    let pair = compare(fast, slow, Duration::from_millis(60)).unwrap();
    assert_eq!(pair.matched, 5);
    assert!((pair.mean_abs_difference.unwrap() - 3.0).abs() < 1e-9);
}

#[test]
fn every_third_call_failing_gives_two_thirds_success() {
    let mut sampler = Sampler::new(Duration::from_millis(10)).stop(StopCondition::count(9));
    sampler
        .add_probe(Arc::new(FlakyProbe::new("flaky", 5.0, 3)))
        .unwrap();
    let run = sampler.run().unwrap();

    let stats = summarize(&run.series()[0]).unwrap();
    assert_eq!(stats.count, 9);
    assert_eq!(stats.successes, 6);
    assert_eq!(stats.failures, 3);
    assert!((stats.success_rate - 6.0 / 9.0).abs() < 1e-12);
    assert_eq!(stats.value.unwrap().mean, 5.0);
}

#[test]
fn cancelling_after_fourth_tick_keeps_four_samples() {
    let mut sampler = Sampler::new(Duration::from_millis(20)).stop(StopCondition::count(10));
    sampler.add_probe(fixed("a", 1.0, 0)).unwrap();
    sampler.add_probe(fixed("b", 2.0, 0)).unwrap();
    let token = sampler.canceller();

    let run = sampler
        .run_with(|tick| {
            if tick.tick == 3 {
                token.cancel();
            }
        })
        .unwrap();

    assert_eq!(run.state(), RunState::Cancelled);
    for series in run.series() {
        assert_eq!(series.len(), 4);
    }
}

#[test]
fn always_timing_out_probe_is_bounded() {
    let mut sampler = Sampler::new(Duration::from_millis(100))
        .timeout(Duration::from_millis(50))
        .stop(StopCondition::count(3));
    sampler.add_probe(fixed("hung", 1.0, 2_000)).unwrap();

    let t0 = Instant::now();
    let run = sampler.run().unwrap();
    assert!(t0.elapsed() < Duration::from_secs(1), "took {:?}", t0.elapsed());

    let series = &run.series()[0];
    assert_eq!(series.len(), 3);
    for sample in series {
        assert_eq!(sample.error(), Some(&ErrorKind::Timeout));
        assert!(sample.latency_ms() >= 50.0);
        assert!(sample.latency_ms() < 150.0, "latency {}", sample.latency_ms());
    }
    let stats = summarize(series).unwrap();
    assert_eq!(stats.timeouts, 3);
    assert!(stats.value.is_none());
}

#[test]
fn parallel_offsets_strictly_increase() {
    let mut sampler = Sampler::new(Duration::from_millis(15))
        .parallel(true)
        .stop(StopCondition::count(8));
    for (i, delay) in [0u64, 3, 7, 12].iter().enumerate() {
        sampler
            .add_probe(fixed(&format!("p{i}"), i as f64, *delay))
            .unwrap();
    }
    sampler.add_probe(Arc::new(PanicProbe::new("panics"))).unwrap();
    let run = sampler.run().unwrap();

    assert_eq!(run.ticks(), 8);
    let names: Vec<&str> = run.series().iter().map(|s| s.probe()).collect();
    assert_eq!(names, vec!["p0", "p1", "p2", "p3", "panics"]);
    for series in run.series() {
        assert_eq!(series.len(), 8);
        let offsets: Vec<u64> = series.iter().map(Sample::offset_us).collect();
        assert!(offsets.windows(2).all(|w| w[0] < w[1]), "{offsets:?}");
        for sample in series {
            assert!(sample.latency_ms() >= 0.0);
            assert_ne!(sample.value().is_some(), sample.error().is_some());
        }
    }
    let panics = summarize(run.series_for("panics").unwrap()).unwrap();
    assert_eq!(panics.successes, 0);
}

#[test]
fn report_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "interval_ms = 50\ncount = 3\ntolerance_ms = 100\nparallel = true"
    )
    .unwrap();

    let config = HarnessConfig::load(file.path()).unwrap();
    assert_eq!(config.count, Some(3));

    let mut sampler = config
        .sampler(scenario::find("demo").unwrap().probes())
        .unwrap();
    let run = sampler.run().unwrap();
    let report = Report::from_run(&run, config.tolerance()).unwrap();

    assert_eq!(report.ticks, 3);
    assert_eq!(report.probes.len(), 2);
    assert_eq!(report.pairs.len(), 1);
    assert!(report.no_data.is_empty());
    assert_eq!(report.recommended().unwrap().probe, "demo.fast");
    assert!((report.pairs[0].mean_abs_difference.unwrap() - 3.0).abs() < 1e-9);

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["run_id"], run.id());
}

#[test]
fn default_config_pairs_second_long_backends() {
    let config = HarnessConfig {
        interval_ms: 1_200,
        count: Some(3),
        ..HarnessConfig::default()
    };
    let mut sampler = config
        .sampler(vec![fixed("counter", 20.0, 1_000), fixed("cim", 21.0, 300)])
        .unwrap();
    let run = sampler.run().unwrap();
    let report = Report::from_run(&run, config.tolerance()).unwrap();

    let pair = &report.pairs[0];
    assert_eq!(pair.matched, 3);
    assert_eq!(pair.unmatched_a, 0);
    assert_eq!(pair.unmatched_b, 0);
    assert!((pair.mean_abs_difference.unwrap() - 1.0).abs() < 1e-9);
}

#[test]
fn config_file_missing_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, perfprobe_core::Error::Io(_)));
}

#[test]
#[ignore] // Needs real backends. Run with: cargo test -- --ignored
fn cpu_scenario_on_this_host() {
    let probes = scenario::find("cpu").unwrap().available_probes();
    assert!(!probes.is_empty(), "no CPU backend available");
    let mut sampler = Sampler::new(Duration::from_secs(2))
        .timeout(Duration::from_secs(5))
        .stop(StopCondition::count(3));
    for p in probes {
        sampler.add_probe(p).unwrap();
    }
    let run = sampler.run().unwrap();
    let report = Report::from_run(&run, Duration::from_secs(1)).unwrap();
    println!("{}", report.render_text());
    assert!(report.recommended().is_some());
}
