//! `perfprobe all`: run every scenario and summarize which ones produced data.

use perfprobe_core::{CancelToken, Error, HarnessConfig, Probe, Verdict, scenario};

use super::{describe_stop, fail, harness_config, install_ctrlc, write_json};
use crate::SamplingArgs;

/// Ticks per scenario when neither a count nor a duration was given.
const DEFAULT_TICKS: u64 = 5;

/// `config` with a tick limit added if it would otherwise run until Ctrl+C.
fn bounded(config: &HarnessConfig) -> HarnessConfig {
    let mut config = config.clone();
    if config.stop_condition().is_manual() {
        config.count = Some(DEFAULT_TICKS);
    }
    config
}

pub fn run(args: &SamplingArgs) {
    let config = harness_config(args).unwrap_or_else(|e| fail(e));
    let config = bounded(&config);

    let token = CancelToken::new();
    install_ctrlc(&token);

    println!(
        "Running {} scenario(s), {} each, every {}ms",
        scenario::all().len(),
        describe_stop(&config),
        config.interval_ms
    );

    let mut results: Vec<(&'static str, Verdict)> = Vec::new();
    let mut reports = Vec::new();

    for s in scenario::all() {
        if token.is_cancelled() {
            println!("\nInterrupted; skipping remaining scenarios.");
            break;
        }
        println!();
        println!("{}", "=".repeat(60));
        println!("{} — {}", s.name, s.description);
        println!("{}", "=".repeat(60));

        let probes: Vec<_> = s.available_probes();
        if probes.is_empty() {
            println!("  No backend available on this machine.");
            results.push((s.name, Verdict::Failed("no backend available".to_string())));
            continue;
        }
        let names: Vec<&str> = probes.iter().map(|p| p.name()).collect();
        println!("  Probes: {}", names.join(", "));
        println!();

        match super::run::sample(&config, probes, &token, true) {
            Ok((run, report)) => {
                println!();
                print!("{}", report.render_text());
                let verdict = Verdict::of(&report);
                reports.push(serde_json::json!({
                    "scenario": s.name,
                    "passed": verdict.passed(),
                    "verdict": verdict.to_string(),
                    "report": &report,
                    "run": &run,
                }));
                results.push((s.name, verdict));
            }
            Err(e @ Error::Spawn(_)) => fail(e),
            Err(e) => {
                eprintln!("  Error: {e}");
                results.push((s.name, Verdict::Failed(e.to_string())));
            }
        }
    }

    println!();
    println!("{}", "=".repeat(60));
    println!("Summary");
    println!("{}", "=".repeat(60));
    for (name, verdict) in &results {
        println!("  {name:<12} {verdict}");
    }
    let passed = results.iter().filter(|(_, v)| v.passed()).count();
    println!("\n{passed}/{} scenario(s) passed", results.len());

    if let Some(path) = &args.output {
        write_json(path, &serde_json::json!({ "scenarios": reports }));
    }
}
