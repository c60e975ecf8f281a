use std::sync::Arc;

use perfprobe_core::{Probe, all_probes, invoke_once, parse_duration};

use super::fail;

pub fn run(probe_name: &str, timeout: &str) {
    let timeout = parse_duration(timeout).unwrap_or_else(|e| fail(e));

    let needle = probe_name.to_lowercase();
    let mut matches: Vec<Arc<dyn Probe>> = all_probes()
        .into_iter()
        .filter(|p| p.name().to_lowercase().contains(&needle))
        .collect();
    // Prefer an exact name over partial hits.
    if let Some(pos) = matches.iter().position(|p| p.name().eq_ignore_ascii_case(probe_name)) {
        matches = vec![matches.swap_remove(pos)];
    }

    if matches.is_empty() {
        eprintln!("Probe '{probe_name}' not found. Run 'scan' to list probes.");
        std::process::exit(1);
    }
    if matches.len() > 1 {
        let names: Vec<&str> = matches.iter().map(|p| p.name()).collect();
        eprintln!("Probe '{probe_name}' is ambiguous: {}", names.join(", "));
        std::process::exit(1);
    }

    let probe = &matches[0];
    let info = probe.info();
    println!("Probing: {} ({})", info.name, info.kind);
    println!("  {}", info.description);
    if !probe.is_available() {
        println!("  Backend not detected on this machine; trying anyway.");
    }
    println!();

    let sample = invoke_once(probe, timeout).unwrap_or_else(|e| fail(e));
    match (sample.value(), sample.error()) {
        (Some(v), _) => println!("  Value:   {v} {}", info.unit),
        (None, Some(err)) => println!("  Error:   {err}"),
        (None, None) => {}
    }
    println!("  Latency: {:.1}ms", sample.latency_ms());
}
