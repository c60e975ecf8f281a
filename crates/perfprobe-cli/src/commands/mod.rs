pub mod all;
pub mod probe;
pub mod run;
pub mod scan;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use perfprobe_core::{
    CancelToken, Error, HarnessConfig, Probe, Result, find_probe, parse_duration, scenario,
};

use crate::SamplingArgs;

/// Print a harness error and exit non-zero.
pub fn fail(err: Error) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(1);
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

/// Config file (if any) with command-line flags layered on top.
pub fn harness_config(args: &SamplingArgs) -> Result<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(Path::new(path))?,
        None => HarnessConfig::default(),
    };

    if let Some(s) = &args.interval {
        config.interval_ms = millis(parse_duration(s)?);
    }
    if let Some(s) = &args.timeout {
        config.timeout_ms = millis(parse_duration(s)?);
    }
    if let Some(s) = &args.tolerance {
        config.tolerance_ms = millis(parse_duration(s)?);
    }
    if let Some(s) = &args.duration {
        config.duration_ms = Some(millis(parse_duration(s)?));
    }
    if args.count.is_some() {
        config.count = args.count;
    }
    if args.parallel {
        config.parallel = true;
    }
    if args.sequential {
        config.parallel = false;
    }
    if let Some(rounds) = args.warmup {
        config.warmup = rounds;
    }

    config.validate()?;
    Ok(config)
}

/// Resolve the probes to sample: explicit names win, then the config file's
/// list, then the scenario. Unavailable backends are dropped with a warning.
pub fn select_probes(
    scenario_name: Option<&str>,
    names: Option<&str>,
    config: &HarnessConfig,
) -> Result<Vec<Arc<dyn Probe>>> {
    let requested: Vec<String> = match names {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect(),
        None if scenario_name.is_none() => config.probes.clone(),
        None => Vec::new(),
    };

    let candidates: Vec<Arc<dyn Probe>> = if !requested.is_empty() {
        requested
            .iter()
            .map(|n| find_probe(n).ok_or_else(|| Error::UnknownProbe(n.clone())))
            .collect::<Result<_>>()?
    } else if let Some(name) = scenario_name {
        scenario::find(name)?.probes()
    } else {
        return Err(Error::InvalidConfig(
            "name a scenario or pass --probes (see `perfprobe scan`)".to_string(),
        ));
    };

    let available: Vec<Arc<dyn Probe>> = candidates
        .into_iter()
        .filter(|p| {
            let ok = p.is_available();
            if !ok {
                log::warn!("probe '{}' unavailable on this host; skipping", p.name());
            }
            ok
        })
        .collect();

    if available.is_empty() {
        return Err(Error::NoProbes);
    }
    Ok(available)
}

/// Route Ctrl+C to `token`. Only the first call in a process takes effect.
pub fn install_ctrlc(token: &CancelToken) {
    let flag = token.flag();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        log::warn!("could not install Ctrl+C handler: {e}");
    }
}

/// Pretty-print `value` to `path`.
pub fn write_json(path: &str, value: &serde_json::Value) {
    let text = match serde_json::to_string_pretty(value) {
        Ok(t) => t,
        Err(e) => fail(e.into()),
    };
    match std::fs::write(path, text) {
        Ok(()) => println!("\nResults written to {path}"),
        Err(e) => eprintln!("\nFailed to write {path}: {e}"),
    }
}

/// Human description of how a run ends.
pub fn describe_stop(config: &HarnessConfig) -> String {
    match (config.count, config.duration_ms) {
        (Some(n), Some(ms)) => format!("{n} tick(s) or {ms}ms, whichever first"),
        (Some(n), None) => format!("{n} tick(s)"),
        (None, Some(ms)) => format!("{ms}ms"),
        (None, None) => "until Ctrl+C".to_string(),
    }
}
