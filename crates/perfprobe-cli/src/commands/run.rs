//! `perfprobe run`: sample one scenario and compare its backends.

use std::io::Write;
use std::sync::Arc;

use perfprobe_core::{
    CancelToken, HarnessConfig, Probe, Report, Result, Run, TickReport,
};

use super::{describe_stop, fail, harness_config, install_ctrlc, select_probes, write_json};
use crate::SamplingArgs;

pub struct RunCommandConfig<'a> {
    pub scenario: Option<&'a str>,
    pub probes: Option<&'a str>,
    pub sampling: &'a SamplingArgs,
    pub json: bool,
    pub live: bool,
}

pub fn run(cfg: RunCommandConfig) {
    let config = harness_config(cfg.sampling).unwrap_or_else(|e| fail(e));
    let probes = select_probes(cfg.scenario, cfg.probes, &config).unwrap_or_else(|e| fail(e));

    let token = CancelToken::new();
    install_ctrlc(&token);

    if !cfg.json {
        let names: Vec<&str> = probes.iter().map(|p| p.name()).collect();
        println!("Sampling {}", names.join(", "));
        println!(
            "  Interval: {}ms  Timeout: {}ms  Stop: {}  Mode: {}",
            config.interval_ms,
            config.timeout_ms,
            describe_stop(&config),
            if config.parallel { "parallel" } else { "sequential" }
        );
        println!();
    }

    let (run, report) =
        sample(&config, probes, &token, cfg.live && !cfg.json).unwrap_or_else(|e| fail(e));

    if cfg.json {
        match report.to_json() {
            Ok(text) => println!("{text}"),
            Err(e) => fail(e),
        }
    } else {
        println!();
        print!("{}", report.render_text());
    }

    if let Some(path) = &cfg.sampling.output {
        write_json(
            path,
            &serde_json::json!({
                "report": &report,
                "run": &run,
            }),
        );
    }
}

/// Sample `probes` under `config` and build the report.
pub fn sample(
    config: &HarnessConfig,
    probes: Vec<Arc<dyn Probe>>,
    token: &CancelToken,
    live: bool,
) -> Result<(Run, Report)> {
    let mut sampler = config.sampler(probes)?.cancel_token(token.clone());

    let run = if live {
        let names = sampler.probe_names();
        let widths = column_widths(&names);
        println!("{}", header_line(&names, &widths));
        sampler.run_with(|tick| {
            println!("{}", tick_line(tick, &widths));
            let _ = std::io::stdout().flush();
        })?
    } else {
        sampler.run()?
    };

    let report = Report::from_run(&run, config.tolerance())?;
    Ok((run, report))
}

const TICK_WIDTH: usize = 5;
const OFFSET_WIDTH: usize = 9;

fn column_widths(names: &[String]) -> Vec<usize> {
    names.iter().map(|n| n.len().max(10)).collect()
}

fn header_line(names: &[String], widths: &[usize]) -> String {
    let mut line = format!("{:>TICK_WIDTH$} {:>OFFSET_WIDTH$}", "tick", "offset");
    for (name, w) in names.iter().zip(widths) {
        line.push_str(&format!("  {name:>w$}"));
    }
    line
}

/// One row per tick; a failed probe leaves its cell blank.
fn tick_line(tick: &TickReport<'_>, widths: &[usize]) -> String {
    let mut line = format!(
        "{:>TICK_WIDTH$} {:>width$.3}s",
        tick.tick,
        tick.offset.as_secs_f64(),
        width = OFFSET_WIDTH - 1
    );
    for (sample, w) in tick.samples.iter().zip(widths) {
        let cell = sample.value().map(|v| format!("{v:.2}")).unwrap_or_default();
        line.push_str(&format!("  {cell:>w$}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfprobe_core::{ErrorKind, Sample};
    use std::time::Duration;

    fn samples() -> Vec<Sample> {
        vec![
            Sample::success("a", 2, 0, 0, 12.345, Duration::from_millis(3)),
            Sample::failure("b", 2, 10, 0, ErrorKind::Timeout, Duration::from_millis(50)),
        ]
    }

    #[test]
    fn test_tick_line_blank_for_failure() {
        let s = samples();
        let tick = TickReport {
            tick: 2,
            offset: Duration::from_millis(2000),
            samples: &s,
        };
        let widths = vec![10, 10];
        let line = tick_line(&tick, &widths);
        assert!(line.contains("12.35") || line.contains("12.34"));
        assert!(line.contains("2.000s"));
        assert!(line.ends_with(&" ".repeat(12)));
        assert_eq!(line.len(), header_line(&["a".into(), "b".into()], &widths).len());
    }

    #[test]
    fn test_column_widths_fit_names() {
        let names = vec!["cpu.counter".to_string(), "x".to_string()];
        assert_eq!(column_widths(&names), vec![11, 10]);
    }

    #[test]
    fn test_sample_demo_probes() {
        let config = HarnessConfig {
            interval_ms: 60,
            count: Some(2),
            ..HarnessConfig::default()
        };
        let probes = perfprobe_core::scenario::find("demo").unwrap().probes();
        let (run, report) = sample(&config, probes, &CancelToken::new(), false).unwrap();
        assert_eq!(run.ticks(), 2);
        assert_eq!(report.probes.len(), 2);
    }
}
