//! Compare every available CPU utilization backend.
//!
//! Samples each backend once a second for ten seconds, then prints the
//! comparison report.
//!
//! Run: `cargo run --example compare`

use std::time::Duration;

use perfprobe_core::{Report, Sampler, StopCondition, scenario};

fn main() -> perfprobe_core::Result<()> {
    let mut sampler = Sampler::new(Duration::from_secs(1))
        .timeout(Duration::from_secs(3))
        .parallel(true)
        .stop(StopCondition::count(10));

    for probe in scenario::find("cpu")?.available_probes() {
        println!("Registered {} ({})", probe.name(), probe.info().kind);
        sampler.add_probe(probe)?;
    }

    let run = sampler.run_with(|tick| {
        let values: Vec<String> = tick
            .samples
            .iter()
            .map(|s| s.value().map(|v| format!("{v:.1}")).unwrap_or_default())
            .collect();
        println!("tick {:>2}: {}", tick.tick, values.join("\t"));
    })?;

    let report = Report::from_run(&run, Duration::from_millis(500))?;
    println!("\n{}", report.render_text());
    Ok(())
}
