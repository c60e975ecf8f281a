//! CLI for perfprobe: sample telemetry backends side by side and compare them.

mod commands;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "perfprobe")]
#[command(about = "perfprobe — which telemetry backend answers fastest and most reliably?")]
#[command(version = perfprobe_core::VERSION)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in probes and scenarios, and whether each backend is present
    Scan,

    /// Invoke a single probe once and show value, latency, and error
    Probe {
        /// Probe name, e.g. cpu.counter (partial match)
        name: String,

        /// Invocation timeout (e.g. 500ms, 5s)
        #[arg(long, default_value = "5s")]
        timeout: String,
    },

    /// Sample one scenario's backends and print a comparison report
    Run {
        /// Scenario: cpu, gpu, gpu-memory, memory, clock, demo
        scenario: Option<String>,

        /// Comma-separated probe names to sample instead of a scenario
        #[arg(long)]
        probes: Option<String>,

        #[command(flatten)]
        sampling: SamplingArgs,

        /// Report format
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Don't print a line per tick
        #[arg(long)]
        quiet: bool,
    },

    /// Run every scenario and print a PASSED/FAILED summary
    All {
        #[command(flatten)]
        sampling: SamplingArgs,
    },
}

/// Sampling settings shared by `run` and `all`. Flags override the config file.
#[derive(Args, Debug, Default)]
pub struct SamplingArgs {
    /// TOML config file with harness settings
    #[arg(long)]
    config: Option<String>,

    /// Time between ticks (e.g. 250ms, 1s)
    #[arg(long)]
    interval: Option<String>,

    /// Stop after N ticks
    #[arg(long)]
    count: Option<u64>,

    /// Stop after this long (e.g. 30s, 5m)
    #[arg(long)]
    duration: Option<String>,

    /// Per-invocation timeout (e.g. 500ms, 5s)
    #[arg(long)]
    timeout: Option<String>,

    /// Max offset between samples paired for comparison (e.g. 500ms)
    #[arg(long)]
    tolerance: Option<String>,

    /// Invoke all probes of a tick concurrently (the default)
    #[arg(long)]
    parallel: bool,

    /// Invoke the probes of a tick one after another
    #[arg(long, conflicts_with = "parallel")]
    sequential: bool,

    /// Unrecorded warm-up invocations before the first tick
    #[arg(long)]
    warmup: Option<u32>,

    /// Write the report and raw samples as JSON
    #[arg(long)]
    output: Option<String>,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Scan => commands::scan::run(),
        Commands::Probe { name, timeout } => commands::probe::run(&name, &timeout),
        Commands::Run {
            scenario,
            probes,
            sampling,
            format,
            quiet,
        } => commands::run::run(commands::run::RunCommandConfig {
            scenario: scenario.as_deref(),
            probes: probes.as_deref(),
            sampling: &sampling,
            json: format == "json",
            live: !quiet,
        }),
        Commands::All { sampling } => commands::all::run(&sampling),
    }
}
