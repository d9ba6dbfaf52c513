//! Headless colony runner.
//!
//! # Usage
//!
//! ```bash
//! # Run one scenario and print its metrics
//! cargo run -p colony_headless -- run --scenario scenarios/hamlet.ron
//!
//! # Run several scenarios in parallel
//! cargo run -p colony_headless -- batch --scenario scenarios/hamlet.ron scenarios/flaky_porters.ron --parallel
//!
//! # Verify determinism
//! cargo run -p colony_headless -- verify --scenario scenarios/hamlet.ron --runs 5
//! ```
//!
//! Metrics go to stdout as JSON; logs go to stderr. Set `RUST_LOG` to
//! override the level picked by `--verbose`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use colony_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::ScenarioRunner,
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "colony_headless")]
#[command(about = "Headless colony logistics runner for CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single scenario
    Run {
        /// Scenario file to load (built-in hamlet if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Override the scenario's tick count
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Also write metrics to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a binary snapshot of the final colony
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Play many scenario files
    Batch {
        /// Scenario files
        #[arg(short, long, num_args = 1.., required = true)]
        scenario: Vec<PathBuf>,

        /// Override every scenario's tick count
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Run scenarios in parallel
        #[arg(short, long)]
        parallel: bool,

        /// Output file for batch results
        #[arg(short, long, default_value = "results/batch.json")]
        output: PathBuf,
    },

    /// Verify determinism by playing the same scenario several times
    Verify {
        /// Scenario file to load (built-in hamlet if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Override the scenario's tick count
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries JSON
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            ticks,
            output,
            snapshot,
        } => cmd_run(scenario, ticks, output, snapshot),
        Commands::Batch {
            scenario,
            ticks,
            parallel,
            output,
        } => cmd_batch(scenario, ticks, parallel, output),
        Commands::Verify {
            scenario,
            ticks,
            runs,
        } => cmd_verify(scenario, ticks, runs),
    }
}

fn load_scenario(path: Option<PathBuf>) -> Scenario {
    let Some(path) = path else {
        return Scenario::hamlet();
    };
    match Scenario::load(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load scenario: {e}");
            std::process::exit(1);
        }
    }
}

/// Play a single scenario
fn cmd_run(
    scenario: Option<PathBuf>,
    ticks: Option<u64>,
    output: Option<PathBuf>,
    snapshot: Option<PathBuf>,
) {
    let scenario = load_scenario(scenario);
    let ticks = ticks.unwrap_or(scenario.ticks);

    let mut runner = match ScenarioRunner::new(scenario) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Invalid scenario: {e}");
            std::process::exit(1);
        }
    };
    for _ in 0..ticks {
        if let Err(e) = runner.step() {
            eprintln!("Simulation failed at tick {}: {e}", runner.colony().tick());
            std::process::exit(1);
        }
    }
    if let Some(path) = snapshot {
        if let Err(e) = runner.save_snapshot(&path) {
            eprintln!("Failed to save snapshot: {e}");
            std::process::exit(1);
        }
    }
    let metrics = runner.finish();

    match serde_json::to_string_pretty(&metrics) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize metrics: {e}");
            std::process::exit(1);
        }
    }
    if let Some(path) = output {
        if let Err(e) = metrics.save(&path) {
            eprintln!("Failed to save metrics: {e}");
            std::process::exit(1);
        }
    }
    if !metrics.audit_passed {
        eprintln!("FAIL: Audit found leaked locks");
        std::process::exit(2);
    }
}

/// Play many scenario files
fn cmd_batch(scenario: Vec<PathBuf>, ticks: Option<u64>, parallel: bool, output: PathBuf) {
    let results = run_batch(&scenario, &BatchConfig { ticks, parallel });

    eprintln!();
    eprintln!("Batch complete in {:.1}s", results.duration_seconds);
    eprintln!("  Runs:            {}", results.summary.runs);
    eprintln!("  Clean audits:    {}", results.summary.clean_runs);
    eprintln!("  Units delivered: {}", results.summary.total_units_delivered);
    eprintln!("  Rollbacks:       {}", results.summary.total_rollbacks);
    eprintln!(
        "  Cache hit rate:  {:.1}%",
        results.summary.mean_cache_hit_rate * 100.0
    );

    if let Err(e) = results.save(&output) {
        eprintln!("Failed to save results: {e}");
        std::process::exit(1);
    }
    tracing::info!("Results saved to {}", output.display());

    if !results.errors.is_empty() || results.summary.clean_runs != results.summary.runs {
        std::process::exit(1);
    }
}

/// Verify determinism
fn cmd_verify(scenario: Option<PathBuf>, ticks: Option<u64>, runs: u32) {
    let scenario = load_scenario(scenario);
    tracing::info!("Verifying determinism: {} ({} runs)", scenario.name, runs);

    match verify_determinism(&scenario, ticks, runs) {
        Ok(true) => eprintln!("PASS: All {runs} runs produced identical results"),
        Ok(false) => {
            eprintln!("FAIL: Non-determinism detected!");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Simulation failed: {e}");
            std::process::exit(1);
        }
    }
}
