//! Headless frontier simulation runner.
//!
//! Reports are written to stdout as JSON; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Run the reference scenario
//! cargo run -p frontier_headless -- run
//!
//! # Run a scenario file for a fixed number of ticks
//! cargo run -p frontier_headless -- run --scenario scenarios/skirmish.ron --ticks 600
//!
//! # Check determinism across threads
//! cargo run -p frontier_headless -- verify --runs 8
//!
//! # Record, reload and scrub a replay
//! cargo run -p frontier_headless -- replay-check --output run.replay --scrub 0,100,250
//!
//! # Two lockstep peers over a loopback transport
//! cargo run -p frontier_headless -- lockstep --input-delay 3
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use frontier_headless::runner::{
    lockstep_loopback, replay_check, run_scenario, verify_determinism, HeadlessError,
};
use frontier_headless::scenario::ScenarioSource;

#[derive(Parser)]
#[command(name = "frontier_headless")]
#[command(about = "Headless frontier simulation runner for CI and determinism checks")]
#[command(version)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scenario and report the end state
    Run {
        /// Scenario file (RON); the reference scenario when omitted
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Override the scenario length
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Run a scenario several times in parallel and compare hashes
    Verify {
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of runs
        #[arg(short, long, default_value = "4")]
        runs: usize,

        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Record a replay, reload it and check scrubbed playback
    ReplayCheck {
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Replay file to write
        #[arg(short, long, default_value = "frontier.replay")]
        output: PathBuf,

        #[arg(short, long)]
        ticks: Option<u64>,

        /// Ticks to scrub to, comma separated
        #[arg(long, value_delimiter = ',', default_value = "0")]
        scrub: Vec<u64>,
    },

    /// Run two lockstep peers over an in-process transport
    Lockstep {
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        #[arg(short, long)]
        ticks: Option<u64>,

        /// Ticks between issuing and executing a command
        #[arg(long, default_value = "2")]
        input_delay: u64,
    },
}

fn print_report<T: Serialize>(report: &T) -> Result<(), HeadlessError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| frontier_core::error::GameError::Serialization(e.to_string()))?;
    println!("{json}");
    Ok(())
}

fn execute(command: Commands) -> Result<bool, HeadlessError> {
    match command {
        Commands::Run { scenario, ticks } => {
            let source = ScenarioSource::from_path(scenario.as_deref())?;
            print_report(&run_scenario(&source, ticks)?)?;
            Ok(true)
        }
        Commands::Verify {
            scenario,
            runs,
            ticks,
        } => {
            let source = ScenarioSource::from_path(scenario.as_deref())?;
            let report = verify_determinism(&source, runs, ticks)?;
            print_report(&report)?;
            Ok(report.deterministic)
        }
        Commands::ReplayCheck {
            scenario,
            output,
            ticks,
            scrub,
        } => {
            let source = ScenarioSource::from_path(scenario.as_deref())?;
            let report = replay_check(&source, &output, ticks, &scrub)?;
            print_report(&report)?;
            Ok(report.first_mismatch.is_none())
        }
        Commands::Lockstep {
            scenario,
            ticks,
            input_delay,
        } => {
            let source = ScenarioSource::from_path(scenario.as_deref())?;
            let report = lockstep_loopback(&source, ticks, input_delay)?;
            print_report(&report)?;
            Ok(report.in_sync)
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // stdout carries reports, so logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match execute(cli.command) {
        Ok(true) => {}
        Ok(false) => {
            tracing::error!("check failed");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(error = %e, "headless run failed");
            std::process::exit(1);
        }
    }
}
