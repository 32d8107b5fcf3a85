//! Headless host for the frontier simulation.
//!
//! Runs scenarios without presentation for CI and offline checks:
//!
//! - **Run**: simulate a scenario and report the final hash and faction state
//! - **Verify**: run the same scenario on several threads and compare hashes
//! - **Replay check**: record, save, reload and scrub a replay file
//! - **Lockstep**: drive two in-process peers over a loopback transport
//!
//! Scenarios are RON files (see `scenarios/skirmish.ron`); without one the
//! built-in reference scenario is used.
//!
//! ```bash
//! cargo run -p frontier_headless -- run --scenario scenarios/skirmish.ron
//! cargo run -p frontier_headless -- verify --runs 8
//! ```

pub mod runner;
pub mod scenario;

pub use runner::{
    lockstep_loopback, replay_check, run_scenario, verify_determinism, HeadlessError,
    LockstepReport, ReplayReport, RunReport, VerifyReport,
};
pub use scenario::{Scenario, ScenarioError, ScenarioSource};
