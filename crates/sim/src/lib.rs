//! Simulation driver: a fixed-rate loop stepping a shared `World`.
//!
//! # Invariants
//! - Every compute task of a step finishes before any commit task begins.
//! - A failed or panicking compute phase leaves the world in its pre-step,
//!   fully committed state.
//! - Only the simulation loop (or `step_once`) writes to the world while a
//!   simulator owns it; observers hold read locks.

mod config;
mod error;
mod pace;
mod simulator;
mod strategy;

pub use config::{SimConfig, StepMode};
pub use error::{ConfigError, SimError, StepError};
pub use pace::{MAX_INTERVAL, Pacer};
pub use simulator::{SimStats, Simulator};
pub use strategy::{Parallel, SemanticStep, Serial, StateSwitchStep, Strategies, run_step};

pub fn crate_info() -> &'static str {
    "nestgrid-sim v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("sim"));
    }
}
