//! Heston path simulation.
//!
//! Full-truncation Euler on (S, V) with Cholesky-correlated increments.
//! Paths are stored row-major, `index = path * (n_steps + 1) + step`, with
//! `step = 0` holding the initial state.

mod config;
mod paths;

pub use config::{SimulationConfig, SimulationConfigBuilder, MAX_PATHS, MAX_STEPS};
pub use paths::{simulate_paths, simulate_paths_parallel, simulate_paths_seeded, PathTensor};
