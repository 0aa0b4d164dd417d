//! Root-finding and least-squares solvers.
//!
//! ## Available Solvers
//!
//! - [`BrentSolver`]: Bracketing root finder used for delta-to-strike and
//!   implied-volatility inversion
//! - [`LevenbergMarquardtSolver`]: Damped Gauss-Newton least squares used by
//!   smile calibration, with an optional projection onto admissible parameters
//!
//! ## Configuration
//!
//! Brent uses [`SolverConfig`] (`tolerance`, `max_iterations`); the LM solver
//! uses [`LMConfig`] with extra damping controls.
//!
//! ## Examples
//!
//! ```
//! use volsim_core::math::solvers::{LevenbergMarquardtSolver, LMConfig};
//!
//! // Minimise (p[0] - 2)² + (p[1] - 3)²
//! let residuals = |params: &[f64]| -> Vec<f64> {
//!     vec![params[0] - 2.0, params[1] - 3.0]
//! };
//!
//! let solver = LevenbergMarquardtSolver::with_defaults();
//! let result = solver.solve(residuals, vec![0.0, 0.0]).unwrap();
//!
//! assert!(result.converged);
//! assert!((result.params[0] - 2.0).abs() < 1e-6);
//! ```

mod brent;
mod config;
mod levenberg_marquardt;

pub use brent::BrentSolver;
pub use config::SolverConfig;
pub use levenberg_marquardt::{LMConfig, LMResult, LevenbergMarquardtSolver};
