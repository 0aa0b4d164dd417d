//! # volsim_core: Numerical Foundation for the Volatility Surface Simulator
//!
//! ## Layer 1 (Foundation) Role
//!
//! volsim_core is the bottom layer of the 3-layer workspace, providing:
//! - Root-finding and least-squares solvers (`math::solvers`)
//! - Standard normal distribution functions (`math::distributions`)
//! - The closed option-type enumeration (`types::option_type`)
//! - The error taxonomy shared by every layer (`types::error`)
//! - The pricing-oracle seam consumed by strike inversion (`traits::oracle`)
//!
//! ## Zero Dependency Principle
//!
//! Layer 1 has no dependencies on other volsim_* crates, with minimal external dependencies:
//! - num-traits: Traits for generic numerical computation
//! - thiserror: Error derive
//! - serde: Serialisation support (optional)
//!
//! ## Usage Examples
//!
//! ```rust
//! use volsim_core::math::solvers::{BrentSolver, SolverConfig};
//! use volsim_core::types::OptionType;
//!
//! let solver = BrentSolver::new(SolverConfig::default());
//! let root = solver.find_root(|x: f64| x * x - 2.0, 0.0, 2.0).unwrap();
//! assert!((root - std::f64::consts::SQRT_2).abs() < 1e-10);
//!
//! let kind: OptionType = "c".parse().unwrap();
//! assert_eq!(kind, OptionType::Call);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): Enable serialisation for `OptionType` and solver errors

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod math;
pub mod traits;
pub mod types;
