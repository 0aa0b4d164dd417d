//! Stochastic dynamics and parametric smiles.
//!
//! - [`heston`]: Heston parameters and the full-truncation Euler step
//! - [`sabr`]: Hagan SABR implied volatility with degeneracy guards

pub mod heston;
pub mod sabr;

pub use heston::{HestonError, HestonParams};
pub use sabr::{SabrError, SabrExpansion, SabrParams};
