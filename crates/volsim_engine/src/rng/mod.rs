//! Random sources for path simulation.
//!
//! - [`SimRng`]: seeded wrapper over `StdRng` with batch normal draws
//! - [`derive_seed`]: per-path seed from a base seed and an index
//! - [`CorrelatedNormals`]: Cholesky factor of a 2×2 correlation matrix

mod correlated;
mod prng;

pub use correlated::CorrelatedNormals;
pub use prng::{derive_seed, SimRng};
