//! Seams between the numerical core and external collaborators.
//!
//! - [`OptionOracle`]: Pricing and Greek functions consumed by strike
//!   inversion and implied-volatility lookup
//!
//! Oracles are passed by generic parameter, not `Box<dyn ...>`, so the hot
//! delta loop is statically dispatched.

pub mod oracle;

pub use oracle::OptionOracle;
