//! Lognormal reference oracle.
//!
//! [`BlackScholesOracle`] implements [`OptionOracle`] with closed-form
//! prices and deltas plus a Brent-based implied volatility inversion, so the
//! surface engine runs without an external pricing library.
//!
//! [`OptionOracle`]: volsim_core::traits::OptionOracle

pub mod black_scholes;
pub mod error;

pub use black_scholes::BlackScholesOracle;
pub use error::AnalyticalError;
