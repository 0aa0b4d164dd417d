//! Numerical building blocks.
//!
//! - [`solvers`]: Brent root finding and Levenberg-Marquardt least squares
//! - [`distributions`]: Standard normal CDF and PDF

pub mod distributions;
pub mod solvers;

pub use distributions::{norm_cdf, norm_pdf};
