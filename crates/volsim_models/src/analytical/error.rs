//! Error types for the lognormal oracle.

use thiserror::Error;
use volsim_core::types::SurfaceError;

/// Analytical pricing errors.
///
/// # Examples
/// ```
/// use volsim_models::analytical::AnalyticalError;
///
/// let err = AnalyticalError::InvalidVolatility { volatility: -0.2 };
/// assert!(format!("{}", err).contains("volatility"));
/// ```
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalyticalError {
    /// Non-positive or non-finite spot.
    #[error("Invalid spot price: S = {spot}")]
    InvalidSpot {
        /// The rejected spot
        spot: f64,
    },

    /// Non-positive or non-finite strike.
    #[error("Invalid strike: K = {strike}")]
    InvalidStrike {
        /// The rejected strike
        strike: f64,
    },

    /// Non-positive or non-finite expiry.
    #[error("Invalid expiry: T = {expiry}")]
    InvalidExpiry {
        /// The rejected expiry
        expiry: f64,
    },

    /// Non-positive or non-finite volatility.
    #[error("Invalid volatility: σ = {volatility}")]
    InvalidVolatility {
        /// The rejected volatility
        volatility: f64,
    },

    /// Non-finite rate or dividend yield.
    #[error("Invalid rate: {rate}")]
    InvalidRate {
        /// The rejected rate
        rate: f64,
    },

    /// Premium outside the no-arbitrage bounds, so no volatility reproduces it.
    #[error("Price {price} outside no-arbitrage bounds ({lower}, {upper})")]
    PriceOutOfBounds {
        /// The target premium
        price: f64,
        /// Intrinsic lower bound
        lower: f64,
        /// Upper bound
        upper: f64,
    },

    /// Numerical failure during inversion.
    #[error("Numerical instability: {message}")]
    NumericalInstability {
        /// Description of the numerical issue
        message: String,
    },
}

impl From<AnalyticalError> for SurfaceError {
    fn from(err: AnalyticalError) -> Self {
        match err {
            AnalyticalError::NumericalInstability { .. } => {
                SurfaceError::NumericalDegeneracy(err.to_string())
            }
            _ => SurfaceError::InvalidParameter(err.to_string()),
        }
    }
}
