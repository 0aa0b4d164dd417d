//! Smile calibration.
//!
//! SABR parameters per maturity, either anchored at the money from a
//! volatility level or fitted to strike/vol quotes by least squares.

pub mod sabr;

pub use sabr::{calibrate_smile, SabrFit, SmileCalibrator, SmilePoint, SmileShape, MAX_ABS_RHO, MIN_ALPHA};
