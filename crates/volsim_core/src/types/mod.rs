//! Shared value and error types.
//!
//! - `option_type`: The closed [`OptionType`] enumeration
//! - `error`: Solver, calibration and surface error taxonomy
//!
//! # Re-exports
//!
//! - [`OptionType`] from `option_type`
//! - [`SurfaceError`], [`SolverError`], [`CalibrationError`],
//!   [`CalibrationErrorKind`], [`ParseOptionTypeError`] from `error`

pub mod error;
pub mod option_type;

pub use error::{
    CalibrationError, CalibrationErrorKind, ParseOptionTypeError, SolverError, SurfaceError,
};
pub use option_type::OptionType;
