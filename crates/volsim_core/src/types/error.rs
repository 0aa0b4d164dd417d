//! Error types for solvers, calibration and surface construction.
//!
//! This module provides:
//! - `SolverError`: Errors from root-finding and least-squares solvers
//! - `CalibrationError`: Errors from smile calibration, with diagnostics
//! - `SurfaceError`: The taxonomy every public operation returns
//! - `ParseOptionTypeError`: Unrecognised option-type spelling

use std::fmt;
use thiserror::Error;

/// Solver errors.
///
/// # Examples
/// ```
/// use volsim_core::types::SolverError;
///
/// let err = SolverError::MaxIterationsExceeded { iterations: 100 };
/// assert!(format!("{}", err).contains("100 iterations"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverError {
    /// Solver failed to converge within maximum iterations.
    #[error("Failed to converge after {iterations} iterations")]
    MaxIterationsExceeded {
        /// Number of iterations attempted
        iterations: usize,
    },

    /// No valid bracket (function values at endpoints have same sign).
    #[error("No bracket: f({a}) and f({b}) have same sign")]
    NoBracket {
        /// Left bracket endpoint
        a: f64,
        /// Right bracket endpoint
        b: f64,
    },

    /// Objective returned NaN or infinity.
    #[error("Non-finite function value at x = {x}")]
    NonFiniteValue {
        /// Argument at which the objective was evaluated
        x: f64,
    },

    /// Numerical instability during computation.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),
}

/// Why a smile fit failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CalibrationErrorKind {
    /// The iteration budget ran out before the residual or the step became
    /// small enough.
    #[error("did not converge")]
    NotConverged,

    /// The least-squares solver itself failed.
    #[error("solver failure: {0}")]
    Solver(String),
}

/// Smile calibration failure with the solver's final state.
///
/// # Examples
/// ```
/// use volsim_core::types::CalibrationError;
///
/// let err = CalibrationError::not_converged(100, 0.01).with_parameters(vec![0.2, -0.3, 0.5]);
/// assert!(err.is_not_converged());
/// assert_eq!(err.iterations, 100);
/// assert!(err.to_string().contains("after 100 iterations"));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationError {
    /// Failure kind
    pub kind: CalibrationErrorKind,
    /// Iterations performed
    pub iterations: usize,
    /// Final residual sum of squares, NaN when unknown
    pub residual_ss: f64,
    /// Last parameter vector, when the solver produced one
    pub params: Option<Vec<f64>>,
}

impl CalibrationError {
    /// Error of `kind` with no solver state attached.
    pub fn new(kind: CalibrationErrorKind) -> Self {
        Self {
            kind,
            iterations: 0,
            residual_ss: f64::NAN,
            params: None,
        }
    }

    /// Iteration budget exhausted.
    pub fn not_converged(iterations: usize, residual_ss: f64) -> Self {
        Self {
            iterations,
            residual_ss,
            ..Self::new(CalibrationErrorKind::NotConverged)
        }
    }

    /// Attach the last parameter vector.
    pub fn with_parameters(mut self, params: Vec<f64>) -> Self {
        self.params = Some(params);
        self
    }

    /// Root mean square residual over `n_quotes`; NaN when unknown.
    pub fn rmse(&self, n_quotes: usize) -> f64 {
        if n_quotes == 0 {
            return f64::NAN;
        }
        (self.residual_ss / n_quotes as f64).sqrt()
    }

    /// `true` for [`CalibrationErrorKind::NotConverged`].
    pub fn is_not_converged(&self) -> bool {
        self.kind == CalibrationErrorKind::NotConverged
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Smile calibration failed: {}", self.kind)?;
        if self.iterations > 0 {
            write!(f, " after {} iterations", self.iterations)?;
        }
        if self.residual_ss.is_finite() {
            write!(f, ", residual_ss = {:.3e}", self.residual_ss)?;
        }
        Ok(())
    }
}

impl std::error::Error for CalibrationError {}

impl From<SolverError> for CalibrationError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::MaxIterationsExceeded { iterations } => {
                CalibrationError::not_converged(iterations, f64::NAN)
            }
            other => CalibrationError::new(CalibrationErrorKind::Solver(other.to_string())),
        }
    }
}

/// Unrecognised option-type spelling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown option type '{0}': expected one of c, call, p, put")]
pub struct ParseOptionTypeError(pub String);

/// Error taxonomy for path simulation, strike resolution, smile calibration
/// and surface assembly.
///
/// Component errors from the model and engine layers convert into it with
/// `?`. Assembler aborts wrap the failing cell's error in
/// [`SurfaceError::Cell`] so the coordinates survive.
///
/// # Examples
/// ```
/// use volsim_core::types::SurfaceError;
///
/// let err = SurfaceError::StrikeNotFound {
///     target_delta: 0.3,
///     reason: "no sign change".to_string(),
/// }
/// .in_cell(2, 10, 0, 1);
///
/// assert!(err.to_string().contains("path 2"));
/// assert!(err.root_cause().is_strike_not_found());
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    /// A caller-supplied value is outside its domain.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Delta-to-strike inversion could not produce a strike.
    #[error("Strike not found for target delta {target_delta}: {reason}")]
    StrikeNotFound {
        /// Delta the inversion was solving for
        target_delta: f64,
        /// Why the solver gave up
        reason: String,
    },

    /// Smile fitting failed.
    #[error(transparent)]
    CalibrationFailure(#[from] CalibrationError),

    /// Closed-form evaluation hit an undefined region.
    #[error("Numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    /// A surface cell failed under the abort policy.
    #[error("Cell (path {path}, step {step}, maturity {maturity}, delta {delta}) failed: {source}")]
    Cell {
        /// Path index
        path: usize,
        /// Time-step index
        step: usize,
        /// Maturity grid index
        maturity: usize,
        /// Delta grid index
        delta: usize,
        /// Underlying failure
        #[source]
        source: Box<SurfaceError>,
    },

    /// Engine configuration could not be read, parsed or overridden.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SurfaceError {
    /// Shorthand for [`SurfaceError::InvalidParameter`].
    pub fn invalid(message: impl Into<String>) -> Self {
        SurfaceError::InvalidParameter(message.into())
    }

    /// Attach grid coordinates to this error.
    pub fn in_cell(self, path: usize, step: usize, maturity: usize, delta: usize) -> Self {
        SurfaceError::Cell {
            path,
            step,
            maturity,
            delta,
            source: Box::new(self),
        }
    }

    /// The innermost error, unwrapping any [`SurfaceError::Cell`] layers.
    pub fn root_cause(&self) -> &SurfaceError {
        match self {
            SurfaceError::Cell { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Check for [`SurfaceError::InvalidParameter`].
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, SurfaceError::InvalidParameter(_))
    }

    /// Check for [`SurfaceError::StrikeNotFound`].
    pub fn is_strike_not_found(&self) -> bool {
        matches!(self, SurfaceError::StrikeNotFound { .. })
    }

    /// Check for [`SurfaceError::CalibrationFailure`].
    pub fn is_calibration_failure(&self) -> bool {
        matches!(self, SurfaceError::CalibrationFailure(_))
    }

    /// Check for [`SurfaceError::NumericalDegeneracy`].
    pub fn is_numerical_degeneracy(&self) -> bool {
        matches!(self, SurfaceError::NumericalDegeneracy(_))
    }
}
