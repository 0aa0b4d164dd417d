//! Delta-to-strike inversion.
//!
//! Solves `delta(K) - target = 0` with Brent's method over a bracket
//! proportional to spot, `[0.01·S, 3.0·S]` by default. A target the oracle
//! cannot reach inside the bracket is reported as
//! [`SurfaceError::StrikeNotFound`], never replaced by a fallback strike.

use std::cell::Cell;

use volsim_core::math::solvers::{BrentSolver, SolverConfig};
use volsim_core::traits::OptionOracle;
use volsim_core::types::{OptionType, SolverError, SurfaceError};

/// Default lower bracket bound as a multiple of spot.
pub const DEFAULT_LOWER_FACTOR: f64 = 0.01;

/// Default upper bracket bound as a multiple of spot.
pub const DEFAULT_UPPER_FACTOR: f64 = 3.0;

/// Inputs to one strike inversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrikeQuery {
    /// Call or put delta convention.
    pub option_type: OptionType,
    /// Underlying price.
    pub spot: f64,
    /// Delta to hit.
    pub target_delta: f64,
    /// Time to expiry in years.
    pub maturity: f64,
    /// Continuously compounded rate.
    pub rate: f64,
    /// Volatility passed to the delta oracle.
    pub volatility: f64,
}

impl StrikeQuery {
    /// Build a query.
    pub fn new(
        option_type: OptionType,
        spot: f64,
        target_delta: f64,
        maturity: f64,
        rate: f64,
        volatility: f64,
    ) -> Self {
        Self {
            option_type,
            spot,
            target_delta,
            maturity,
            rate,
            volatility,
        }
    }

    /// Reject inputs for which the inversion is undefined.
    pub fn validate(&self) -> Result<(), SurfaceError> {
        if !(self.spot > 0.0 && self.spot.is_finite()) {
            return Err(SurfaceError::invalid(format!(
                "spot must be positive, got {}",
                self.spot
            )));
        }
        if !(self.maturity > 0.0 && self.maturity.is_finite()) {
            return Err(SurfaceError::invalid(format!(
                "maturity must be positive, got {}",
                self.maturity
            )));
        }
        if !(self.volatility > 0.0 && self.volatility.is_finite()) {
            return Err(SurfaceError::invalid(format!(
                "volatility must be positive, got {}",
                self.volatility
            )));
        }
        if !self.target_delta.is_finite() {
            return Err(SurfaceError::invalid(format!(
                "target delta must be finite, got {}",
                self.target_delta
            )));
        }
        if !self.rate.is_finite() {
            return Err(SurfaceError::invalid(format!(
                "rate must be finite, got {}",
                self.rate
            )));
        }
        Ok(())
    }
}

/// Strike resolver over a delta oracle.
///
/// # Examples
///
/// ```
/// use volsim_core::traits::OptionOracle;
/// use volsim_core::types::OptionType;
/// use volsim_models::analytical::BlackScholesOracle;
/// use volsim_models::strike::{StrikeQuery, StrikeResolver};
///
/// let resolver = StrikeResolver::new(BlackScholesOracle::new());
/// let query = StrikeQuery::new(OptionType::Call, 100.0, 0.25, 0.5, 0.02, 0.2);
/// let strike = resolver.resolve(&query).unwrap();
///
/// let delta = resolver
///     .oracle()
///     .delta(OptionType::Call, 100.0, strike, 0.5, 0.02, 0.2)
///     .unwrap();
/// assert!((delta - 0.25).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct StrikeResolver<O> {
    oracle: O,
    lower_factor: f64,
    upper_factor: f64,
    solver: BrentSolver<f64>,
}

impl<O: OptionOracle> StrikeResolver<O> {
    /// Resolver with the default bracket and solver settings.
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            lower_factor: DEFAULT_LOWER_FACTOR,
            upper_factor: DEFAULT_UPPER_FACTOR,
            solver: BrentSolver::with_defaults(),
        }
    }

    /// Override the bracket `[lower·S, upper·S]`.
    ///
    /// # Errors
    /// `InvalidParameter` unless `0 < lower < upper` and both are finite.
    pub fn with_bracket(mut self, lower: f64, upper: f64) -> Result<Self, SurfaceError> {
        if !(lower > 0.0 && upper > lower && upper.is_finite()) {
            return Err(SurfaceError::invalid(format!(
                "strike bracket factors must satisfy 0 < lower < upper, got [{lower}, {upper}]"
            )));
        }
        self.lower_factor = lower;
        self.upper_factor = upper;
        Ok(self)
    }

    /// Override the Brent tolerance and iteration budget.
    pub fn with_solver_config(mut self, config: SolverConfig<f64>) -> Self {
        self.solver = BrentSolver::new(config);
        self
    }

    /// The wrapped oracle.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Bracket factors `(lower, upper)`.
    pub fn bracket(&self) -> (f64, f64) {
        (self.lower_factor, self.upper_factor)
    }

    /// Find the strike whose delta equals `query.target_delta`.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter`: invalid query
    /// - `StrikeNotFound`: no sign change over the bracket, or the
    ///   iteration budget ran out
    /// - any error raised by the oracle, unchanged
    /// - `NumericalDegeneracy`: the oracle returned a non-finite delta
    pub fn resolve(&self, query: &StrikeQuery) -> Result<f64, SurfaceError> {
        query.validate()?;

        let oracle_error: Cell<Option<SurfaceError>> = Cell::new(None);
        let objective = |strike: f64| {
            match self.oracle.delta(
                query.option_type,
                query.spot,
                strike,
                query.maturity,
                query.rate,
                query.volatility,
            ) {
                Ok(delta) => delta - query.target_delta,
                Err(err) => {
                    oracle_error.set(Some(err));
                    f64::NAN
                }
            }
        };

        let lower = self.lower_factor * query.spot;
        let upper = self.upper_factor * query.spot;

        match self.solver.find_root(objective, lower, upper) {
            Ok(strike) => Ok(strike),
            Err(err) => {
                if let Some(oracle_err) = oracle_error.take() {
                    return Err(oracle_err);
                }
                Err(match err {
                    SolverError::NoBracket { a, b } => SurfaceError::StrikeNotFound {
                        target_delta: query.target_delta,
                        reason: format!("delta does not cross the target on [{a}, {b}]"),
                    },
                    SolverError::NonFiniteValue { x } => SurfaceError::NumericalDegeneracy(
                        format!("oracle returned a non-finite delta at strike {x}"),
                    ),
                    other => SurfaceError::StrikeNotFound {
                        target_delta: query.target_delta,
                        reason: other.to_string(),
                    },
                })
            }
        }
    }
}

/// Resolve one strike against `oracle` with the default bracket.
pub fn resolve_strike<O>(oracle: &O, query: &StrikeQuery) -> Result<f64, SurfaceError>
where
    O: OptionOracle + ?Sized,
{
    StrikeResolver::new(oracle).resolve(query)
}
