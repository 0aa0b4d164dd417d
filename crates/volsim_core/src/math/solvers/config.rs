//! Solver configuration types.

use num_traits::Float;

/// Configuration for bracketing root finders.
///
/// # Example
///
/// ```
/// use volsim_core::math::solvers::SolverConfig;
///
/// let config: SolverConfig<f64> = SolverConfig::default();
/// assert!(config.tolerance < 1e-8);
/// assert_eq!(config.max_iterations, 100);
///
/// let strict = SolverConfig::new(1e-12, 200);
/// assert_eq!(strict.max_iterations, 200);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig<T: Float> {
    /// Convergence tolerance.
    ///
    /// The solver stops when `|f(x)| < tolerance` or the bracket half-width
    /// falls below it.
    pub tolerance: T,

    /// Maximum number of iterations before giving up with
    /// `SolverError::MaxIterationsExceeded`.
    pub max_iterations: usize,
}

impl<T: Float> Default for SolverConfig<T> {
    /// Default values: `tolerance` 1e-10, `max_iterations` 100.
    fn default() -> Self {
        Self {
            tolerance: T::from(1e-10).unwrap(),
            max_iterations: 100,
        }
    }
}

impl<T: Float> SolverConfig<T> {
    /// Create a new configuration with specified values.
    ///
    /// # Panics
    ///
    /// Panics if `tolerance <= 0` or `max_iterations == 0`.
    pub fn new(tolerance: T, max_iterations: usize) -> Self {
        assert!(tolerance > T::zero(), "tolerance must be positive");
        assert!(max_iterations > 0, "max_iterations must be > 0");
        Self {
            tolerance,
            max_iterations,
        }
    }
}
