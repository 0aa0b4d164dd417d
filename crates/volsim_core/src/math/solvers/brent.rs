//! Brent's method root-finding solver.

use super::SolverConfig;
use crate::types::SolverError;
use num_traits::Float;

/// Brent's method root finder.
///
/// Combines bisection, the secant step and inverse quadratic interpolation.
/// The iterate never leaves the current bracket, so `f` is only evaluated
/// inside `[a, b]`. That matters for callers such as strike inversion where
/// `f` is undefined for non-positive arguments.
///
/// # Example
///
/// ```
/// use volsim_core::math::solvers::{BrentSolver, SolverConfig};
///
/// let solver = BrentSolver::new(SolverConfig::default());
///
/// // Solve x³ - x - 2 = 0 in bracket [1, 2]
/// let f = |x: f64| x * x * x - x - 2.0;
///
/// let root = solver.find_root(f, 1.0, 2.0).unwrap();
/// assert!(f(root).abs() < 1e-10);
/// ```
#[derive(Debug, Clone)]
pub struct BrentSolver<T: Float> {
    config: SolverConfig<T>,
}

impl<T: Float> BrentSolver<T> {
    /// Create a new Brent solver with the given configuration.
    pub fn new(config: SolverConfig<T>) -> Self {
        Self { config }
    }

    /// Create a solver with default configuration.
    pub fn with_defaults() -> Self {
        Self {
            config: SolverConfig::default(),
        }
    }

    /// Find a root of `f` in the bracket `[a, b]`.
    ///
    /// # Returns
    ///
    /// * `Ok(x)` - Root where `|f(x)| < tolerance` or the bracket has collapsed
    /// * `Err(SolverError::NoBracket)` - `f(a)` and `f(b)` have the same sign
    /// * `Err(SolverError::NonFiniteValue)` - `f` returned NaN or infinity
    /// * `Err(SolverError::MaxIterationsExceeded)` - Failed to converge
    pub fn find_root<F>(&self, f: F, a: T, b: T) -> Result<T, SolverError>
    where
        F: Fn(T) -> T,
    {
        let two = T::from(2.0).unwrap();
        let three = T::from(3.0).unwrap();
        let half = T::from(0.5).unwrap();
        let eps = T::epsilon();

        let mut a = a;
        let mut b = b;
        let mut fa = checked(a, f(a))?;
        let mut fb = checked(b, f(b))?;

        if fa == T::zero() {
            return Ok(a);
        }
        if fb == T::zero() {
            return Ok(b);
        }
        if fa.signum() == fb.signum() {
            return Err(SolverError::NoBracket {
                a: to_f64(a),
                b: to_f64(b),
            });
        }

        let mut c = b;
        let mut fc = fb;
        let mut d = b - a;
        let mut e = d;

        for _ in 0..self.config.max_iterations {
            // Re-establish the bracket [b, c]
            if fb.signum() == fc.signum() {
                c = a;
                fc = fa;
                d = b - a;
                e = d;
            }
            // b is always the best estimate
            if fc.abs() < fb.abs() {
                a = b;
                b = c;
                c = a;
                fa = fb;
                fb = fc;
                fc = fa;
            }

            let tol = two * eps * b.abs() + half * self.config.tolerance;
            let m = half * (c - b);

            if m.abs() <= tol || fb.abs() < self.config.tolerance {
                return Ok(b);
            }

            if e.abs() >= tol && fa.abs() > fb.abs() {
                let s = fb / fa;
                let (mut p, mut q) = if a == c {
                    // Secant
                    (two * m * s, T::one() - s)
                } else {
                    // Inverse quadratic interpolation
                    let q = fa / fc;
                    let r = fb / fc;
                    (
                        s * (two * m * q * (q - r) - (b - a) * (r - T::one())),
                        (q - T::one()) * (r - T::one()) * (s - T::one()),
                    )
                };
                if p > T::zero() {
                    q = -q;
                }
                p = p.abs();

                let limit = (three * m * q - (tol * q).abs()).min((e * q).abs());
                if two * p < limit {
                    e = d;
                    d = p / q;
                } else {
                    d = m;
                    e = d;
                }
            } else {
                d = m;
                e = d;
            }

            a = b;
            fa = fb;
            b = if d.abs() > tol {
                b + d
            } else if m > T::zero() {
                b + tol
            } else {
                b - tol
            };
            fb = checked(b, f(b))?;
        }

        Err(SolverError::MaxIterationsExceeded {
            iterations: self.config.max_iterations,
        })
    }

    /// Returns a reference to the solver configuration.
    pub fn config(&self) -> &SolverConfig<T> {
        &self.config
    }
}

#[inline]
fn to_f64<T: Float>(x: T) -> f64 {
    x.to_f64().unwrap_or(f64::NAN)
}

#[inline]
fn checked<T: Float>(x: T, fx: T) -> Result<T, SolverError> {
    if fx.is_finite() {
        Ok(fx)
    } else {
        Err(SolverError::NonFiniteValue { x: to_f64(x) })
    }
}
