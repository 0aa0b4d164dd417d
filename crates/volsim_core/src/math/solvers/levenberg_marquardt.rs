//! Levenberg-Marquardt nonlinear least-squares solver.
//!
//! # Algorithm
//!
//! ```text
//! (J^T J + λI) δ = -J^T r
//! p_{n+1} = P(p_n + δ)
//! ```
//!
//! where `J` is the forward-difference Jacobian of the residuals, `λ` the
//! damping factor and `P` an optional projection onto the admissible
//! parameter set (identity for [`LevenbergMarquardtSolver::solve`]).
//!
//! # Example
//!
//! ```
//! use volsim_core::math::solvers::{LevenbergMarquardtSolver, LMConfig};
//!
//! // Fit y = a * exp(-b * x), keeping b non-negative
//! let x_data = [0.0, 1.0, 2.0, 3.0, 4.0];
//! let y_data: Vec<f64> = x_data.iter().map(|x: &f64| 2.0 * (-0.5 * x).exp()).collect();
//!
//! let residuals = |p: &[f64]| -> Vec<f64> {
//!     x_data.iter().zip(&y_data).map(|(&x, &y)| p[0] * (-p[1] * x).exp() - y).collect()
//! };
//! let project = |p: &mut [f64]| p[1] = p[1].max(0.0);
//!
//! let solver = LevenbergMarquardtSolver::new(LMConfig::default());
//! let result = solver.solve_projected(residuals, vec![1.0, 1.0], project).unwrap();
//!
//! assert!(result.converged);
//! assert!((result.params[0] - 2.0).abs() < 1e-6);
//! ```

use crate::types::SolverError;

/// Configuration for the Levenberg-Marquardt solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LMConfig {
    /// Stop once the residual norm `sqrt(Σ r²)` falls below this.
    pub tolerance: f64,
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Initial damping factor.
    pub initial_lambda: f64,
    /// Factor to increase lambda on a rejected step.
    pub lambda_up: f64,
    /// Factor to decrease lambda on an accepted step.
    pub lambda_down: f64,
    /// Minimum damping factor.
    pub min_lambda: f64,
    /// Maximum damping factor.
    pub max_lambda: f64,
    /// Stop once the relative step size falls below this.
    pub param_tolerance: f64,
}

impl Default for LMConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 100,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            min_lambda: 1e-10,
            max_lambda: 1e10,
            param_tolerance: 1e-10,
        }
    }
}

impl LMConfig {
    /// Create a new LM configuration with default damping controls.
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
            ..Default::default()
        }
    }
}

/// Result of a Levenberg-Marquardt run.
#[derive(Debug, Clone, PartialEq)]
pub struct LMResult {
    /// Final parameters.
    pub params: Vec<f64>,
    /// Final residual sum of squares.
    pub residual_ss: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Whether a convergence criterion was met.
    pub converged: bool,
    /// Final lambda value.
    pub final_lambda: f64,
}

impl LMResult {
    /// Create a new LM result.
    pub fn new(
        params: Vec<f64>,
        residual_ss: f64,
        iterations: usize,
        converged: bool,
        final_lambda: f64,
    ) -> Self {
        Self {
            params,
            residual_ss,
            iterations,
            converged,
            final_lambda,
        }
    }

    /// Root mean square error over `n_observations` residuals.
    pub fn rmse(&self, n_observations: usize) -> f64 {
        if n_observations == 0 {
            return 0.0;
        }
        (self.residual_ss / n_observations as f64).sqrt()
    }
}

/// Levenberg-Marquardt nonlinear least-squares solver.
///
/// Solves `min_p ||r(p)||²` for a residual vector `r`. Trial steps that
/// produce non-finite residuals are rejected like any other non-improving
/// step.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardtSolver {
    config: LMConfig,
}

impl LevenbergMarquardtSolver {
    /// Create a new LM solver with the given configuration.
    pub fn new(config: LMConfig) -> Self {
        Self { config }
    }

    /// Create a solver with default configuration.
    pub fn with_defaults() -> Self {
        Self {
            config: LMConfig::default(),
        }
    }

    /// Get the solver configuration.
    pub fn config(&self) -> &LMConfig {
        &self.config
    }

    /// Solve an unconstrained least-squares problem.
    ///
    /// A non-converged run is returned as `Ok` with `converged == false`;
    /// callers decide whether that is an error.
    pub fn solve<F>(&self, residuals: F, initial_params: Vec<f64>) -> Result<LMResult, SolverError>
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        self.solve_projected(residuals, initial_params, |_: &mut [f64]| {})
    }

    /// Solve a least-squares problem, projecting every iterate with `project`.
    ///
    /// The initial guess is projected before the first residual evaluation.
    ///
    /// # Errors
    ///
    /// `SolverError::NumericalInstability` for empty parameter or residual
    /// vectors, or when the residuals at the initial guess are not finite.
    pub fn solve_projected<F, P>(
        &self,
        residuals: F,
        initial_params: Vec<f64>,
        project: P,
    ) -> Result<LMResult, SolverError>
    where
        F: Fn(&[f64]) -> Vec<f64>,
        P: Fn(&mut [f64]),
    {
        let n_params = initial_params.len();
        if n_params == 0 {
            return Err(SolverError::NumericalInstability(
                "Empty parameter vector".to_string(),
            ));
        }

        let mut params = initial_params;
        project(&mut params);
        let mut lambda = self.config.initial_lambda;

        let mut r = residuals(&params);
        if r.is_empty() {
            return Err(SolverError::NumericalInstability(
                "Empty residual vector".to_string(),
            ));
        }

        let mut ss = sum_of_squares(&r);
        if !ss.is_finite() {
            return Err(SolverError::NumericalInstability(
                "Non-finite residuals at initial guess".to_string(),
            ));
        }

        for iteration in 0..self.config.max_iterations {
            if ss.sqrt() < self.config.tolerance {
                return Ok(LMResult::new(params, ss, iteration, true, lambda));
            }

            let jacobian = compute_jacobian(&residuals, &params, &r);

            let delta = match solve_normal_equations(&jacobian, &r, lambda, n_params) {
                Some(d) => d,
                None => {
                    lambda = (lambda * self.config.lambda_up).min(self.config.max_lambda);
                    continue;
                }
            };

            let param_change = delta.iter().map(|d| d * d).sum::<f64>().sqrt();
            let param_norm = params.iter().map(|p| p * p).sum::<f64>().sqrt().max(1.0);
            if param_change / param_norm < self.config.param_tolerance {
                return Ok(LMResult::new(params, ss, iteration, true, lambda));
            }

            let mut trial: Vec<f64> = params.iter().zip(&delta).map(|(p, d)| p + d).collect();
            project(&mut trial);
            let trial_r = residuals(&trial);
            let trial_ss = sum_of_squares(&trial_r);

            if trial_ss.is_finite() && trial_ss < ss {
                params = trial;
                r = trial_r;
                ss = trial_ss;
                lambda = (lambda * self.config.lambda_down).max(self.config.min_lambda);
            } else {
                lambda = (lambda * self.config.lambda_up).min(self.config.max_lambda);
            }
        }

        Ok(LMResult::new(
            params,
            ss,
            self.config.max_iterations,
            false,
            lambda,
        ))
    }
}

/// Solve the normal equations (J^T J + λI) δ = -J^T r.
fn solve_normal_equations(
    jacobian: &[Vec<f64>],
    residuals: &[f64],
    lambda: f64,
    n_params: usize,
) -> Option<Vec<f64>> {
    let mut jtj = vec![vec![0.0; n_params]; n_params];
    for (i, row) in jtj.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = jacobian.iter().map(|jk| jk[i] * jk[j]).sum();
        }
    }
    for (i, row) in jtj.iter_mut().enumerate() {
        row[i] += lambda;
    }

    let jtr: Vec<f64> = (0..n_params)
        .map(|i| {
            -jacobian
                .iter()
                .zip(residuals)
                .map(|(jk, rk)| jk[i] * rk)
                .sum::<f64>()
        })
        .collect();

    solve_cholesky(&jtj, &jtr)
}

/// Forward-difference Jacobian, one row per residual.
fn compute_jacobian<F>(residuals: &F, params: &[f64], r0: &[f64]) -> Vec<Vec<f64>>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n_params = params.len();
    let eps = 1e-8;

    let mut jacobian = vec![vec![0.0; n_params]; r0.len()];

    for j in 0..n_params {
        let h = eps * params[j].abs().max(1.0);

        let mut bumped = params.to_vec();
        bumped[j] += h;
        let r_plus = residuals(&bumped);

        for (row, (rp, r)) in jacobian.iter_mut().zip(r_plus.iter().zip(r0)) {
            let g = (rp - r) / h;
            row[j] = if g.is_finite() { g } else { 0.0 };
        }
    }

    jacobian
}

#[inline]
fn sum_of_squares(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

/// Solve Ax = b for symmetric positive definite A via Cholesky.
fn solve_cholesky(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 || a.len() != n {
        return None;
    }

    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // L y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    // L^T x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_config_defaults() {
        let default = LMConfig::default();
        assert_eq!(default.max_iterations, 100);
        assert!(default.min_lambda < default.initial_lambda);

        let custom = LMConfig::new(1e-8, 40);
        assert_eq!(custom.max_iterations, 40);
        assert_eq!(custom.lambda_up, default.lambda_up);
    }

    #[test]
    fn test_result_rmse() {
        let result = LMResult::new(vec![1.0], 4.0, 10, true, 1e-3);
        assert_relative_eq!(result.rmse(4), 1.0);
        assert_eq!(result.rmse(0), 0.0);
    }

    #[test]
    fn test_solve_simple_linear() {
        let residuals = |p: &[f64]| -> Vec<f64> { vec![p[0] - 2.0, p[1] - 3.0] };

        let result = LevenbergMarquardtSolver::with_defaults()
            .solve(residuals, vec![0.0, 0.0])
            .unwrap();

        assert!(result.converged);
        assert!((result.params[0] - 2.0).abs() < 1e-6);
        assert!((result.params[1] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_solve_exponential_fit() {
        let x_data = [0.0_f64, 1.0, 2.0];
        let y_data: Vec<f64> = x_data.iter().map(|x| (-x).exp()).collect();

        let residuals = |p: &[f64]| -> Vec<f64> {
            x_data
                .iter()
                .zip(&y_data)
                .map(|(x, y)| p[0] * (-x).exp() - y)
                .collect()
        };

        let result = LevenbergMarquardtSolver::with_defaults()
            .solve(residuals, vec![0.5])
            .unwrap();

        assert!(result.converged);
        assert!((result.params[0] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_solve_already_optimal() {
        let residuals = |p: &[f64]| -> Vec<f64> { vec![p[0] - 5.0] };
        let result = LevenbergMarquardtSolver::with_defaults()
            .solve(residuals, vec![5.0])
            .unwrap();

        assert!(result.converged);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_projection_holds_bound() {
        // Unconstrained optimum at p = -1; the projection pins p at 0
        let residuals = |p: &[f64]| -> Vec<f64> { vec![p[0] + 1.0] };
        let project = |p: &mut [f64]| p[0] = p[0].max(0.0);

        let result = LevenbergMarquardtSolver::with_defaults()
            .solve_projected(residuals, vec![3.0], project)
            .unwrap();

        assert_eq!(result.params[0], 0.0);
        assert_relative_eq!(result.residual_ss, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_initial_guess_is_projected() {
        let seen = std::cell::Cell::new(f64::NAN);
        let residuals = |p: &[f64]| -> Vec<f64> {
            if seen.get().is_nan() {
                seen.set(p[0]);
            }
            vec![p[0] - 0.5]
        };
        let project = |p: &mut [f64]| p[0] = p[0].clamp(-0.9, 0.9);

        LevenbergMarquardtSolver::with_defaults()
            .solve_projected(residuals, vec![5.0], project)
            .unwrap();

        assert_eq!(seen.get(), 0.9);
    }

    #[test]
    fn test_non_finite_trial_is_rejected() {
        // sqrt is undefined below zero; a full Gauss-Newton step would overshoot there
        let residuals = |p: &[f64]| -> Vec<f64> { vec![p[0].sqrt() - 0.1, 0.1 * (p[0] - 0.01)] };

        let result = LevenbergMarquardtSolver::with_defaults()
            .solve(residuals, vec![4.0])
            .unwrap();

        assert!(result.residual_ss.is_finite());
        assert!((result.params[0] - 0.01).abs() < 1e-4);
    }

    #[test]
    fn test_not_converged_is_reported() {
        let config = LMConfig {
            max_iterations: 2,
            ..Default::default()
        };
        let residuals = |p: &[f64]| -> Vec<f64> {
            vec![10.0 * (p[1] - p[0] * p[0]), 1.0 - p[0]]
        };

        let result = LevenbergMarquardtSolver::new(config)
            .solve(residuals, vec![-1.2, 1.0])
            .unwrap();

        assert!(!result.converged);
        assert_eq!(result.iterations, 2);
    }

    #[test]
    fn test_empty_inputs_are_errors() {
        let solver = LevenbergMarquardtSolver::with_defaults();
        assert!(solver.solve(|_: &[f64]| vec![1.0], vec![]).is_err());
        assert!(solver.solve(|_: &[f64]| Vec::new(), vec![1.0]).is_err());
        assert!(solver.solve(|_: &[f64]| vec![f64::NAN], vec![1.0]).is_err());
    }

    #[test]
    fn test_cholesky_simple() {
        let a = vec![vec![4.0, 2.0], vec![2.0, 2.0]];
        let x = solve_cholesky(&a, &[8.0, 5.0]).unwrap();
        assert_relative_eq!(x[0], 1.5, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cholesky_not_positive_definite() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 1.0]];
        assert!(solve_cholesky(&a, &[1.0, 1.0]).is_none());
    }

    #[test]
    fn test_jacobian_linear() {
        let residuals = |p: &[f64]| -> Vec<f64> { vec![2.0 * p[0] + 3.0 * p[1], p[0] - p[1]] };
        let params = [1.0, 2.0];
        let r0 = residuals(&params);
        let jac = compute_jacobian(&residuals, &params, &r0);

        assert_relative_eq!(jac[0][0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(jac[0][1], 3.0, epsilon = 1e-6);
        assert_relative_eq!(jac[1][0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(jac[1][1], -1.0, epsilon = 1e-6);
    }
}
