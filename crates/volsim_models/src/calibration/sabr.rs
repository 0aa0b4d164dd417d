//! SABR smile calibration.
//!
//! ## Calibration Modes
//!
//! - **ATM-anchored**: no quotes. Alpha is solved in closed form from the
//!   volatility anchor (`alpha = anchor · F^(1-β)`) and rho, nu come from a
//!   configured [`SmileShape`].
//! - **Fitted**: strike/vol quotes for one maturity with beta fixed. Alpha,
//!   rho and nu are found by Levenberg-Marquardt, starting from the anchored
//!   alpha and the shape's rho and nu. With fewer than three quotes only
//!   alpha is fitted.
//!
//! Every result carries the maturity and forward it was produced for, so a
//! fit can never be applied to a different expiry or forward level by
//! accident.
//!
//! ## Parameter Constraints
//!
//! Iterates are projected onto the admissible set after every LM step:
//! - alpha ≥ 1e-8
//! - |rho| ≤ 0.999
//! - nu ≥ 0

use volsim_core::math::solvers::{LMConfig, LevenbergMarquardtSolver};
use volsim_core::types::{CalibrationError, SurfaceError};

use crate::models::sabr::{SabrExpansion, SabrParams};

/// Lower bound on alpha during fitting.
pub const MIN_ALPHA: f64 = 1e-8;

/// Bound on |rho| during fitting.
pub const MAX_ABS_RHO: f64 = 0.999;

/// Fixed beta and default (rho, nu) of a smile.
///
/// The default (beta 0.5, rho -0.5, nu 0.4) is a typical equity skew.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SmileShape {
    /// CEV exponent, held fixed.
    pub beta: f64,
    /// Spot/vol correlation used when not fitted.
    pub rho: f64,
    /// Vol-of-vol used when not fitted.
    pub nu: f64,
}

impl Default for SmileShape {
    fn default() -> Self {
        Self {
            beta: 0.5,
            rho: -0.5,
            nu: 0.4,
        }
    }
}

impl SmileShape {
    /// Check the shape against SABR domain limits.
    pub fn validate(&self) -> Result<(), SurfaceError> {
        if !(0.0..=1.0).contains(&self.beta) {
            return Err(SurfaceError::invalid(format!(
                "beta must be in [0, 1], got {}",
                self.beta
            )));
        }
        if !(-1.0..=1.0).contains(&self.rho) {
            return Err(SurfaceError::invalid(format!(
                "rho must be in [-1, 1], got {}",
                self.rho
            )));
        }
        if !(self.nu >= 0.0 && self.nu.is_finite()) {
            return Err(SurfaceError::invalid(format!(
                "nu must be non-negative, got {}",
                self.nu
            )));
        }
        Ok(())
    }
}

/// A single strike/volatility observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmilePoint {
    /// Strike.
    pub strike: f64,
    /// Target implied volatility.
    pub implied_vol: f64,
    /// Residual weight.
    pub weight: f64,
}

impl SmilePoint {
    /// Create a unit-weight point.
    pub fn new(strike: f64, implied_vol: f64) -> Self {
        Self {
            strike,
            implied_vol,
            weight: 1.0,
        }
    }

    /// Set the weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Outcome of a least-squares smile fit.
#[derive(Debug, Clone, PartialEq)]
pub struct SabrFit {
    /// Fitted parameters for the fit's maturity and forward.
    pub params: SabrParams,
    /// Final residual sum of squares.
    pub residual_ss: f64,
    /// LM iterations used.
    pub iterations: usize,
    /// Root mean square vol error across the quotes.
    pub rmse: f64,
}

/// SABR smile calibrator with a fixed beta.
///
/// # Examples
///
/// ```
/// use volsim_models::calibration::{SmileCalibrator, SmileShape};
///
/// let calibrator = SmileCalibrator::new(SmileShape::default());
/// let params = calibrator.atm_anchored(1.0 / 252.0, 100.0, 0.20).unwrap();
///
/// assert!((params.alpha() / 100.0_f64.sqrt() - 0.20).abs() < 1e-12);
/// assert_eq!(params.forward(), 100.0);
/// ```
#[derive(Debug, Clone)]
pub struct SmileCalibrator {
    shape: SmileShape,
    expansion: SabrExpansion,
    solver: LevenbergMarquardtSolver,
}

impl Default for SmileCalibrator {
    fn default() -> Self {
        Self::new(SmileShape::default())
    }
}

impl SmileCalibrator {
    /// Create a calibrator with the leading-order smile and default LM settings.
    pub fn new(shape: SmileShape) -> Self {
        Self {
            shape,
            expansion: SabrExpansion::LeadingOrder,
            solver: LevenbergMarquardtSolver::new(LMConfig {
                max_iterations: 200,
                ..LMConfig::default()
            }),
        }
    }

    /// Use a different smile expansion for both fitting and evaluation.
    pub fn with_expansion(mut self, expansion: SabrExpansion) -> Self {
        self.expansion = expansion;
        self
    }

    /// Use a different LM configuration.
    pub fn with_lm_config(mut self, config: LMConfig) -> Self {
        self.solver = LevenbergMarquardtSolver::new(config);
        self
    }

    /// The configured smile shape.
    pub fn shape(&self) -> &SmileShape {
        &self.shape
    }

    /// The configured expansion.
    pub fn expansion(&self) -> SabrExpansion {
        self.expansion
    }

    /// LM settings used by [`fit`](Self::fit).
    pub fn lm_config(&self) -> &LMConfig {
        self.solver.config()
    }

    /// Implied volatility of `params` at `strike` under this calibrator's
    /// expansion.
    pub fn implied_vol(&self, params: &SabrParams, strike: f64) -> Result<f64, SurfaceError> {
        Ok(params.implied_vol_with(strike, self.expansion)?)
    }

    /// Closed-form parameters matching `anchor_vol` at the money.
    ///
    /// Under the Hagan expansion the anchored alpha is the leading-order
    /// value, so the ATM vol matches the anchor only up to the time
    /// correction.
    pub fn atm_anchored(
        &self,
        maturity: f64,
        forward: f64,
        anchor_vol: f64,
    ) -> Result<SabrParams, SurfaceError> {
        validate_inputs(maturity, forward, anchor_vol)?;
        self.shape.validate()?;

        let alpha = anchor_vol * forward.powf(1.0 - self.shape.beta);
        Ok(SabrParams::new(
            alpha,
            self.shape.beta,
            self.shape.rho,
            self.shape.nu,
            maturity,
            forward,
        )?)
    }

    /// Fit (alpha, rho, nu) to `points` at one maturity and forward.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter`: empty quotes, non-positive strikes or vols,
    ///   invalid maturity, forward or anchor
    /// - `CalibrationFailure`: LM did not converge
    pub fn fit(
        &self,
        maturity: f64,
        forward: f64,
        anchor_vol: f64,
        points: &[SmilePoint],
    ) -> Result<SabrFit, SurfaceError> {
        validate_inputs(maturity, forward, anchor_vol)?;
        self.shape.validate()?;
        validate_points(points)?;

        let beta = self.shape.beta;
        let alpha0 = anchor_vol * forward.powf(1.0 - beta);
        let fit_shape = points.len() >= 3;
        let expansion = self.expansion;
        let shape = self.shape;

        let unpack = move |p: &[f64]| -> (f64, f64, f64) {
            if fit_shape {
                (p[0], p[1], p[2])
            } else {
                (p[0], shape.rho, shape.nu)
            }
        };

        let residuals = |p: &[f64]| -> Vec<f64> {
            let (alpha, rho, nu) = unpack(p);
            match SabrParams::new(alpha, beta, rho, nu, maturity, forward) {
                Ok(params) => points
                    .iter()
                    .map(|q| match params.implied_vol_with(q.strike, expansion) {
                        Ok(vol) => q.weight * (vol - q.implied_vol),
                        Err(_) => f64::NAN,
                    })
                    .collect(),
                Err(_) => vec![f64::NAN; points.len()],
            }
        };

        let project = |p: &mut [f64]| {
            p[0] = p[0].max(MIN_ALPHA);
            if p.len() == 3 {
                p[1] = p[1].clamp(-MAX_ABS_RHO, MAX_ABS_RHO);
                p[2] = p[2].max(0.0);
            }
        };

        let initial = if fit_shape {
            vec![alpha0, shape.rho, shape.nu]
        } else {
            vec![alpha0]
        };

        let result = self
            .solver
            .solve_projected(residuals, initial, project)
            .map_err(CalibrationError::from)?;

        if !result.converged {
            return Err(CalibrationError::not_converged(result.iterations, result.residual_ss)
                .with_parameters(result.params)
                .into());
        }

        let (alpha, rho, nu) = unpack(&result.params);
        let params = SabrParams::new(alpha, beta, rho, nu, maturity, forward)?;

        Ok(SabrFit {
            rmse: result.rmse(points.len()),
            params,
            residual_ss: result.residual_ss,
            iterations: result.iterations,
        })
    }

    /// Anchored parameters when `points` is empty, fitted parameters otherwise.
    pub fn calibrate(
        &self,
        maturity: f64,
        forward: f64,
        anchor_vol: f64,
        points: &[SmilePoint],
    ) -> Result<SabrParams, SurfaceError> {
        if points.is_empty() {
            self.atm_anchored(maturity, forward, anchor_vol)
        } else {
            Ok(self.fit(maturity, forward, anchor_vol, points)?.params)
        }
    }
}

/// Calibrate a leading-order SABR smile with fixed `beta`.
///
/// With no quotes the smile is anchored at the money with the default shape;
/// with quotes, `strikes` and `target_vols` must have equal, non-zero length.
///
/// # Examples
///
/// ```
/// use volsim_models::calibration::calibrate_smile;
///
/// let params = calibrate_smile(1.0 / 252.0, 100.0, 0.25, Some(&[100.0]), Some(&[0.20]), 0.5)
///     .unwrap();
/// assert!((params.alpha() / 10.0 - 0.20).abs() < 1e-8);
///
/// assert!(calibrate_smile(1.0, 100.0, 0.2, Some(&[100.0]), None, 0.5).is_err());
/// ```
pub fn calibrate_smile(
    maturity: f64,
    forward: f64,
    anchor_vol: f64,
    strikes: Option<&[f64]>,
    target_vols: Option<&[f64]>,
    beta: f64,
) -> Result<SabrParams, SurfaceError> {
    let calibrator = SmileCalibrator::new(SmileShape {
        beta,
        ..SmileShape::default()
    });

    match (strikes, target_vols) {
        (None, None) => calibrator.atm_anchored(maturity, forward, anchor_vol),
        (Some(strikes), Some(vols)) => {
            if strikes.len() != vols.len() {
                return Err(SurfaceError::invalid(format!(
                    "{} strikes but {} target vols",
                    strikes.len(),
                    vols.len()
                )));
            }
            let points: Vec<SmilePoint> = strikes
                .iter()
                .zip(vols)
                .map(|(&k, &v)| SmilePoint::new(k, v))
                .collect();
            Ok(calibrator.fit(maturity, forward, anchor_vol, &points)?.params)
        }
        _ => Err(SurfaceError::invalid(
            "strikes and target vols must be given together",
        )),
    }
}

fn validate_inputs(maturity: f64, forward: f64, anchor_vol: f64) -> Result<(), SurfaceError> {
    if !(maturity > 0.0 && maturity.is_finite()) {
        return Err(SurfaceError::invalid(format!(
            "maturity must be positive, got {maturity}"
        )));
    }
    if !(forward > 0.0 && forward.is_finite()) {
        return Err(SurfaceError::invalid(format!(
            "forward must be positive, got {forward}"
        )));
    }
    if !(anchor_vol > 0.0 && anchor_vol.is_finite()) {
        return Err(SurfaceError::invalid(format!(
            "anchor volatility must be positive, got {anchor_vol}"
        )));
    }
    Ok(())
}

fn validate_points(points: &[SmilePoint]) -> Result<(), SurfaceError> {
    if points.is_empty() {
        return Err(SurfaceError::invalid("no smile quotes to fit"));
    }
    for (i, point) in points.iter().enumerate() {
        if !(point.strike > 0.0 && point.strike.is_finite()) {
            return Err(SurfaceError::invalid(format!(
                "smile point {i}: strike must be positive, got {}",
                point.strike
            )));
        }
        if !(point.implied_vol > 0.0 && point.implied_vol.is_finite()) {
            return Err(SurfaceError::invalid(format!(
                "smile point {i}: vol must be positive, got {}",
                point.implied_vol
            )));
        }
        if !(point.weight > 0.0 && point.weight.is_finite()) {
            return Err(SurfaceError::invalid(format!(
                "smile point {i}: weight must be positive, got {}",
                point.weight
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn synthetic_points(truth: &SabrParams, strikes: &[f64]) -> Vec<SmilePoint> {
        strikes
            .iter()
            .map(|&k| SmilePoint::new(k, truth.implied_vol(k).unwrap()))
            .collect()
    }

    #[test]
    fn test_atm_anchored_reproduces_anchor() {
        let calibrator = SmileCalibrator::default();
        let params = calibrator.atm_anchored(0.25, 120.0, 0.3).unwrap();

        assert_relative_eq!(params.implied_vol(120.0).unwrap(), 0.3, max_relative = 1e-12);
        assert_eq!(params.rho(), -0.5);
        assert_eq!(params.nu(), 0.4);
        assert_eq!(params.beta(), 0.5);
        assert_eq!(params.maturity(), 0.25);
    }

    #[test]
    fn test_single_atm_quote_scenario() {
        let params = calibrate_smile(1.0 / 252.0, 100.0, 0.15, Some(&[100.0]), Some(&[0.20]), 0.5)
            .unwrap();
        assert_relative_eq!(params.alpha() / 100.0_f64.powf(0.5), 0.20, epsilon = 1e-8);
        assert_relative_eq!(params.maturity(), 1.0 / 252.0);
        assert_eq!(params.forward(), 100.0);
    }

    #[test]
    fn test_fit_recovers_synthetic_parameters() {
        let truth = SabrParams::new(2.0, 0.5, -0.3, 0.6, 0.5, 100.0).unwrap();
        let points = synthetic_points(&truth, &[80.0, 85.0, 90.0, 95.0, 100.0, 105.0, 110.0, 115.0, 120.0]);

        let fit = SmileCalibrator::default().fit(0.5, 100.0, 0.18, &points).unwrap();

        assert_relative_eq!(fit.params.alpha(), 2.0, epsilon = 1e-4);
        assert_relative_eq!(fit.params.rho(), -0.3, epsilon = 1e-3);
        assert_relative_eq!(fit.params.nu(), 0.6, epsilon = 1e-3);
        assert!(fit.rmse < 1e-6);
    }

    #[test]
    fn test_fit_with_hagan_expansion() {
        let truth = SabrParams::new(1.5, 0.5, 0.2, 0.5, 1.0, 100.0).unwrap();
        let points: Vec<SmilePoint> = [85.0, 92.0, 100.0, 108.0, 115.0]
            .iter()
            .map(|&k| SmilePoint::new(k, truth.implied_vol_with(k, SabrExpansion::Hagan).unwrap()))
            .collect();

        let calibrator = SmileCalibrator::default().with_expansion(SabrExpansion::Hagan);
        let fit = calibrator.fit(1.0, 100.0, 0.15, &points).unwrap();

        assert!(fit.rmse < 1e-6);
        assert_relative_eq!(fit.params.rho(), 0.2, epsilon = 1e-2);
    }

    #[test]
    fn test_fit_converges_onto_rho_bound() {
        // Truth sits on the bound, so any step past it is projected back
        let truth = SabrParams::new(2.0, 0.5, -MAX_ABS_RHO, 0.5, 1.0, 100.0).unwrap();
        let points = synthetic_points(&truth, &[90.0, 95.0, 100.0, 105.0, 110.0]);

        let fit = SmileCalibrator::default().fit(1.0, 100.0, 0.2, &points).unwrap();

        assert!(fit.params.rho() >= -MAX_ABS_RHO);
        assert_relative_eq!(fit.params.rho(), -MAX_ABS_RHO, epsilon = 1e-2);
        assert_relative_eq!(fit.params.alpha(), 2.0, epsilon = 1e-2);
        assert!(fit.rmse < 1e-5, "rmse = {}", fit.rmse);
    }

    #[test]
    fn test_not_converged_is_calibration_failure() {
        let truth = SabrParams::new(2.0, 0.5, -0.3, 0.6, 0.5, 100.0).unwrap();
        let points = synthetic_points(&truth, &[80.0, 90.0, 100.0, 110.0, 120.0]);

        let calibrator = SmileCalibrator::default().with_lm_config(LMConfig {
            max_iterations: 1,
            ..LMConfig::default()
        });
        let err = calibrator.fit(0.5, 100.0, 0.1, &points).unwrap_err();

        match err {
            SurfaceError::CalibrationFailure(inner) => {
                assert!(inner.is_not_converged());
                assert!(inner.params.is_some());
            }
            other => panic!("expected CalibrationFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_calibrate_dispatches_on_quotes() {
        let calibrator = SmileCalibrator::default();
        let anchored = calibrator.calibrate(1.0, 100.0, 0.2, &[]).unwrap();
        assert_eq!(anchored, calibrator.atm_anchored(1.0, 100.0, 0.2).unwrap());

        let fitted = calibrator
            .calibrate(1.0, 100.0, 0.2, &[SmilePoint::new(100.0, 0.25)])
            .unwrap();
        assert_relative_eq!(fitted.alpha(), 2.5, epsilon = 1e-8);
    }

    #[test]
    fn test_input_validation() {
        let calibrator = SmileCalibrator::default();
        assert!(calibrator.atm_anchored(0.0, 100.0, 0.2).unwrap_err().is_invalid_parameter());
        assert!(calibrator.atm_anchored(1.0, -1.0, 0.2).unwrap_err().is_invalid_parameter());
        assert!(calibrator.atm_anchored(1.0, 100.0, 0.0).unwrap_err().is_invalid_parameter());
        assert!(calibrator
            .fit(1.0, 100.0, 0.2, &[SmilePoint::new(-5.0, 0.2)])
            .unwrap_err()
            .is_invalid_parameter());
        assert!(calibrator
            .fit(1.0, 100.0, 0.2, &[SmilePoint::new(100.0, 0.2).with_weight(0.0)])
            .unwrap_err()
            .is_invalid_parameter());
        assert!(calibrator.fit(1.0, 100.0, 0.2, &[]).unwrap_err().is_invalid_parameter());

        let bad_shape = SmileCalibrator::new(SmileShape {
            beta: 1.5,
            ..SmileShape::default()
        });
        assert!(bad_shape.atm_anchored(1.0, 100.0, 0.2).unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn test_calibrate_smile_argument_checks() {
        assert!(calibrate_smile(1.0, 100.0, 0.2, Some(&[90.0, 100.0]), Some(&[0.2]), 0.5)
            .unwrap_err()
            .is_invalid_parameter());
        assert!(calibrate_smile(1.0, 100.0, 0.2, None, Some(&[0.2]), 0.5)
            .unwrap_err()
            .is_invalid_parameter());

        let anchored = calibrate_smile(1.0, 100.0, 0.2, None, None, 1.0).unwrap();
        assert_relative_eq!(anchored.alpha(), 0.2, epsilon = 1e-15);
    }
}
