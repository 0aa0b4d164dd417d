//! Surface assembler.
//!
//! # Algorithm
//!
//! For each state and maturity T:
//! 1. `F = S·e^{rT}`, `anchor = max(√V⁺, min_vol)`
//! 2. smile parameters once for (T, F, anchor), optionally memoised
//! 3. for each delta: strike from the oracle at the anchor vol, then the
//!    smile vol at that strike
//!
//! Tensor assembly runs one rayon task per path, each writing only its own
//! contiguous slice of the output.
//!
//! The main saving is step 2: one calibration per maturity instead of one per
//! cell. The memo only hits on an exact (T, F, anchor) repeat under the same
//! calibration settings, which a moving path almost never produces, so the
//! tensor build keeps it for one state at a time. Callers that revisit
//! states can hold a cache across calls with
//! [`SurfaceAssembler::build_surface_with_cache`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rayon::prelude::*;
use tracing::{debug, info, warn};
use volsim_core::traits::OptionOracle;
use volsim_core::types::{OptionType, SurfaceError};
use volsim_models::calibration::SmileCalibrator;
use volsim_models::models::SabrParams;
use volsim_models::strike::{StrikeQuery, StrikeResolver};

use super::cache::{SmileCache, SmileKey};
use super::grid::{CellFailure, SimulationTensor, SurfaceState, VolatilitySurface};
use super::policy::{FailurePolicy, SmileSource};
use crate::simulation::PathTensor;

/// Default floor on the anchor volatility.
pub const DEFAULT_MIN_VOL: f64 = 1e-4;

/// Builds volatility surfaces from simulated states.
///
/// # Examples
///
/// ```
/// use volsim_engine::surface::{SurfaceAssembler, SurfaceState};
/// use volsim_models::analytical::BlackScholesOracle;
///
/// let assembler = SurfaceAssembler::new(BlackScholesOracle::new()).with_rate(0.01);
/// let surface = assembler
///     .build_surface(&[0.25, 1.0], &[0.25, 0.5, 0.75], SurfaceState::new(100.0, 0.04))
///     .unwrap();
///
/// assert_eq!(surface.shape(), (2, 3));
/// assert!(surface.values().iter().all(|v| v.is_finite() && *v > 0.0));
/// ```
#[derive(Debug, Clone)]
pub struct SurfaceAssembler<O> {
    resolver: StrikeResolver<O>,
    calibrator: SmileCalibrator,
    smile_source: SmileSource,
    option_type: OptionType,
    rate: f64,
    min_vol: f64,
    policy: FailurePolicy,
    memoize: bool,
}

impl<O: OptionOracle> SurfaceAssembler<O> {
    /// Assembler with call deltas, zero rate, anchored smiles, the abort
    /// policy and memoisation on.
    pub fn new(oracle: O) -> Self {
        Self {
            resolver: StrikeResolver::new(oracle),
            calibrator: SmileCalibrator::default(),
            smile_source: SmileSource::AtmAnchored,
            option_type: OptionType::Call,
            rate: 0.0,
            min_vol: DEFAULT_MIN_VOL,
            policy: FailurePolicy::Abort,
            memoize: true,
        }
    }

    /// Continuously compounded rate for forwards and deltas.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Delta convention of the grid.
    pub fn with_option_type(mut self, option_type: OptionType) -> Self {
        self.option_type = option_type;
        self
    }

    /// Floor on the anchor vol.
    pub fn with_min_vol(mut self, min_vol: f64) -> Self {
        self.min_vol = min_vol;
        self
    }

    /// Cell failure handling.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Anchored or fitted smiles.
    pub fn with_smile_source(mut self, source: SmileSource) -> Self {
        self.smile_source = source;
        self
    }

    /// Smile calibrator (shape, expansion, LM settings).
    pub fn with_calibrator(mut self, calibrator: SmileCalibrator) -> Self {
        self.calibrator = calibrator;
        self
    }

    /// Toggle smile memoisation.
    pub fn with_memoization(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    /// Strike search bracket as multiples of spot.
    pub fn with_strike_bracket(mut self, lower: f64, upper: f64) -> Result<Self, SurfaceError> {
        self.resolver = self.resolver.with_bracket(lower, upper)?;
        Ok(self)
    }

    /// Active failure policy.
    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Active smile source.
    pub fn smile_source(&self) -> &SmileSource {
        &self.smile_source
    }

    /// Smile parameters for `state` at `maturity`.
    pub fn smile_for(&self, state: SurfaceState, maturity: f64) -> Result<SabrParams, SurfaceError> {
        let (forward, anchor) = self.forward_and_anchor(state, maturity);
        self.calibrate(maturity, forward, anchor)
    }

    /// Surface for a single state.
    ///
    /// Failures are reported with path and step 0.
    ///
    /// # Errors
    /// `InvalidParameter` for empty or invalid grids, an invalid state or
    /// assembler settings; under [`FailurePolicy::Abort`], the first failing
    /// cell wrapped in [`SurfaceError::Cell`].
    pub fn build_surface(
        &self,
        maturities: &[f64],
        deltas: &[f64],
        state: SurfaceState,
    ) -> Result<VolatilitySurface, SurfaceError> {
        self.build_surface_with_cache(maturities, deltas, state, &mut SmileCache::new())
    }

    /// [`build_surface`](Self::build_surface) reusing a caller-owned smile
    /// cache across calls.
    ///
    /// Entries are keyed by this assembler's calibration settings as well as
    /// (T, F, anchor), so one cache can be shared between assemblers.
    pub fn build_surface_with_cache(
        &self,
        maturities: &[f64],
        deltas: &[f64],
        state: SurfaceState,
        cache: &mut SmileCache,
    ) -> Result<VolatilitySurface, SurfaceError> {
        self.validate(maturities, deltas)?;
        validate_state(state)?;

        let mut vols = vec![f64::NAN; maturities.len() * deltas.len()];
        let mut failures = Vec::new();
        let calibration = self.smile_fingerprint();
        self.fill_state(
            state,
            (0, 0),
            maturities,
            deltas,
            &mut vols,
            (cache, calibration),
            &mut failures,
        )?;

        debug!(
            spot = state.spot,
            variance = state.variance,
            failed_cells = failures.len(),
            "surface assembled"
        );

        Ok(VolatilitySurface::new(
            maturities.to_vec(),
            deltas.to_vec(),
            vols,
            failures,
        ))
    }

    /// Surfaces for every (path, step) of `paths`, parallel over paths.
    ///
    /// # Errors
    /// As [`build_surface`](Self::build_surface); under the abort policy the
    /// error of the lowest failing path is returned.
    pub fn build_tensor(
        &self,
        maturities: &[f64],
        deltas: &[f64],
        paths: &PathTensor,
    ) -> Result<SimulationTensor, SurfaceError> {
        self.assemble_tensor(maturities, deltas, paths, true)
    }

    /// Single-threaded [`build_tensor`](Self::build_tensor); same output.
    pub fn build_tensor_sequential(
        &self,
        maturities: &[f64],
        deltas: &[f64],
        paths: &PathTensor,
    ) -> Result<SimulationTensor, SurfaceError> {
        self.assemble_tensor(maturities, deltas, paths, false)
    }

    fn assemble_tensor(
        &self,
        maturities: &[f64],
        deltas: &[f64],
        paths: &PathTensor,
        parallel: bool,
    ) -> Result<SimulationTensor, SurfaceError> {
        self.validate(maturities, deltas)?;

        let n_paths = paths.n_paths();
        let n_steps = paths.n_steps();
        let cells = maturities.len() * deltas.len();
        let per_path = (n_steps + 1) * cells;

        info!(
            n_paths,
            n_steps,
            n_maturities = maturities.len(),
            n_deltas = deltas.len(),
            policy = %self.policy,
            parallel,
            "assembling surface tensor"
        );

        let mut vols = vec![f64::NAN; n_paths * per_path];
        let calibration = self.smile_fingerprint();

        let work = |(path, chunk): (usize, &mut [f64])| -> Result<Vec<CellFailure>, SurfaceError> {
            let mut cache = SmileCache::new();
            let mut failures = Vec::new();
            for (step, out) in chunk.chunks_mut(cells).enumerate() {
                cache.clear();
                self.fill_state(
                    paths.state(path, step),
                    (path, step),
                    maturities,
                    deltas,
                    out,
                    (&mut cache, calibration),
                    &mut failures,
                )?;
            }
            if !failures.is_empty() {
                warn!(path, failed_cells = failures.len(), "surface cells marked failed");
            }
            debug!(path, cache_hits = cache.hits(), cache_misses = cache.misses(), "path assembled");
            Ok(failures)
        };

        let results: Vec<Result<Vec<CellFailure>, SurfaceError>> = if parallel {
            vols.par_chunks_mut(per_path).enumerate().map(work).collect()
        } else {
            vols.chunks_mut(per_path).enumerate().map(work).collect()
        };

        let mut failures = Vec::new();
        for result in results {
            failures.extend(result?);
        }

        info!(failed_cells = failures.len(), "surface tensor assembled");

        let (prices, variances) = (paths.prices().to_vec(), paths.variances().to_vec());
        Ok(SimulationTensor::new(
            n_paths,
            n_steps,
            maturities.to_vec(),
            deltas.to_vec(),
            vols,
            prices,
            variances,
            failures,
        ))
    }

    /// Fill one maturity-major surface slice.
    #[allow(clippy::too_many_arguments)]
    fn fill_state(
        &self,
        state: SurfaceState,
        (path, step): (usize, usize),
        maturities: &[f64],
        deltas: &[f64],
        out: &mut [f64],
        (cache, calibration): (&mut SmileCache, u64),
        failures: &mut Vec<CellFailure>,
    ) -> Result<(), SurfaceError> {
        let n_deltas = deltas.len();

        for (m_idx, &maturity) in maturities.iter().enumerate() {
            let row = &mut out[m_idx * n_deltas..(m_idx + 1) * n_deltas];
            let (forward, anchor) = self.forward_and_anchor(state, maturity);

            let smile = if self.memoize {
                let key = SmileKey::new(maturity, forward, anchor).with_calibration(calibration);
                cache.get_or_try_insert_with(key, || self.calibrate(maturity, forward, anchor))
            } else {
                self.calibrate(maturity, forward, anchor)
            };

            for (d_idx, &delta) in deltas.iter().enumerate() {
                let cell = smile
                    .clone()
                    .and_then(|params| self.cell(&params, state, maturity, delta, anchor));

                match cell {
                    Ok(vol) => row[d_idx] = vol,
                    Err(error) => match self.policy {
                        FailurePolicy::Abort => {
                            return Err(error.in_cell(path, step, m_idx, d_idx));
                        }
                        FailurePolicy::MarkFailed => {
                            row[d_idx] = f64::NAN;
                            failures.push(CellFailure {
                                path,
                                step,
                                maturity: m_idx,
                                delta: d_idx,
                                error,
                            });
                        }
                    },
                }
            }
        }

        Ok(())
    }

    fn cell(
        &self,
        params: &SabrParams,
        state: SurfaceState,
        maturity: f64,
        delta: f64,
        anchor: f64,
    ) -> Result<f64, SurfaceError> {
        let query = StrikeQuery::new(self.option_type, state.spot, delta, maturity, self.rate, anchor);
        let strike = self.resolver.resolve(&query)?;
        self.calibrator.implied_vol(params, strike)
    }

    fn calibrate(&self, maturity: f64, forward: f64, anchor: f64) -> Result<SabrParams, SurfaceError> {
        match &self.smile_source {
            SmileSource::AtmAnchored => self.calibrator.atm_anchored(maturity, forward, anchor),
            SmileSource::Fitted(template) => {
                let quotes = template.quotes(forward, anchor)?;
                Ok(self.calibrator.fit(maturity, forward, anchor, &quotes)?.params)
            }
        }
    }

    /// Hash of every setting besides (T, F, anchor) that changes a smile.
    fn smile_fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        let shape = self.calibrator.shape();
        for value in [shape.beta, shape.rho, shape.nu] {
            value.to_bits().hash(&mut hasher);
        }
        (self.calibrator.expansion() as u8).hash(&mut hasher);

        match &self.smile_source {
            SmileSource::AtmAnchored => 0_u8.hash(&mut hasher),
            SmileSource::Fitted(template) => {
                1_u8.hash(&mut hasher);
                let lm = self.calibrator.lm_config();
                lm.max_iterations.hash(&mut hasher);
                for value in [
                    lm.tolerance,
                    lm.initial_lambda,
                    lm.lambda_up,
                    lm.lambda_down,
                    lm.min_lambda,
                    lm.max_lambda,
                    lm.param_tolerance,
                ] {
                    value.to_bits().hash(&mut hasher);
                }
                template.moneyness().len().hash(&mut hasher);
                for value in template.moneyness().iter().chain(template.vol_offsets()) {
                    value.to_bits().hash(&mut hasher);
                }
            }
        }

        hasher.finish()
    }

    #[inline]
    fn forward_and_anchor(&self, state: SurfaceState, maturity: f64) -> (f64, f64) {
        let forward = state.spot * (self.rate * maturity).exp();
        let anchor = state.variance.max(0.0).sqrt().max(self.min_vol);
        (forward, anchor)
    }

    fn validate(&self, maturities: &[f64], deltas: &[f64]) -> Result<(), SurfaceError> {
        if maturities.is_empty() {
            return Err(SurfaceError::invalid("maturity grid is empty"));
        }
        if deltas.is_empty() {
            return Err(SurfaceError::invalid("delta grid is empty"));
        }
        if let Some(t) = maturities.iter().find(|t| !(**t > 0.0 && t.is_finite())) {
            return Err(SurfaceError::invalid(format!(
                "maturities must be positive, got {t}"
            )));
        }
        if let Some(d) = deltas.iter().find(|d| !d.is_finite()) {
            return Err(SurfaceError::invalid(format!("deltas must be finite, got {d}")));
        }
        if !self.rate.is_finite() {
            return Err(SurfaceError::invalid(format!(
                "rate must be finite, got {}",
                self.rate
            )));
        }
        if !(self.min_vol > 0.0 && self.min_vol.is_finite()) {
            return Err(SurfaceError::invalid(format!(
                "minimum vol must be positive, got {}",
                self.min_vol
            )));
        }
        self.calibrator.shape().validate()?;
        if let SmileSource::Fitted(template) = &self.smile_source {
            template.validate()?;
        }
        Ok(())
    }
}

fn validate_state(state: SurfaceState) -> Result<(), SurfaceError> {
    if !(state.spot > 0.0 && state.spot.is_finite()) {
        return Err(SurfaceError::invalid(format!(
            "spot must be positive, got {}",
            state.spot
        )));
    }
    if !(state.variance >= 0.0 && state.variance.is_finite()) {
        return Err(SurfaceError::invalid(format!(
            "variance must be non-negative, got {}",
            state.variance
        )));
    }
    Ok(())
}
