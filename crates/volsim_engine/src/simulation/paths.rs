//! Path generation under full-truncation Euler.
//!
//! # Drivers
//!
//! - [`simulate_paths`]: one caller-supplied source, drawn step-major (all
//!   paths for step t, then step t+1)
//! - [`simulate_paths_seeded`]: one source per path, seeded with
//!   `derive_seed(base_seed, path)`
//! - [`simulate_paths_parallel`]: as `simulate_paths_seeded`, with paths
//!   distributed over rayon workers; bit-identical to the sequential run

use rayon::prelude::*;
use tracing::{debug, info, warn};
use volsim_core::types::SurfaceError;
use volsim_models::models::HestonParams;

use super::SimulationConfig;
use crate::rng::{CorrelatedNormals, SimRng};
use crate::surface::SurfaceState;

/// Simulated prices and variances for an ensemble of paths.
///
/// # Memory Layout
///
/// Row-major: `values[path * (n_steps + 1) + step]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTensor {
    n_paths: usize,
    n_steps: usize,
    prices: Vec<f64>,
    variances: Vec<f64>,
}

impl PathTensor {
    fn filled(n_paths: usize, n_steps: usize, spot: f64, v0: f64) -> Self {
        let len = n_paths * (n_steps + 1);
        let mut prices = vec![0.0; len];
        let mut variances = vec![0.0; len];
        for path in 0..n_paths {
            prices[path * (n_steps + 1)] = spot;
            variances[path * (n_steps + 1)] = v0;
        }
        Self {
            n_paths,
            n_steps,
            prices,
            variances,
        }
    }

    /// Number of paths.
    #[inline]
    pub fn n_paths(&self) -> usize {
        self.n_paths
    }

    /// Number of steps; each path holds `n_steps + 1` states.
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    #[inline]
    fn offset(&self, path: usize) -> usize {
        path * (self.n_steps + 1)
    }

    /// Price at (path, step).
    ///
    /// # Panics
    /// Panics if either index is out of range.
    #[inline]
    pub fn price(&self, path: usize, step: usize) -> f64 {
        assert!(step <= self.n_steps, "step {step} out of range");
        self.prices[self.offset(path) + step]
    }

    /// Variance at (path, step).
    ///
    /// # Panics
    /// Panics if either index is out of range.
    #[inline]
    pub fn variance(&self, path: usize, step: usize) -> f64 {
        assert!(step <= self.n_steps, "step {step} out of range");
        self.variances[self.offset(path) + step]
    }

    /// (spot, variance) at (path, step).
    #[inline]
    pub fn state(&self, path: usize, step: usize) -> SurfaceState {
        SurfaceState::new(self.price(path, step), self.variance(path, step))
    }

    /// Price trajectory of one path.
    pub fn path_prices(&self, path: usize) -> &[f64] {
        let start = self.offset(path);
        &self.prices[start..start + self.n_steps + 1]
    }

    /// Variance trajectory of one path.
    pub fn path_variances(&self, path: usize) -> &[f64] {
        let start = self.offset(path);
        &self.variances[start..start + self.n_steps + 1]
    }

    /// All prices, row-major.
    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    /// All variances, row-major.
    pub fn variances(&self) -> &[f64] {
        &self.variances
    }

    /// Consume into `(prices, variances)`.
    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.prices, self.variances)
    }
}

/// Validate inputs and return the correlation factor and time step.
fn prepare(
    params: &HestonParams,
    config: &SimulationConfig,
) -> Result<(CorrelatedNormals, f64), SurfaceError> {
    params.validate()?;
    config.validate()?;

    if !params.satisfies_feller() {
        warn!(
            feller_ratio = params.feller_ratio(),
            "Feller condition violated; variance will hit the truncation floor"
        );
    }

    Ok((CorrelatedNormals::new(params.rho)?, config.dt()))
}

/// Simulate every path from one source, drawing step-major.
///
/// For each step, a batch of `n_paths` independent normals is drawn for
/// the price and a second batch for the variance, then correlated.
///
/// # Errors
/// `InvalidParameter` for invalid Heston inputs or an invalid grid
/// (including a non-positive time step). Both are detected before any draw.
pub fn simulate_paths(
    params: &HestonParams,
    config: &SimulationConfig,
    rng: &mut SimRng,
) -> Result<PathTensor, SurfaceError> {
    let (normals, dt) = prepare(params, config)?;
    let n_paths = config.n_paths();
    let n_steps = config.n_steps();
    let sqrt_dt = dt.sqrt();

    info!(n_paths, n_steps, seed = rng.seed(), "simulating Heston paths (shared source)");

    let mut tensor = PathTensor::filled(n_paths, n_steps, params.spot, params.v0);
    let mut dw1 = vec![0.0; n_paths];
    let mut dw2 = vec![0.0; n_paths];
    let stride = n_steps + 1;

    for step in 0..n_steps {
        normals.fill(rng, &mut dw1, &mut dw2);
        for path in 0..n_paths {
            let idx = path * stride + step;
            let (s_next, v_next) = params.full_truncation_step(
                tensor.prices[idx],
                tensor.variances[idx],
                dt,
                dw1[path] * sqrt_dt,
                dw2[path] * sqrt_dt,
            );
            tensor.prices[idx + 1] = s_next;
            tensor.variances[idx + 1] = v_next;
        }
    }

    Ok(tensor)
}

/// Simulate one path from its own source into the given slices.
fn simulate_single_path(
    params: &HestonParams,
    normals: &CorrelatedNormals,
    dt: f64,
    rng: &mut SimRng,
    prices: &mut [f64],
    variances: &mut [f64],
) {
    let sqrt_dt = dt.sqrt();
    for step in 0..prices.len() - 1 {
        let (z1, z2) = normals.sample(rng);
        let (s_next, v_next) =
            params.full_truncation_step(prices[step], variances[step], dt, z1 * sqrt_dt, z2 * sqrt_dt);
        prices[step + 1] = s_next;
        variances[step + 1] = v_next;
    }
}

fn simulate_with_seeds(
    params: &HestonParams,
    config: &SimulationConfig,
    base_seed: u64,
    parallel: bool,
) -> Result<PathTensor, SurfaceError> {
    let (normals, dt) = prepare(params, config)?;
    let n_paths = config.n_paths();
    let n_steps = config.n_steps();

    info!(n_paths, n_steps, base_seed, parallel, "simulating Heston paths (per-path sources)");

    let mut tensor = PathTensor::filled(n_paths, n_steps, params.spot, params.v0);
    let stride = n_steps + 1;

    let run = |(path, (prices, variances)): (usize, (&mut [f64], &mut [f64]))| {
        let mut rng = SimRng::for_path(base_seed, path);
        simulate_single_path(params, &normals, dt, &mut rng, prices, variances);
        debug!(path, terminal_price = prices[n_steps], "path simulated");
    };

    let PathTensor {
        prices, variances, ..
    } = &mut tensor;

    if parallel {
        prices
            .par_chunks_mut(stride)
            .zip(variances.par_chunks_mut(stride))
            .enumerate()
            .for_each(run);
    } else {
        prices
            .chunks_mut(stride)
            .zip(variances.chunks_mut(stride))
            .enumerate()
            .for_each(run);
    }

    Ok(tensor)
}

/// Simulate with one deterministically seeded source per path.
pub fn simulate_paths_seeded(
    params: &HestonParams,
    config: &SimulationConfig,
    base_seed: u64,
) -> Result<PathTensor, SurfaceError> {
    simulate_with_seeds(params, config, base_seed, false)
}

/// Parallel [`simulate_paths_seeded`]; produces the same tensor bit for bit.
pub fn simulate_paths_parallel(
    params: &HestonParams,
    config: &SimulationConfig,
    base_seed: u64,
) -> Result<PathTensor, SurfaceError> {
    simulate_with_seeds(params, config, base_seed, true)
}
