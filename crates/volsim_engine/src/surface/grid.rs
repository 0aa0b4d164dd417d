//! Surface and tensor containers.

use volsim_core::types::SurfaceError;

/// Simulated market state a surface is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceState {
    /// Underlying price.
    pub spot: f64,
    /// Instantaneous variance.
    pub variance: f64,
}

impl SurfaceState {
    /// New state.
    pub fn new(spot: f64, variance: f64) -> Self {
        Self { spot, variance }
    }
}

/// A cell that could not be computed under [`FailurePolicy::MarkFailed`].
///
/// [`FailurePolicy::MarkFailed`]: super::FailurePolicy::MarkFailed
#[derive(Debug, Clone, PartialEq)]
pub struct CellFailure {
    /// Path index.
    pub path: usize,
    /// Step index.
    pub step: usize,
    /// Maturity grid index.
    pub maturity: usize,
    /// Delta grid index.
    pub delta: usize,
    /// Why the cell failed.
    pub error: SurfaceError,
}

impl CellFailure {
    /// Convert into the coordinate-carrying [`SurfaceError::Cell`].
    pub fn into_error(self) -> SurfaceError {
        self.error
            .in_cell(self.path, self.step, self.maturity, self.delta)
    }
}

/// Maturity × delta implied volatilities for one state.
///
/// Failed cells hold NaN and have a matching entry in [`failures`].
///
/// [`failures`]: VolatilitySurface::failures
#[derive(Debug, Clone, PartialEq)]
pub struct VolatilitySurface {
    maturities: Vec<f64>,
    deltas: Vec<f64>,
    vols: Vec<f64>,
    failures: Vec<CellFailure>,
}

impl VolatilitySurface {
    pub(crate) fn new(
        maturities: Vec<f64>,
        deltas: Vec<f64>,
        vols: Vec<f64>,
        failures: Vec<CellFailure>,
    ) -> Self {
        debug_assert_eq!(vols.len(), maturities.len() * deltas.len());
        Self {
            maturities,
            deltas,
            vols,
            failures,
        }
    }

    /// Maturity grid.
    pub fn maturities(&self) -> &[f64] {
        &self.maturities
    }

    /// Delta grid.
    pub fn deltas(&self) -> &[f64] {
        &self.deltas
    }

    /// `(n_maturities, n_deltas)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.maturities.len(), self.deltas.len())
    }

    /// Vol at (maturity index, delta index).
    ///
    /// # Panics
    /// Panics if an index is out of range.
    pub fn get(&self, maturity: usize, delta: usize) -> f64 {
        assert!(delta < self.deltas.len(), "delta index {delta} out of range");
        self.vols[maturity * self.deltas.len() + delta]
    }

    /// Vols for one maturity across the delta grid.
    pub fn row(&self, maturity: usize) -> &[f64] {
        let n = self.deltas.len();
        &self.vols[maturity * n..(maturity + 1) * n]
    }

    /// All vols, maturity-major.
    pub fn values(&self) -> &[f64] {
        &self.vols
    }

    /// Recorded cell failures.
    pub fn failures(&self) -> &[CellFailure] {
        &self.failures
    }

    /// `true` when no cell failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Paths × (steps + 1) × maturities × deltas implied vols with the
/// underlying price and variance paths.
///
/// # Memory Layout
///
/// `vols[((path * (n_steps + 1) + step) * n_maturities + maturity) * n_deltas + delta]`
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationTensor {
    n_paths: usize,
    n_steps: usize,
    maturities: Vec<f64>,
    deltas: Vec<f64>,
    vols: Vec<f64>,
    prices: Vec<f64>,
    variances: Vec<f64>,
    failures: Vec<CellFailure>,
}

impl SimulationTensor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        n_paths: usize,
        n_steps: usize,
        maturities: Vec<f64>,
        deltas: Vec<f64>,
        vols: Vec<f64>,
        prices: Vec<f64>,
        variances: Vec<f64>,
        failures: Vec<CellFailure>,
    ) -> Self {
        debug_assert_eq!(
            vols.len(),
            n_paths * (n_steps + 1) * maturities.len() * deltas.len()
        );
        Self {
            n_paths,
            n_steps,
            maturities,
            deltas,
            vols,
            prices,
            variances,
            failures,
        }
    }

    /// `[paths, steps + 1, maturities, deltas]`.
    pub fn shape(&self) -> [usize; 4] {
        [
            self.n_paths,
            self.n_steps + 1,
            self.maturities.len(),
            self.deltas.len(),
        ]
    }

    /// Maturity grid.
    pub fn maturities(&self) -> &[f64] {
        &self.maturities
    }

    /// Delta grid.
    pub fn deltas(&self) -> &[f64] {
        &self.deltas
    }

    fn surface_offset(&self, path: usize, step: usize) -> usize {
        assert!(path < self.n_paths, "path index {path} out of range");
        assert!(step <= self.n_steps, "step index {step} out of range");
        (path * (self.n_steps + 1) + step) * self.maturities.len() * self.deltas.len()
    }

    /// Vol at one cell.
    ///
    /// # Panics
    /// Panics if an index is out of range.
    pub fn vol(&self, path: usize, step: usize, maturity: usize, delta: usize) -> f64 {
        assert!(maturity < self.maturities.len(), "maturity index {maturity} out of range");
        assert!(delta < self.deltas.len(), "delta index {delta} out of range");
        self.vols[self.surface_offset(path, step) + maturity * self.deltas.len() + delta]
    }

    /// Maturity-major surface slice for one (path, step).
    pub fn surface(&self, path: usize, step: usize) -> &[f64] {
        let start = self.surface_offset(path, step);
        &self.vols[start..start + self.maturities.len() * self.deltas.len()]
    }

    /// Price at (path, step).
    pub fn price(&self, path: usize, step: usize) -> f64 {
        self.prices[path * (self.n_steps + 1) + step]
    }

    /// Variance at (path, step).
    pub fn variance(&self, path: usize, step: usize) -> f64 {
        self.variances[path * (self.n_steps + 1) + step]
    }

    /// All vols in tensor order.
    pub fn vols(&self) -> &[f64] {
        &self.vols
    }

    /// Price paths, `[paths, steps + 1]` row-major.
    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    /// Variance paths, `[paths, steps + 1]` row-major.
    pub fn variances(&self) -> &[f64] {
        &self.variances
    }

    /// Recorded cell failures, ordered by path then step.
    pub fn failures(&self) -> &[CellFailure] {
        &self.failures
    }

    /// `true` when no cell failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_indexing() {
        let surface = VolatilitySurface::new(
            vec![0.25, 1.0],
            vec![0.25, 0.5, 0.75],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![],
        );
        assert_eq!(surface.shape(), (2, 3));
        assert_eq!(surface.get(1, 0), 4.0);
        assert_eq!(surface.row(0), &[1.0, 2.0, 3.0]);
        assert!(surface.is_complete());
    }

    #[test]
    fn test_tensor_indexing() {
        // 1 path, 1 step (2 states), 2 maturities, 2 deltas
        let vols: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let tensor = SimulationTensor::new(
            1,
            1,
            vec![0.5, 1.0],
            vec![0.25, 0.75],
            vols,
            vec![100.0, 101.0],
            vec![0.04, 0.05],
            vec![],
        );
        assert_eq!(tensor.shape(), [1, 2, 2, 2]);
        assert_eq!(tensor.vol(0, 1, 0, 1), 5.0);
        assert_eq!(tensor.surface(0, 1), &[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(tensor.price(0, 1), 101.0);
        assert_eq!(tensor.variance(0, 0), 0.04);
    }

    #[test]
    fn test_cell_failure_into_error() {
        let failure = CellFailure {
            path: 1,
            step: 2,
            maturity: 0,
            delta: 3,
            error: SurfaceError::NumericalDegeneracy("x".to_string()),
        };
        let err = failure.into_error();
        assert!(matches!(err, SurfaceError::Cell { path: 1, step: 2, delta: 3, .. }));
        assert!(err.root_cause().is_numerical_degeneracy());
    }
}
