//! Correlated standard normal pairs.

use volsim_core::types::SurfaceError;

use super::SimRng;

/// Lower-triangular Cholesky factor of `[[1, ρ], [ρ, 1]]`.
///
/// Maps independent `(z1, z2)` to `(z1, ρ·z1 + √(1-ρ²)·z2)`.
///
/// # Examples
///
/// ```rust
/// use volsim_engine::rng::CorrelatedNormals;
///
/// let gen = CorrelatedNormals::new(-0.7).unwrap();
/// let (w1, w2) = gen.correlate(1.0, 0.0);
/// assert_eq!(w1, 1.0);
/// assert!((w2 + 0.7).abs() < 1e-15);
///
/// assert!(CorrelatedNormals::new(1.2).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelatedNormals {
    rho: f64,
    rho_perp: f64,
}

impl CorrelatedNormals {
    /// Factor for correlation `rho`.
    ///
    /// # Errors
    /// `InvalidParameter` if `rho` is non-finite or outside [-1, 1].
    pub fn new(rho: f64) -> Result<Self, SurfaceError> {
        if !(-1.0..=1.0).contains(&rho) {
            return Err(SurfaceError::invalid(format!(
                "correlation must be in [-1, 1], got {rho}"
            )));
        }
        Ok(Self {
            rho,
            rho_perp: (1.0 - rho * rho).max(0.0).sqrt(),
        })
    }

    /// Correlation.
    #[inline]
    pub fn rho(&self) -> f64 {
        self.rho
    }

    /// Apply the factor to one independent pair.
    #[inline]
    pub fn correlate(&self, z1: f64, z2: f64) -> (f64, f64) {
        (z1, self.rho * z1 + self.rho_perp * z2)
    }

    /// Draw one correlated pair.
    #[inline]
    pub fn sample(&self, rng: &mut SimRng) -> (f64, f64) {
        let z1 = rng.gen_normal();
        let z2 = rng.gen_normal();
        self.correlate(z1, z2)
    }

    /// Fill two batches: `first` with independent normals, `second` with
    /// normals correlated to `first` at `rho`.
    ///
    /// # Panics
    /// Panics if the batches differ in length.
    pub fn fill(&self, rng: &mut SimRng, first: &mut [f64], second: &mut [f64]) {
        assert_eq!(first.len(), second.len(), "batch lengths must match");
        rng.fill_normal(first);
        rng.fill_normal(second);
        for (w1, w2) in first.iter().zip(second.iter_mut()) {
            *w2 = self.rho * *w1 + self.rho_perp * *w2;
        }
    }
}
