//! Simulation grid configuration.

use crate::error::ConfigError;

/// Maximum number of simulation paths allowed.
pub const MAX_PATHS: usize = 1_000_000;

/// Maximum number of time steps allowed per path.
pub const MAX_STEPS: usize = 10_000;

/// Path count, step count, horizon and optional base seed.
///
/// Use [`SimulationConfigBuilder`] to construct instances.
///
/// # Examples
///
/// ```rust
/// use volsim_engine::simulation::SimulationConfig;
///
/// let config = SimulationConfig::builder()
///     .n_paths(1_000)
///     .n_steps(252)
///     .horizon(1.0)
///     .seed(42)
///     .build()
///     .expect("valid configuration");
///
/// assert_eq!(config.n_paths(), 1_000);
/// assert!((config.dt() - 1.0 / 252.0).abs() < 1e-15);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    n_paths: usize,
    n_steps: usize,
    horizon: f64,
    seed: Option<u64>,
}

impl SimulationConfig {
    /// Creates a new configuration builder.
    #[inline]
    pub fn builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::default()
    }

    /// Number of simulated paths.
    #[inline]
    pub fn n_paths(&self) -> usize {
        self.n_paths
    }

    /// Number of time steps per path.
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Simulation horizon in years.
    #[inline]
    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    /// Base seed, if fixed.
    #[inline]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Time step `horizon / n_steps`.
    #[inline]
    pub fn dt(&self) -> f64 {
        self.horizon / self.n_steps as f64
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `n_paths` is 0 or greater than [`MAX_PATHS`]
    /// - `n_steps` is 0 or greater than [`MAX_STEPS`]
    /// - `horizon` is not positive and finite
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_paths == 0 || self.n_paths > MAX_PATHS {
            return Err(ConfigError::InvalidPathCount(self.n_paths));
        }
        if self.n_steps == 0 || self.n_steps > MAX_STEPS {
            return Err(ConfigError::InvalidStepCount(self.n_steps));
        }
        if !(self.horizon > 0.0 && self.horizon.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                name: "horizon",
                value: format!("must be positive and finite, got {}", self.horizon),
            });
        }
        let dt = self.dt();
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                name: "horizon",
                value: format!("time step {dt} is not positive"),
            });
        }
        Ok(())
    }
}

/// Builder for [`SimulationConfig`].
#[derive(Clone, Debug, Default)]
pub struct SimulationConfigBuilder {
    n_paths: Option<usize>,
    n_steps: Option<usize>,
    horizon: Option<f64>,
    seed: Option<u64>,
}

impl SimulationConfigBuilder {
    /// Sets the number of paths, in [1, `MAX_PATHS`].
    #[inline]
    pub fn n_paths(mut self, n_paths: usize) -> Self {
        self.n_paths = Some(n_paths);
        self
    }

    /// Sets the number of steps, in [1, `MAX_STEPS`].
    #[inline]
    pub fn n_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = Some(n_steps);
        self
    }

    /// Sets the horizon in years.
    #[inline]
    pub fn horizon(mut self, horizon: f64) -> Self {
        self.horizon = Some(horizon);
        self
    }

    /// Sets the base seed.
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a count or the horizon is missing or invalid.
    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let n_paths = self.n_paths.ok_or(ConfigError::InvalidParameter {
            name: "n_paths",
            value: "must be specified".to_string(),
        })?;

        let n_steps = self.n_steps.ok_or(ConfigError::InvalidParameter {
            name: "n_steps",
            value: "must be specified".to_string(),
        })?;

        let horizon = self.horizon.ok_or(ConfigError::InvalidParameter {
            name: "horizon",
            value: "must be specified".to_string(),
        })?;

        let config = SimulationConfig {
            n_paths,
            n_steps,
            horizon,
            seed: self.seed,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volsim_core::types::SurfaceError;

    fn builder() -> SimulationConfigBuilder {
        SimulationConfig::builder().n_paths(100).n_steps(10).horizon(0.5)
    }

    #[test]
    fn test_builder_valid() {
        let config = builder().build().unwrap();
        assert_eq!(config.n_paths(), 100);
        assert_eq!(config.n_steps(), 10);
        assert_eq!(config.horizon(), 0.5);
        assert_eq!(config.seed(), None);
        assert!((config.dt() - 0.05).abs() < 1e-15);
    }

    #[test]
    fn test_builder_with_seed() {
        assert_eq!(builder().seed(7).build().unwrap().seed(), Some(7));
    }

    #[test]
    fn test_invalid_counts() {
        assert!(matches!(
            builder().n_paths(0).build(),
            Err(ConfigError::InvalidPathCount(0))
        ));
        assert!(matches!(
            builder().n_paths(MAX_PATHS + 1).build(),
            Err(ConfigError::InvalidPathCount(_))
        ));
        assert!(matches!(
            builder().n_steps(0).build(),
            Err(ConfigError::InvalidStepCount(0))
        ));
        assert!(matches!(
            builder().n_steps(MAX_STEPS + 1).build(),
            Err(ConfigError::InvalidStepCount(_))
        ));
    }

    #[test]
    fn test_invalid_horizon() {
        for horizon in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                builder().horizon(horizon).build(),
                Err(ConfigError::InvalidParameter { name: "horizon", .. })
            ));
        }

        // Zero time step surfaces as an invalid parameter at the public seam
        let err: SurfaceError = builder().horizon(0.0).build().unwrap_err().into();
        assert!(err.is_invalid_parameter());
    }

    #[test]
    fn test_missing_fields() {
        let result = SimulationConfig::builder().n_steps(10).horizon(1.0).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter { name: "n_paths", .. })
        ));

        let result = SimulationConfig::builder().n_paths(10).n_steps(10).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter { name: "horizon", .. })
        ));
    }
}
