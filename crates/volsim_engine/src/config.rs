//! Engine configuration management
//!
//! Loads an [`EngineConfig`] from TOML and applies `VOLSIM_*` environment
//! overrides on top.
//!
//! # Priority
//!
//! 1. Environment variables
//! 2. Config file
//! 3. Default values
//!
//! # Example
//!
//! ```toml
//! [simulation]
//! n_paths = 1000
//! n_steps = 252
//! horizon = 1.0
//! seed = 42
//! kappa = 2.0
//!
//! [surface]
//! maturities = [0.25, 0.5, 1.0]
//! deltas = [0.25, 0.5, 0.75]
//! failure_policy = "mark_failed"
//!
//! [smile]
//! beta = 0.5
//! expansion = "hagan"
//!
//! [runtime]
//! worker_threads = 4
//! ```

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use volsim_core::math::solvers::LMConfig;
use volsim_core::traits::OptionOracle;
use volsim_core::types::{OptionType, SurfaceError};
use volsim_models::calibration::{SmileCalibrator, SmileShape};
use volsim_models::models::{HestonParams, SabrExpansion};
use volsim_models::strike::{DEFAULT_LOWER_FACTOR, DEFAULT_UPPER_FACTOR};

use crate::error::ConfigError;
use crate::simulation::{SimulationConfig, MAX_PATHS, MAX_STEPS};
use crate::surface::{FailurePolicy, SmileSource, SmileTemplate, SurfaceAssembler, DEFAULT_MIN_VOL};

/// Base seed override.
pub const ENV_SEED: &str = "VOLSIM_SEED";
/// Path count override.
pub const ENV_PATHS: &str = "VOLSIM_PATHS";
/// Step count override.
pub const ENV_STEPS: &str = "VOLSIM_STEPS";
/// Failure policy override.
pub const ENV_FAILURE_POLICY: &str = "VOLSIM_FAILURE_POLICY";
/// Worker thread override.
pub const ENV_THREADS: &str = "VOLSIM_THREADS";

/// `[simulation]`: grid, seed and Heston dynamics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSection {
    /// Number of paths
    pub n_paths: usize,
    /// Number of time steps
    pub n_steps: usize,
    /// Horizon in years
    pub horizon: f64,
    /// Base seed; drawn from entropy when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Initial price
    pub spot: f64,
    /// Initial variance
    pub v0: f64,
    /// Long-run variance
    pub theta: f64,
    /// Mean-reversion speed
    pub kappa: f64,
    /// Vol of variance
    pub xi: f64,
    /// Price/variance correlation
    pub rho: f64,
    /// Price drift
    pub drift: f64,
}

impl Default for SimulationSection {
    fn default() -> Self {
        let heston = HestonParams::default();
        Self {
            n_paths: 1,
            n_steps: 252,
            horizon: 1.0,
            seed: None,
            spot: heston.spot,
            v0: heston.v0,
            theta: heston.theta,
            kappa: heston.kappa,
            xi: heston.xi,
            rho: heston.rho,
            drift: heston.drift,
        }
    }
}

/// How smiles are produced, as named in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmileMode {
    /// Closed-form anchoring at the money
    #[default]
    Anchored,
    /// Least-squares fit to `[surface.template]`
    Fitted,
}

/// `[surface]`: grids, conventions and assembly policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurfaceSection {
    /// Maturity grid in years
    pub maturities: Vec<f64>,
    /// Delta grid
    pub deltas: Vec<f64>,
    /// Continuously compounded rate
    pub rate: f64,
    /// Delta convention ("call"/"c" or "put"/"p")
    pub option_type: OptionType,
    /// Floor on the anchor vol
    pub min_vol: f64,
    /// `abort` or `mark_failed`
    pub failure_policy: FailurePolicy,
    /// Memoise smiles per (maturity, forward, anchor)
    pub memoize: bool,
    /// Strike search bracket as multiples of spot
    pub strike_bracket: [f64; 2],
    /// Smile source
    pub smile_mode: SmileMode,
    /// Quote template used when `smile_mode = "fitted"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<SmileTemplate>,
}

impl Default for SurfaceSection {
    fn default() -> Self {
        Self {
            maturities: vec![1.0 / 12.0, 0.25, 0.5, 1.0],
            deltas: vec![0.1, 0.25, 0.5, 0.75, 0.9],
            rate: 0.0,
            option_type: OptionType::Call,
            min_vol: DEFAULT_MIN_VOL,
            failure_policy: FailurePolicy::Abort,
            memoize: true,
            strike_bracket: [DEFAULT_LOWER_FACTOR, DEFAULT_UPPER_FACTOR],
            smile_mode: SmileMode::Anchored,
            template: None,
        }
    }
}

/// `[smile]`: fixed shape, expansion and fit budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmileSection {
    /// CEV exponent
    pub beta: f64,
    /// Smile correlation (initial guess when fitting)
    pub rho: f64,
    /// Vol of vol (initial guess when fitting)
    pub nu: f64,
    /// `leading_order` or `hagan`
    pub expansion: SabrExpansion,
    /// LM iteration cap for fitted smiles
    pub max_iterations: usize,
}

impl Default for SmileSection {
    fn default() -> Self {
        let shape = SmileShape::default();
        Self {
            beta: shape.beta,
            rho: shape.rho,
            nu: shape.nu,
            expansion: SabrExpansion::LeadingOrder,
            max_iterations: 200,
        }
    }
}

/// `[runtime]`: parallelism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSection {
    /// Dedicated rayon pool size; the global pool when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_threads: Option<usize>,
    /// Run paths in parallel
    pub parallel: bool,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            worker_threads: None,
            parallel: true,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Simulation grid and dynamics
    pub simulation: SimulationSection,
    /// Surface grid and policy
    pub surface: SurfaceSection,
    /// Smile shape
    pub smile: SmileSection,
    /// Parallelism
    pub runtime: RuntimeSection,
}

impl EngineConfig {
    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::File(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialise to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `VOLSIM_*` overrides from the process environment.
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup` (variable name to value) and
    /// re-validate.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_SEED) {
            self.simulation.seed = Some(parse_env(ENV_SEED, &value)?);
        }
        if let Some(value) = lookup(ENV_PATHS) {
            self.simulation.n_paths = parse_env(ENV_PATHS, &value)?;
        }
        if let Some(value) = lookup(ENV_STEPS) {
            self.simulation.n_steps = parse_env(ENV_STEPS, &value)?;
        }
        if let Some(value) = lookup(ENV_FAILURE_POLICY) {
            self.surface.failure_policy = FailurePolicy::from_str(&value).map_err(|_| {
                ConfigError::Env {
                    var: ENV_FAILURE_POLICY,
                    value: value.clone(),
                }
            })?;
        }
        if let Some(value) = lookup(ENV_THREADS) {
            self.runtime.worker_threads = Some(parse_env(ENV_THREADS, &value)?);
        }

        self.validate()?;
        Ok(self)
    }

    /// Check every section, reporting all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let sim = &self.simulation;
        let surface = &self.surface;

        if sim.n_paths == 0 || sim.n_paths > MAX_PATHS {
            errors.push(ConfigError::InvalidPathCount(sim.n_paths).to_string());
        }
        if sim.n_steps == 0 || sim.n_steps > MAX_STEPS {
            errors.push(ConfigError::InvalidStepCount(sim.n_steps).to_string());
        }
        if !(sim.horizon > 0.0 && sim.horizon.is_finite()) {
            errors.push(format!("simulation.horizon must be positive, got {}", sim.horizon));
        }
        if let Err(e) = self.heston_params() {
            errors.push(format!("simulation: {e}"));
        }

        if surface.maturities.is_empty() {
            errors.push("surface.maturities is empty".to_string());
        }
        if let Some(t) = surface.maturities.iter().find(|t| !(**t > 0.0 && t.is_finite())) {
            errors.push(format!("surface.maturities must be positive, got {t}"));
        }
        if surface.deltas.is_empty() {
            errors.push("surface.deltas is empty".to_string());
        }
        if let Some(d) = surface.deltas.iter().find(|d| !d.is_finite()) {
            errors.push(format!("surface.deltas must be finite, got {d}"));
        }
        if !surface.rate.is_finite() {
            errors.push(format!("surface.rate must be finite, got {}", surface.rate));
        }
        if !(surface.min_vol > 0.0 && surface.min_vol.is_finite()) {
            errors.push(format!("surface.min_vol must be positive, got {}", surface.min_vol));
        }
        let [lower, upper] = surface.strike_bracket;
        if !(lower > 0.0 && lower < upper && upper.is_finite()) {
            errors.push(format!(
                "surface.strike_bracket must satisfy 0 < lower < upper, got [{lower}, {upper}]"
            ));
        }
        match (surface.smile_mode, &surface.template) {
            (SmileMode::Fitted, None) => {
                errors.push("surface.smile_mode = \"fitted\" requires [surface.template]".to_string())
            }
            (_, Some(template)) => {
                if let Err(e) = template.validate() {
                    errors.push(format!("surface.template: {e}"));
                }
            }
            (SmileMode::Anchored, None) => {}
        }

        if let Err(e) = self.smile_shape().validate() {
            errors.push(format!("smile: {e}"));
        }
        if self.smile.max_iterations == 0 {
            errors.push("smile.max_iterations must be at least 1".to_string());
        }

        if self.runtime.worker_threads == Some(0) {
            errors.push("runtime.worker_threads must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Simulation grid from `[simulation]`.
    pub fn simulation_config(&self) -> Result<SimulationConfig, ConfigError> {
        let sim = &self.simulation;
        let builder = SimulationConfig::builder()
            .n_paths(sim.n_paths)
            .n_steps(sim.n_steps)
            .horizon(sim.horizon);
        match sim.seed {
            Some(seed) => builder.seed(seed).build(),
            None => builder.build(),
        }
    }

    /// Heston dynamics from `[simulation]`.
    pub fn heston_params(&self) -> Result<HestonParams, SurfaceError> {
        let sim = &self.simulation;
        Ok(HestonParams::new(
            sim.spot, sim.v0, sim.theta, sim.kappa, sim.xi, sim.rho, sim.drift,
        )?)
    }

    /// Smile shape from `[smile]`.
    pub fn smile_shape(&self) -> SmileShape {
        SmileShape {
            beta: self.smile.beta,
            rho: self.smile.rho,
            nu: self.smile.nu,
        }
    }

    /// Calibrator from `[smile]`.
    pub fn smile_calibrator(&self) -> SmileCalibrator {
        SmileCalibrator::new(self.smile_shape())
            .with_expansion(self.smile.expansion)
            .with_lm_config(LMConfig {
                max_iterations: self.smile.max_iterations,
                ..LMConfig::default()
            })
    }

    /// Smile source from `[surface]`.
    pub fn smile_source(&self) -> Result<SmileSource, ConfigError> {
        match (self.surface.smile_mode, &self.surface.template) {
            (SmileMode::Anchored, _) => Ok(SmileSource::AtmAnchored),
            (SmileMode::Fitted, Some(template)) => Ok(SmileSource::Fitted(template.clone())),
            (SmileMode::Fitted, None) => Err(ConfigError::InvalidParameter {
                name: "surface.template",
                value: "required for fitted smiles".to_string(),
            }),
        }
    }

    /// Surface assembler over `oracle` configured from `[surface]` and
    /// `[smile]`.
    pub fn assembler<O: OptionOracle>(&self, oracle: O) -> Result<SurfaceAssembler<O>, SurfaceError> {
        let surface = &self.surface;
        let [lower, upper] = surface.strike_bracket;
        Ok(SurfaceAssembler::new(oracle)
            .with_strike_bracket(lower, upper)?
            .with_rate(surface.rate)
            .with_option_type(surface.option_type)
            .with_min_vol(surface.min_vol)
            .with_failure_policy(surface.failure_policy)
            .with_memoization(surface.memoize)
            .with_calibrator(self.smile_calibrator())
            .with_smile_source(self.smile_source()?))
    }
}

fn parse_env<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use volsim_models::analytical::BlackScholesOracle;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.n_steps, 252);
        assert_eq!(config.simulation.seed, None);
        assert_eq!(config.surface.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.surface.option_type, OptionType::Call);
        assert_eq!(config.surface.strike_bracket, [0.01, 3.0]);
        assert_eq!(config.smile.expansion, SabrExpansion::LeadingOrder);
        assert!(config.runtime.parallel);
        assert_eq!(config.heston_params().unwrap(), HestonParams::default());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
            [simulation]
            n_paths = 500
            n_steps = 100
            horizon = 0.5
            seed = 42
            kappa = 3.0

            [surface]
            maturities = [0.25, 1.0]
            deltas = [-0.25, -0.5]
            option_type = "P"
            rate = 0.03
            failure_policy = "mark_failed"
            memoize = false

            [smile]
            beta = 0.7
            expansion = "hagan"

            [runtime]
            worker_threads = 2
            parallel = false
        "#;

        let config = EngineConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.simulation.n_paths, 500);
        assert_eq!(config.simulation.seed, Some(42));
        assert_eq!(config.simulation.kappa, 3.0);
        // Unspecified Heston fields keep their defaults
        assert_eq!(config.simulation.v0, 0.04);
        assert_eq!(config.surface.option_type, OptionType::Put);
        assert_eq!(config.surface.failure_policy, FailurePolicy::MarkFailed);
        assert!(!config.surface.memoize);
        assert_eq!(config.smile.beta, 0.7);
        assert_eq!(config.smile.expansion, SabrExpansion::Hagan);
        assert_eq!(config.runtime.worker_threads, Some(2));

        let sim = config.simulation_config().unwrap();
        assert_eq!(sim.seed(), Some(42));
        assert!((sim.dt() - 0.005).abs() < 1e-15);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = EngineConfig::default();
        config.simulation.seed = Some(7);
        config.surface.smile_mode = SmileMode::Fitted;
        config.surface.template =
            Some(SmileTemplate::new(vec![0.9, 1.0, 1.1], vec![0.02, 0.0, 0.01]).unwrap());
        config.runtime.worker_threads = Some(3);

        let text = config.to_toml_string().unwrap();
        let parsed = EngineConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = EngineConfig::from_toml_str("[simulation]\nn_pathz = 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_bad_option_type_rejected() {
        let err = EngineConfig::from_toml_str("[surface]\noption_type = \"straddle\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validate_collects_all_violations() {
        let mut config = EngineConfig::default();
        config.simulation.n_paths = 0;
        config.simulation.rho = -2.0;
        config.surface.maturities = vec![];
        config.surface.strike_bracket = [3.0, 0.01];
        config.surface.smile_mode = SmileMode::Fitted;
        config.runtime.worker_threads = Some(0);

        match config.validate().unwrap_err() {
            ConfigError::Invalid(errors) => {
                assert_eq!(errors.len(), 6, "{errors:?}");
                assert!(errors.iter().any(|e| e.contains("path count")));
                assert!(errors.iter().any(|e| e.contains("strike_bracket")));
                assert!(errors.iter().any(|e| e.contains("template")));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[simulation]\nn_paths = 8\nseed = 1").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.simulation.n_paths, 8);
        assert_eq!(config.simulation.seed, Some(1));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::File(_)));
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::default()
            .apply_overrides(lookup(&[
                (ENV_SEED, "99"),
                (ENV_PATHS, " 64 "),
                (ENV_STEPS, "12"),
                (ENV_FAILURE_POLICY, "Mark-Failed"),
                (ENV_THREADS, "4"),
            ]))
            .unwrap();

        assert_eq!(config.simulation.seed, Some(99));
        assert_eq!(config.simulation.n_paths, 64);
        assert_eq!(config.simulation.n_steps, 12);
        assert_eq!(config.surface.failure_policy, FailurePolicy::MarkFailed);
        assert_eq!(config.runtime.worker_threads, Some(4));
    }

    #[test]
    fn test_env_override_errors() {
        let err = EngineConfig::default()
            .apply_overrides(lookup(&[(ENV_PATHS, "many")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Env {
                var: ENV_PATHS,
                value: "many".to_string()
            }
        );

        let err = EngineConfig::default()
            .apply_overrides(lookup(&[(ENV_FAILURE_POLICY, "ignore")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: ENV_FAILURE_POLICY, .. }));

        // Parses, but fails validation
        let err = EngineConfig::default()
            .apply_overrides(lookup(&[(ENV_STEPS, "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_assembler_from_config() {
        let mut config = EngineConfig::default();
        config.surface.failure_policy = FailurePolicy::MarkFailed;
        config.surface.smile_mode = SmileMode::Fitted;
        config.surface.template =
            Some(SmileTemplate::new(vec![1.0], vec![0.0]).unwrap());

        let assembler = config.assembler(BlackScholesOracle::new()).unwrap();
        assert_eq!(assembler.failure_policy(), FailurePolicy::MarkFailed);
        assert!(matches!(assembler.smile_source(), SmileSource::Fitted(_)));

        config.surface.strike_bracket = [0.0, 1.0];
        assert!(config
            .assembler(BlackScholesOracle::new())
            .unwrap_err()
            .is_invalid_parameter());
    }
}
