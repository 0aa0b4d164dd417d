//! Configuration errors for the engine.

use thiserror::Error;
use volsim_core::types::SurfaceError;

/// Engine configuration error.
///
/// Raised by the simulation config builder, the TOML loader and the
/// environment override layer. Grid and value violations convert into
/// [`SurfaceError::InvalidParameter`]; file, parse and environment errors
/// into [`SurfaceError::Config`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Path count outside [1, 1_000_000].
    #[error("Invalid path count {0}: must be in range [1, 1_000_000]")]
    InvalidPathCount(usize),

    /// Step count outside [1, 10_000].
    #[error("Invalid step count {0}: must be in range [1, 10_000]")]
    InvalidStepCount(usize),

    /// Invalid parameter value with name and description.
    #[error("Invalid parameter '{name}': {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Description of the invalid value.
        value: String,
    },

    /// Config file could not be read.
    #[error("Configuration file error: {0}")]
    File(String),

    /// Config text is not valid TOML for the schema.
    #[error("Failed to parse TOML: {0}")]
    Parse(String),

    /// Environment override could not be parsed.
    #[error("Environment variable {var}={value} is invalid")]
    Env {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// One or more semantic violations.
    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl From<ConfigError> for SurfaceError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::File(_) | ConfigError::Parse(_) | ConfigError::Env { .. } => {
                SurfaceError::Config(err.to_string())
            }
            ConfigError::InvalidPathCount(_)
            | ConfigError::InvalidStepCount(_)
            | ConfigError::InvalidParameter { .. }
            | ConfigError::Invalid(_) => SurfaceError::InvalidParameter(err.to_string()),
        }
    }
}
