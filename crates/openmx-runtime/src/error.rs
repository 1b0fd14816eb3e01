//! Runtime error types.

use openmx_sdk::MgmtError;
use std::path::PathBuf;

/// Errors that can occur while loading `openmx.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Config is not valid TOML or has unknown shapes
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Validation(String),
}

/// Errors that can occur while building or driving a runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Management error from a bean
    #[error("Management error: {0}")]
    Management(#[from] MgmtError),
}
