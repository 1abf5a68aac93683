//! Error types for toolkit-core

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// An explicitly requested config file does not exist.
    #[error("config file not found: {path}")]
    Missing {
        /// The path that was requested.
        path: Utf8PathBuf,
    },

    /// Configuration file not found after searching all locations.
    #[error("no configuration file found (looked for .toolkit.yml)")]
    NotFound,
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
