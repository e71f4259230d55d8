//! Runtime error types.

use thiserror::Error;
use tracing_subscriber::util::TryInitError;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A global subscriber was already installed.
    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] TryInitError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
