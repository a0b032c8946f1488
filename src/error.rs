use std::io;
use thiserror::Error;

/// Custom error type for the resguard application
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sampling failed: {0}")]
    Sampling(String),

    #[error("GPU not available: {0}")]
    GpuNotAvailable(String),

    #[error("No process matching '{0}' found")]
    ProcessNotFound(String),

    #[error("Process {0} no longer exists")]
    ProcessGone(u32),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for the resguard application
pub type Result<T> = std::result::Result<T, GuardError>;

impl GuardError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        GuardError::Config(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        GuardError::InvalidConfig(msg.into())
    }

    /// Create a sampling error
    pub fn sampling<S: Into<String>>(msg: S) -> Self {
        GuardError::Sampling(msg.into())
    }

    pub fn gpu_not_available<S: Into<String>>(msg: S) -> Self {
        GuardError::GpuNotAvailable(msg.into())
    }

    pub fn process_not_found<S: Into<String>>(name: S) -> Self {
        GuardError::ProcessNotFound(name.into())
    }

    /// Create a permission denied error
    pub fn permission_denied<S: Into<String>>(msg: S) -> Self {
        GuardError::PermissionDenied(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        GuardError::Other(msg.into())
    }
}
