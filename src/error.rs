//! Error taxonomy for dscbridge
//!
//! Fatal categories abort the whole invocation with a distinguished exit
//! code. Recoverable conditions (stale cache, old schema) are handled by
//! rebuilding the cache and never appear here.

use thiserror::Error;

/// Exit code used when an error escapes without a specific mapping.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, Error)]
pub enum DscBridgeError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Provider failure: {0}")]
    Provider(String),

    #[error("Unrecognized implementation kind: {0}")]
    UnrecognizedKind(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DscBridgeError {
    /// Process exit code for this error category.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Input(_) | Self::Json(_) => 2,
            Self::ResourceNotFound(_) => 3,
            Self::UnsupportedPlatform(_) => 4,
            Self::Provider(_) => 5,
            Self::UnrecognizedKind(_) => 6,
            Self::Io(_) => EXIT_FAILURE,
        }
    }
}
