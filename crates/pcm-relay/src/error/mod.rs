use error_location::ErrorLocation;
use pcm_relay_core::PipelineError;
use thiserror::Error;

/// Daemon-level errors with source location tracking.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration could not be loaded, parsed or mapped.
    #[error("Config error: {reason} {location}")]
    ConfigError {
        /// Description of the configuration problem.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Fatal-record persistence could not be set up.
    #[error("Fatal store error: {reason} {location}")]
    FatalStoreError {
        /// Description of the persistence problem.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// An error surfaced from the pipeline library.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl From<std::io::Error> for AppError {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        AppError::ConfigError {
            reason: e.to_string(),
            location: ErrorLocation::from(std::panic::Location::caller()),
        }
    }
}

/// Result type alias using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
