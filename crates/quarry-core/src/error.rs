use std::path::PathBuf;

use thiserror::Error;

/// Application-wide error type.
///
/// Variants map onto the failure classes of a harvest run. Fatal variants
/// abort the run; [`FetchError`] is kept separate because a failed term is
/// never fatal.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Term source unavailable at {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed term source: {0}")]
    MalformedInput(String),

    #[error("API client error: {0}")]
    ClientError(String),

    #[error("API error: HTTP {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns true when the run cannot continue after this error.
    ///
    /// Transport and API errors only ever affect a single term.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AppError::ClientError(_) | AppError::ApiError { .. })
    }
}

/// A single term could not be harvested during this run.
///
/// The orchestrator logs it and moves on; the term stays eligible for the
/// next run because no checkpoint is written.
#[derive(Error, Debug)]
#[error("Failed to fetch term '{term}': {source}")]
pub struct FetchError {
    pub term: String,
    #[source]
    pub source: AppError,
}

impl FetchError {
    pub fn new(term: impl Into<String>, source: AppError) -> Self {
        Self {
            term: term.into(),
            source,
        }
    }
}
