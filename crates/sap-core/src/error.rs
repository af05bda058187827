use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Neither text nor image was supplied, or a search was asked for zero hits.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Index file unreadable, malformed, or not aligned with its metadata.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("Query vector has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The provider could not be reached or did not answer in time.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider answered with a failure status or an undecodable body.
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// True for per-request failures of an external collaborator.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_) | Self::ProviderError(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
