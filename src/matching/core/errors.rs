//! Error types for the matching engine.

use thiserror::Error;

/// Matching engine error type.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Latitude/longitude outside the valid range or non-finite.
    #[error("invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate {
        /// Latitude that failed validation.
        lat: f64,
        /// Longitude that failed validation.
        lon: f64,
    },
    /// A persisted timestamp could not be interpreted.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// An item snapshot failed validation.
    #[error("invalid item: {0}")]
    InvalidItem(String),
    /// Candidate retrieval failed; the ranking call cannot proceed.
    #[error("candidate retrieval failed: {0}")]
    Retrieval(String),
    /// Match persistence failed; ranked results are still usable.
    #[error("match persistence failed: {0}")]
    Persistence(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for matching operations.
pub type MatchResult<T> = Result<T, MatchError>;
