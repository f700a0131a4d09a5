//! Error types for the Tronbyt backend

use thiserror::Error;

/// Main error type for Tronbyt backend operations
///
/// Business-rule rejections in the pairing flow are *not* errors; they are
/// carried as `ClaimResult` values. This enum covers validation failures
/// and infrastructure faults only.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid device ID format. Must be 8 hex characters.")]
    InvalidDeviceId,

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using Tronbyt's Error
pub type Result<T> = std::result::Result<T, Error>;
