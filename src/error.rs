// src/error.rs
// =============================================================================
// One error type for the whole library.
//
// Each variant matches a failure kind the tool can hit:
// - Config: missing credentials or a bad environment value (fatal at startup)
// - Decode / Encode: the image pipeline could not read or write the bytes
// - Download: fetching a source image URL failed
// - Fetch: reading the table failed
// - Upload / Sign / Persist: the storage or database backend refused a write
// - Lookup: the signing call answered in a shape we do not understand
//
// Probe failures have no variant on purpose: the URL checker swallows them
// and reports `false` instead.
// =============================================================================

use thiserror::Error;

/// Every failure the library can report to the caller.
#[derive(Debug, Error)]
pub enum LinkerError {
    #[error("configuration error: {0}")]
    Config(String),

    /// A table row did not match the configured schema
    #[error("schema error: {0}")]
    Schema(String),

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("could not encode image: {0}")]
    Encode(String),

    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("upload of '{key}' failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("signing '{key}' failed: {reason}")]
    Sign { key: String, reason: String },

    #[error("could not load records: {0}")]
    Fetch(String),

    #[error("database update failed: {0}")]
    Persist(String),

    #[error("signed URL missing from response: {0}")]
    Lookup(String),

    #[error("no record with id {0}")]
    NotFound(String),

    /// The caller asked for something the configuration does not allow
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shorthand used across the crate.
pub type Result<T> = std::result::Result<T, LinkerError>;

impl From<image::ImageError> for LinkerError {
    fn from(error: image::ImageError) -> Self {
        match error {
            image::ImageError::Encoding(e) => LinkerError::Encode(e.to_string()),
            other => LinkerError::Decode(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for LinkerError {
    fn from(error: tokio::task::JoinError) -> Self {
        LinkerError::Task(error.to_string())
    }
}
