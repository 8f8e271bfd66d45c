//! Error types for catalog sync operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while mirroring the catalog.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport-level failure (DNS, connect, reset, timeout, truncated body).
    #[error("Network error requesting {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The stage listing answered with a non-success status.
    #[error("Catalog unavailable: {url} returned HTTP {status}")]
    CatalogUnavailable {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The server answered with a non-success status.
    #[error("Request to {url} failed with HTTP {status}")]
    HttpError {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The response body was not the JSON shape we expect.
    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// A file-content response carried no `content` payload.
    #[error("No 'content' field found in response for {url}")]
    ContentFieldMissing { url: String },

    /// Directory creation, read or write failure in the mirror.
    #[error("Filesystem error at {}: {source}", .path.display())]
    FilesystemError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A server-supplied name cannot be used as a single path component.
    #[error("Refusing to use {0:?} as a path component")]
    UnsafePathComponent(String),

    /// HTTP client construction error.
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization error.
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl SyncError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::FilesystemError {
            path: path.into(),
            source,
        }
    }
}
