//! Remote store error handling
//!
//! Typed errors for blob operations against a remote store, shared by the
//! WebDAV, local-directory and in-memory stores.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by a [`RemoteStore`](super::RemoteStore)
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The blob does not exist
    #[error("Not found: '{path}'")]
    NotFound { path: String },

    /// The server answered with an unexpected status
    #[error("{method} '{path}' failed: HTTP {status} {body}")]
    Http {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    /// Rename target exists and overwriting was not allowed
    #[error("Refusing to overwrite '{path}'")]
    AlreadyExists { path: String },

    /// Request could not be sent or the response could not be read
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local filesystem error
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configured server URL cannot be used
    #[error("Invalid URL '{url}': {details}")]
    InvalidUrl { url: String, details: String },

    /// A trusted certificate could not be loaded
    #[error("Unable to load CA certificate '{path}': {details}")]
    Certificate { path: PathBuf, details: String },

    /// Request could not be built
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Internal lock was poisoned
    #[error("Lock error: {0}")]
    Lock(String),
}

impl RemoteError {
    /// Create an error from an I/O error with path context
    ///
    /// `NotFound` keeps its meaning so callers can treat it as absence.
    pub fn from_io(error: io::Error, path: PathBuf, remote_path: &str) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => RemoteError::NotFound {
                path: remote_path.to_string(),
            },
            _ => RemoteError::Io {
                path,
                source: error,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

/// Result type for remote store operations
pub type RemoteResult<T> = Result<T, RemoteError>;
