//! Typed errors for the update pipeline and the shared-data sync client.
//!
//! Library code returns these; the command layer wraps them in `anyhow` and
//! turns them into user-facing [`Message`](crate::libs::messages::Message)s.
//! The variants follow the failure classes the user has to tell apart:
//! "offline" ([`UpdateError::Network`]), "the server sent bad data"
//! ([`UpdateError::MalformedUpdateData`]), a misconfigured plaintext URL
//! ([`UpdateError::InsecureTransport`]) and a corrupted download
//! ([`UpdateError::Integrity`]).

use crate::libs::http::refused_redirect_target;
use std::path::PathBuf;

/// Convenient result alias for update operations.
pub type UpdateResult<T> = std::result::Result<T, UpdateError>;

/// Convenient result alias for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Errors raised while checking for, downloading or installing an update.
#[derive(thiserror::Error, Debug)]
pub enum UpdateError {
    /// Connectivity problem, timeout or non-success HTTP status. Retryable by the user.
    #[error("could not reach the update server: {0}")]
    Network(String),

    /// The server answered with a payload that does not have the expected shape.
    #[error("invalid update data received: {0}")]
    MalformedUpdateData(String),

    /// A version string is not `major.minor.patch`.
    #[error("malformed version '{0}'")]
    MalformedVersion(String),

    /// A configured URL, or a redirect target, does not use HTTPS.
    #[error("refusing insecure transport for '{0}': update URLs must use HTTPS")]
    InsecureTransport(String),

    /// The digest of downloaded content does not match the manifest.
    #[error("integrity check failed for {path}: expected {expected}, got {actual}")]
    Integrity {
        /// Manifest path of the file.
        path: String,
        /// Digest declared by the manifest.
        expected: String,
        /// Digest of the bytes actually written.
        actual: String,
    },

    /// Another update or sync operation is already running.
    #[error("another operation is already in progress: {0}")]
    Busy(String),

    /// Local filesystem failure.
    #[error("filesystem operation failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UpdateError {
    /// Wraps an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UpdateError::Io { path: path.into(), source }
    }

    /// Whether the failure is a connectivity problem rather than bad data.
    pub fn is_network(&self) -> bool {
        matches!(self, UpdateError::Network(_))
    }
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(target) = refused_redirect_target(&err) {
            UpdateError::InsecureTransport(target)
        } else if err.is_decode() {
            UpdateError::MalformedUpdateData(err.to_string())
        } else {
            UpdateError::Network(err.to_string())
        }
    }
}

/// Errors raised by the remote store client and the sync orchestrator.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    /// The hosted API answered with a non-success status.
    #[error("remote store error: {status} {reason}")]
    RemoteStore { status: u16, reason: String },

    /// Connectivity problem or timeout.
    #[error("could not reach the remote store: {0}")]
    Network(String),

    /// The API base, or a redirect target, does not use HTTPS.
    #[error("refusing insecure transport for '{0}': the remote store must use HTTPS")]
    InsecureTransport(String),

    /// The stored document could not be decoded or encoded.
    #[error("remote document could not be decoded: {0}")]
    Decode(String),

    /// Another update or sync operation is already running.
    #[error("another operation is already in progress: {0}")]
    Busy(String),

    /// Local filesystem failure.
    #[error("filesystem operation failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Wraps an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io { path: path.into(), source }
    }

    /// HTTP status carried by the error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::RemoteStore { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(target) = refused_redirect_target(&err) {
            SyncError::InsecureTransport(target)
        } else if err.is_decode() {
            SyncError::Decode(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}

impl From<base64::DecodeError> for SyncError {
    fn from(err: base64::DecodeError) -> Self {
        SyncError::Decode(err.to_string())
    }
}
