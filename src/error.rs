//! Error types for the tracker.
//!
//! Remote failures during list/settings mutations never become a
//! `TrackerError`: they are logged and reported as a replication outcome.
//! Only local storage failures, input validation and lookup failures
//! surface to callers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Failure talking to the remote list/settings store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Transport-level failure (DNS, connection refused, timeout).
    #[error("remote store unreachable: {0}")]
    Unreachable(String),

    /// The store answered with a non-success status code.
    #[error("remote store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The store answered with a payload we could not decode.
    #[error("unexpected response from remote store: {0}")]
    Decode(String),
}

/// Failure of the status lookup provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Called with an empty list of series; callers must guard against this.
    #[error("no series to look up")]
    NoSeries,

    /// The provider is not configured (missing API key or endpoint).
    #[error("status lookup is not configured: {0}")]
    Misconfigured(String),

    #[error("status provider unreachable: {0}")]
    Unreachable(String),

    #[error("status provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider answered but produced no usable text.
    #[error("status provider returned an empty response")]
    EmptyResponse,

    #[error("unexpected response from status provider: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("series name must not be empty")]
    EmptyName,

    #[error("'{0}' is already tracked")]
    Duplicate(String),

    /// The local cache could not persist a write. Nothing about the
    /// operation can be considered durable.
    #[error("local storage failure: {0:#}")]
    LocalStorage(anyhow::Error),

    #[error("status check failed: {0}")]
    Lookup(#[from] LookupError),
}

impl TrackerError {
    pub fn is_local_storage(&self) -> bool {
        matches!(self, TrackerError::LocalStorage(_))
    }
}
