//! SDN client errors

use crate::models::ObjectKind;
use thiserror::Error;

/// Errors that can occur when interacting with the SDN controller API
#[derive(Debug, Error)]
pub enum SdnError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Controller API returned an error
    #[error("SDN API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (invalid token, expired, etc.)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., missing required fields, unknown filter)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The stored object changed since it was read
    #[error("Version conflict on {kind} {uuid}: expected version {expected}, found {actual}")]
    VersionConflict {
        kind: ObjectKind,
        uuid: String,
        expected: u64,
        actual: u64,
    },

    /// Controller unreachable or refusing requests
    #[error("SDN controller unavailable: {0}")]
    Unavailable(String),
}

impl SdnError {
    /// True for errors raised by the optimistic version check.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, SdnError::VersionConflict { .. })
    }

    /// True when the target object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SdnError::NotFound(_))
    }
}
