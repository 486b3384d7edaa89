//! Failure taxonomy of a resource operation
//!
//! Every variant maps to exactly one status code. Admission failures are
//! reported to the dispatcher as that status; commit failures are carried in
//! the commit report.

use axum::http::StatusCode;
use sdn_client::SdnError;
use thiserror::Error;

/// Why a resource operation was refused or failed
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("field {field} is not a well-formed identifier: '{value}'")]
    InvalidIdentifier { field: String, value: String },

    #[error("required field {0} is missing")]
    MissingField(String),

    #[error("field {field}: {reason}")]
    MalformedValue { field: String, reason: String },

    #[error("field {field} has invalid value '{value}' (allowed: {allowed})")]
    InvalidEnumValue {
        field: String,
        value: String,
        allowed: String,
    },

    #[error("field {field} out of range: {reason}")]
    RangeViolation { field: String, reason: String },

    #[error("invalid combination: {0}")]
    InvalidCombination(String),

    #[error("field {field} cannot be changed")]
    ImmutableField { field: String },

    #[error("{kind} {id} not found")]
    ParentNotFound { kind: String, id: String },

    #[error("{kind} {id} not found")]
    ResourceNotFound { kind: String, id: String },

    #[error("{field} references unknown {kind} {id}")]
    InvalidReference { field: String, kind: String, id: String },

    #[error("ownership mismatch: {0}")]
    OwnershipMismatch(String),

    #[error("{kind} {key} already exists")]
    DuplicateResource { kind: String, key: String },

    #[error("{kind} entry {id} already present")]
    DuplicateEntry { kind: String, id: String },

    #[error("{kind} {id} still has {dependents}")]
    DependentsPresent {
        kind: String,
        id: String,
        dependents: String,
    },

    #[error("backend failure: {0}")]
    BackendTransport(SdnError),

    #[error("commit failed: {0}")]
    CommitFailure(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl SyncError {
    /// Status reported to the dispatcher for this failure
    pub fn status(&self) -> StatusCode {
        match self {
            SyncError::InvalidIdentifier { .. }
            | SyncError::MissingField(_)
            | SyncError::MalformedValue { .. }
            | SyncError::InvalidEnumValue { .. }
            | SyncError::RangeViolation { .. }
            | SyncError::InvalidCombination(_)
            | SyncError::ImmutableField { .. } => StatusCode::BAD_REQUEST,
            SyncError::ParentNotFound { .. } | SyncError::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            SyncError::InvalidReference { .. }
            | SyncError::OwnershipMismatch(_)
            | SyncError::DuplicateResource { .. }
            | SyncError::DependentsPresent { .. } => StatusCode::FORBIDDEN,
            SyncError::DuplicateEntry { .. } | SyncError::Conflict(_) => StatusCode::CONFLICT,
            SyncError::BackendTransport(_) | SyncError::CommitFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SyncError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn missing(field: &str) -> Self {
        SyncError::MissingField(field.to_string())
    }

    pub fn malformed(field: &str, reason: impl Into<String>) -> Self {
        SyncError::MalformedValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn range(field: &str, reason: impl Into<String>) -> Self {
        SyncError::RangeViolation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn immutable(field: &str) -> Self {
        SyncError::ImmutableField {
            field: field.to_string(),
        }
    }

    pub fn dependents(kind: impl ToString, id: &str, dependents: impl Into<String>) -> Self {
        SyncError::DependentsPresent {
            kind: kind.to_string(),
            id: id.to_string(),
            dependents: dependents.into(),
        }
    }

    pub fn duplicate(kind: impl ToString, key: &str) -> Self {
        SyncError::DuplicateResource {
            kind: kind.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<SdnError> for SyncError {
    fn from(err: SdnError) -> Self {
        match err {
            SdnError::VersionConflict { .. } => SyncError::Conflict(err.to_string()),
            other => SyncError::BackendTransport(other),
        }
    }
}
