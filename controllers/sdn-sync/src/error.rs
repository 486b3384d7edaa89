//! Controller-specific error types.
//!
//! Process-level failures: configuration, startup and serving. Failures of a
//! single resource operation are [`crate::sync_error::SyncError`] and never
//! escape a handler.

use sdn_client::SdnError;
use thiserror::Error;

/// Errors that can occur in the SDN sync controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// SDN controller API error
    #[error("SDN controller error: {0}")]
    Sdn(#[from] SdnError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Listener bind or serve failure
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}
