//! Protocol state of a single resource operation
//!
//! ```text
//! Received -> Validating -> Rejected
//!                        -> Accepted -> Committing -> Verified
//!                                                  -> Unverified
//! ```

use serde::Serialize;
use std::fmt;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolState {
    Received,
    Validating,
    Rejected,
    Accepted,
    Committing,
    Verified,
    Unverified,
}

impl ProtocolState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolState::Received => "RECEIVED",
            ProtocolState::Validating => "VALIDATING",
            ProtocolState::Rejected => "REJECTED",
            ProtocolState::Accepted => "ACCEPTED",
            ProtocolState::Committing => "COMMITTING",
            ProtocolState::Verified => "VERIFIED",
            ProtocolState::Unverified => "UNVERIFIED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProtocolState::Rejected | ProtocolState::Verified | ProtocolState::Unverified
        )
    }

    pub fn can_transition_to(&self, next: ProtocolState) -> bool {
        use ProtocolState::*;
        matches!(
            (*self, next),
            (Received, Validating)
                | (Validating, Rejected)
                | (Validating, Accepted)
                | (Accepted, Committing)
                | (Committing, Verified)
                | (Committing, Unverified)
        )
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one operation through the protocol
#[derive(Debug)]
pub struct ProtocolRun {
    resource: &'static str,
    id: String,
    state: ProtocolState,
}

impl ProtocolRun {
    pub fn new(resource: &'static str, id: impl Into<String>) -> Self {
        Self {
            resource,
            id: id.into(),
            state: ProtocolState::Received,
        }
    }

    /// Run for a commit call: the dispatcher has already seen an affirmative admission
    pub fn accepted(resource: &'static str, id: impl Into<String>) -> Self {
        Self {
            resource,
            id: id.into(),
            state: ProtocolState::Accepted,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn advance(&mut self, next: ProtocolState) -> ProtocolState {
        if self.state.can_transition_to(next) {
            debug!("{} {}: {} -> {}", self.resource, self.id, self.state, next);
            self.state = next;
        } else {
            error!(
                "{} {}: illegal transition {} -> {} ignored",
                self.resource, self.id, self.state, next
            );
            debug_assert!(false, "illegal protocol transition {} -> {}", self.state, next);
        }
        self.state
    }
}
