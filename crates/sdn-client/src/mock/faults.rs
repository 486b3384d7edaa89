//! Fault injection for MockSdnClient

use crate::error::SdnError;
use crate::models::ApiObject;
use std::collections::HashMap;

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    FindById,
    FindByName,
    List,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Default)]
pub(crate) struct Faults {
    pub(crate) unavailable: bool,
    failures: HashMap<MockOperation, u32>,
    /// Updates that will lose against a simulated concurrent writer
    pub(crate) conflicting_updates: u32,
    /// uuid -> (remaining invisible lookups, object)
    delayed: HashMap<String, (u32, ApiObject)>,
}

impl Faults {
    pub(crate) fn fail_next(&mut self, operation: MockOperation, count: u32) {
        self.failures.insert(operation, count);
    }

    /// Returns an error if `operation` should fail now.
    pub(crate) fn check(&mut self, operation: MockOperation) -> Result<(), SdnError> {
        if self.unavailable {
            return Err(SdnError::Unavailable("mock controller is down".to_string()));
        }
        if let Some(remaining) = self.failures.get_mut(&operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SdnError::Unavailable(format!("injected {:?} failure", operation)));
            }
        }
        Ok(())
    }

    pub(crate) fn delay_visibility(&mut self, object: ApiObject, lookups: u32) {
        self.delayed.insert(object.uuid().to_string(), (lookups, object));
    }

    /// Counts a lookup of `uuid`; returns the object once it has become visible.
    pub(crate) fn observe_lookup(&mut self, uuid: &str) -> Option<ApiObject> {
        let (remaining, _) = self.delayed.get_mut(uuid)?;
        if *remaining > 0 {
            *remaining -= 1;
            return None;
        }
        self.delayed.remove(uuid).map(|(_, object)| object)
    }

    /// Consumes one simulated concurrent write, if any are pending.
    pub(crate) fn take_conflict(&mut self) -> bool {
        if self.conflicting_updates > 0 {
            self.conflicting_updates -= 1;
            true
        } else {
            false
        }
    }
}
