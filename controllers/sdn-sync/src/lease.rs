//! Per-identifier leases
//!
//! An operation holds a lease on every identifier it touches (the resource's
//! own id and, for embedded resources, the parent aggregate's id) from
//! validation until its commit has been verified. A second operation on any
//! of those identifiers waits for the lease, bounded by a deadline.

use crate::sync_error::SyncError;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    held: Mutex<BTreeSet<String>>,
    released: Notify,
}

impl Inner {
    fn try_acquire(&self, keys: &BTreeSet<String>) -> bool {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if keys.iter().any(|k| held.contains(k)) {
            return false;
        }
        held.extend(keys.iter().cloned());
        true
    }

    fn release(&self, keys: &BTreeSet<String>) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            held.remove(key);
        }
        drop(held);
        self.released.notify_waiters();
    }
}

/// Table of identifiers currently leased by in-flight operations
#[derive(Debug, Clone, Default)]
pub struct LeaseTable {
    inner: Arc<Inner>,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lease all of `keys` at once, waiting up to `wait` for holders to finish.
    pub async fn acquire<I>(&self, keys: I, wait: Duration) -> Result<Lease, SyncError>
    where
        I: IntoIterator<Item = String>,
    {
        let keys: BTreeSet<String> = keys.into_iter().filter(|k| !k.is_empty()).collect();
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let released = self.inner.released.notified();
            tokio::pin!(released);
            // Register before checking so a release in between is not missed.
            released.as_mut().enable();

            if self.inner.try_acquire(&keys) {
                debug!("Leased {:?}", keys);
                return Ok(Lease {
                    inner: Arc::clone(&self.inner),
                    keys,
                });
            }

            if tokio::time::timeout_at(deadline, released).await.is_err() {
                return Err(SyncError::Conflict(format!(
                    "another operation holds {:?}",
                    keys
                )));
            }
        }
    }

    /// Identifiers currently leased
    pub fn held(&self) -> Vec<String> {
        self.inner
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// Held lease; released on drop
#[derive(Debug)]
pub struct Lease {
    inner: Arc<Inner>,
    keys: BTreeSet<String>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.inner.release(&self.keys);
    }
}
