//! Optimistic read-modify-write
//!
//! The backend stores subnets and security rules as list attributes of their
//! parent, so adding or removing one rewrites the whole list. Every write
//! carries the version it read; a write that lost a race is rejected by the
//! backend and redone on fresh state, up to the commit retry budget.

use crate::handlers::HandlerContext;
use crate::sync_error::SyncError;
use sdn_client::{typed, BackendObject, IpamSubnet, PolicyRule, SecurityGroup, VirtualNetwork};
use tracing::{debug, warn};

/// A backend object holding a list of embedded entries
pub trait EmbeddedList<E>: BackendObject {
    fn entries(&self) -> &Vec<E>;
    fn entries_mut(&mut self) -> &mut Vec<E>;
}

impl EmbeddedList<IpamSubnet> for VirtualNetwork {
    fn entries(&self) -> &Vec<IpamSubnet> {
        &self.ipam_subnets
    }

    fn entries_mut(&mut self) -> &mut Vec<IpamSubnet> {
        &mut self.ipam_subnets
    }
}

impl EmbeddedList<PolicyRule> for SecurityGroup {
    fn entries(&self) -> &Vec<PolicyRule> {
        &self.rules
    }

    fn entries_mut(&mut self) -> &mut Vec<PolicyRule> {
        &mut self.rules
    }
}

/// Applies `edit` to the current state of `uuid` and writes it back.
///
/// `edit` returns whether it changed anything; unchanged objects are not
/// written. On a version conflict the object is re-read and `edit` re-applied.
pub async fn mutate<T, F>(ctx: &HandlerContext, uuid: &str, mut edit: F) -> Result<T, SyncError>
where
    T: BackendObject,
    F: FnMut(&mut T) -> Result<bool, SyncError> + Send,
{
    let mut backoff = ctx.commit_retry.backoff();
    loop {
        let mut current = typed::find::<T>(ctx.client(), uuid)
            .await?
            .ok_or_else(|| SyncError::ResourceNotFound {
                kind: T::KIND.to_string(),
                id: uuid.to_string(),
            })?;

        if !edit(&mut current)? {
            debug!("{} {} already up-to-date", T::KIND, uuid);
            return Ok(current);
        }

        let version = current.meta().version;
        match typed::update(ctx.client(), current).await {
            Ok(stored) => return Ok(stored),
            Err(e) if e.is_version_conflict() => {
                warn!(
                    "{} {} changed since version {} (attempt {}), retrying on fresh state",
                    T::KIND,
                    uuid,
                    version,
                    backoff.attempt()
                );
                if !backoff.wait(&ctx.cancel).await.map_err(|_| SyncError::Cancelled)? {
                    return Err(SyncError::Conflict(format!(
                        "{} {} kept changing; gave up after {} attempts",
                        T::KIND,
                        uuid,
                        backoff.attempt()
                    )));
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// [`mutate`] restricted to the parent's embedded list
pub async fn mutate_embedded<P, E, F>(ctx: &HandlerContext, parent_uuid: &str, mut edit: F) -> Result<P, SyncError>
where
    P: EmbeddedList<E>,
    E: Send,
    F: FnMut(&mut Vec<E>) -> Result<bool, SyncError> + Send,
{
    mutate::<P, _>(ctx, parent_uuid, |parent| edit(parent.entries_mut())).await
}
