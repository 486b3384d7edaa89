//! Referential integrity checks
//!
//! Pure field checks are free functions; checks that consult the backend live
//! on [`Validator`]. Policies chain them in order and stop at the first
//! failure.

use crate::backoff::{Cancellation, RetryPolicy};
use crate::sync_error::SyncError;
use sdn_client::{typed, BackendObject, ObjectMeta, Project, SdnClientTrait};
use std::fmt::Display;
use std::str::FromStr;
use tenant_resources::UnknownValue;
use tracing::{debug, info};

pub fn require<'a, T>(field: &str, value: &'a Option<T>) -> Result<&'a T, SyncError> {
    value.as_ref().ok_or_else(|| SyncError::missing(field))
}

pub fn require_non_empty<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str, SyncError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SyncError::missing(field)),
    }
}

pub fn require_enum<E>(field: &str, value: &Option<String>) -> Result<E, SyncError>
where
    E: FromStr<Err = UnknownValue>,
{
    let raw = require_non_empty(field, value)?;
    parse_enum(field, raw)
}

pub fn optional_enum<E>(field: &str, value: &Option<String>) -> Result<Option<E>, SyncError>
where
    E: FromStr<Err = UnknownValue>,
{
    value.as_deref().map(|raw| parse_enum(field, raw)).transpose()
}

fn parse_enum<E>(field: &str, raw: &str) -> Result<E, SyncError>
where
    E: FromStr<Err = UnknownValue>,
{
    raw.parse().map_err(|e: UnknownValue| SyncError::InvalidEnumValue {
        field: field.to_string(),
        value: e.value,
        allowed: e.allowed,
    })
}

pub fn require_range<T>(field: &str, value: T, min: T, max: T) -> Result<T, SyncError>
where
    T: PartialOrd + Display + Copy,
{
    if value < min || value > max {
        return Err(SyncError::range(field, format!("{} is not within {}..={}", value, min, max)));
    }
    Ok(value)
}

/// Rejects a delta that changes a field once it has been set
pub fn require_unchanged<T>(field: &str, delta: &Option<T>, current: &Option<T>) -> Result<(), SyncError>
where
    T: PartialEq,
{
    match (delta, current) {
        (Some(new), Some(old)) if new != old => Err(SyncError::immutable(field)),
        _ => Ok(()),
    }
}

/// Rejects `meta` unless it is owned by `project_uuid`
pub fn require_owner(meta: &ObjectMeta, project_uuid: &str, what: &str) -> Result<(), SyncError> {
    if meta.parent_uuid.as_deref() == Some(project_uuid) {
        Ok(())
    } else {
        Err(SyncError::OwnershipMismatch(format!(
            "{} {} does not belong to project {}",
            what, meta.uuid, project_uuid
        )))
    }
}

/// Checks that read the backend
pub struct Validator<'a> {
    client: &'a dyn SdnClientTrait,
    domain: &'a str,
    parent_wait: &'a RetryPolicy,
    cancel: &'a Cancellation,
}

impl<'a> Validator<'a> {
    pub fn new(
        client: &'a dyn SdnClientTrait,
        domain: &'a str,
        parent_wait: &'a RetryPolicy,
        cancel: &'a Cancellation,
    ) -> Self {
        Self {
            client,
            domain,
            parent_wait,
            cancel,
        }
    }

    /// The owning project, waiting with backoff for it to become visible.
    pub async fn project(&self, tenant_id: &str) -> Result<Project, SyncError> {
        let mut backoff = self.parent_wait.backoff();
        loop {
            if let Some(project) = typed::find::<Project>(self.client, tenant_id).await? {
                if project.meta.fq_name.first().map(String::as_str) != Some(self.domain) {
                    info!(
                        "Project {} is outside domain {} ({:?})",
                        tenant_id, self.domain, project.meta.fq_name
                    );
                    break;
                }
                return Ok(project);
            }
            debug!(
                "Project {} not visible yet (attempt {})",
                tenant_id,
                backoff.attempt()
            );
            if !backoff.wait(self.cancel).await.map_err(|_| SyncError::Cancelled)? {
                break;
            }
        }
        Err(SyncError::ParentNotFound {
            kind: "project".to_string(),
            id: tenant_id.to_string(),
        })
    }

    /// Rejects creation if an object with this id already exists
    pub async fn absent<T: BackendObject>(&self, id: &str) -> Result<(), SyncError> {
        if typed::find::<T>(self.client, id).await?.is_some() {
            return Err(SyncError::duplicate(T::KIND, id));
        }
        Ok(())
    }

    /// Rejects a name already used under `parent_uuid` by another object
    pub async fn unique_name<T: BackendObject>(
        &self,
        parent_uuid: &str,
        name: &str,
        except: Option<&str>,
    ) -> Result<(), SyncError> {
        match self.client.find_by_name(T::KIND, parent_uuid, name).await? {
            Some(existing) if Some(existing.as_str()) != except => {
                Err(SyncError::duplicate(T::KIND, &format!("{}/{}", parent_uuid, name)))
            }
            _ => Ok(()),
        }
    }

    /// The object being updated or deleted
    pub async fn existing<T: BackendObject>(&self, id: &str) -> Result<T, SyncError> {
        typed::find::<T>(self.client, id)
            .await?
            .ok_or_else(|| SyncError::ResourceNotFound {
                kind: T::KIND.to_string(),
                id: id.to_string(),
            })
    }

    /// The object a new resource is placed under
    pub async fn parent<T: BackendObject>(&self, id: &str) -> Result<T, SyncError> {
        typed::find::<T>(self.client, id)
            .await?
            .ok_or_else(|| SyncError::ParentNotFound {
                kind: T::KIND.to_string(),
                id: id.to_string(),
            })
    }

    /// An object named by a cross-resource reference field
    pub async fn reference<T: BackendObject>(&self, field: &str, id: &str) -> Result<T, SyncError> {
        typed::find::<T>(self.client, id)
            .await?
            .ok_or_else(|| SyncError::InvalidReference {
                field: field.to_string(),
                kind: T::KIND.to_string(),
                id: id.to_string(),
            })
    }

    /// Every referenced object in `ids`, looked up concurrently
    pub async fn references<T: BackendObject>(&self, field: &str, ids: &[String]) -> Result<Vec<T>, SyncError> {
        futures::future::try_join_all(ids.iter().map(|id| self.reference::<T>(field, id))).await
    }
}
