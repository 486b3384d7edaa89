//! Typed helpers over [`SdnClientTrait`]
//!
//! The trait speaks [`ApiObject`] so it stays object-safe; these helpers
//! convert to and from the concrete model structs.

use crate::error::SdnError;
use crate::models::{ApiObject, BackendObject};
use crate::sdn_trait::SdnClientTrait;

fn unexpected_kind<T: BackendObject>(object: &ApiObject) -> SdnError {
    SdnError::Api(format!(
        "expected {} but controller returned {} {}",
        T::KIND,
        object.kind(),
        object.uuid()
    ))
}

fn downcast<T: BackendObject>(object: ApiObject) -> Result<T, SdnError> {
    let err = unexpected_kind::<T>(&object);
    T::from_api(object).ok_or(err)
}

/// Fetch an object of type `T` by uuid.
pub async fn find<T: BackendObject>(client: &dyn SdnClientTrait, uuid: &str) -> Result<Option<T>, SdnError> {
    match client.find_by_id(T::KIND, uuid).await? {
        Some(object) => downcast(object).map(Some),
        None => Ok(None),
    }
}

/// List objects of type `T` matching `filters`.
pub async fn list<T: BackendObject>(client: &dyn SdnClientTrait, filters: &[(&str, &str)]) -> Result<Vec<T>, SdnError> {
    client
        .list(T::KIND, filters)
        .await?
        .into_iter()
        .map(downcast)
        .collect()
}

/// Children of `parent_uuid` of type `T`.
pub async fn children<T: BackendObject>(client: &dyn SdnClientTrait, parent_uuid: &str) -> Result<Vec<T>, SdnError> {
    list(client, &[("parent_id", parent_uuid)]).await
}

/// Objects of type `T` holding a reference to `uuid`.
pub async fn back_refs<T: BackendObject>(client: &dyn SdnClientTrait, uuid: &str) -> Result<Vec<T>, SdnError> {
    list(client, &[("back_ref_id", uuid)]).await
}

/// Create `object`, returning the stored copy.
pub async fn create<T: BackendObject>(client: &dyn SdnClientTrait, object: T) -> Result<T, SdnError> {
    let stored = client.create(&object.into_api()).await?;
    downcast(stored)
}

/// Update `object`, returning the stored copy with its new version.
pub async fn update<T: BackendObject>(client: &dyn SdnClientTrait, object: T) -> Result<T, SdnError> {
    let stored = client.update(&object.into_api()).await?;
    downcast(stored)
}

/// Delete an object of type `T`; a missing object is not an error.
pub async fn delete<T: BackendObject>(client: &dyn SdnClientTrait, uuid: &str) -> Result<(), SdnError> {
    match client.delete(T::KIND, uuid).await {
        Err(SdnError::NotFound(_)) => Ok(()),
        other => other,
    }
}
