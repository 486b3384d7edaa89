//! In-memory object store for MockSdnClient
//!
//! Enforces the same optimistic concurrency rule as the controller: an
//! update must carry the version it read, and every write bumps it.

use super::MockSdnClient;
use crate::error::SdnError;
use crate::models::{ApiObject, ObjectKind};

pub(crate) const DEFAULT_DOMAIN: &str = "default-domain";

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub(crate) fn insert(client: &MockSdnClient, mut object: ApiObject) {
    let meta = object.meta_mut();
    meta.version = meta.version.max(1);
    meta.last_modified.get_or_insert_with(now);
    client
        .store()
        .entry(object.kind())
        .or_default()
        .insert(object.uuid().to_string(), object);
}

pub(crate) fn find_by_id(client: &MockSdnClient, kind: ObjectKind, uuid: &str) -> Result<Option<ApiObject>, SdnError> {
    let promoted = client.fault_state().observe_lookup(uuid);
    if let Some(object) = promoted {
        insert(client, object);
    }
    Ok(client
        .store()
        .get(&kind)
        .and_then(|objects| objects.get(uuid))
        .cloned())
}

fn matches(object: &ApiObject, filters: &[(&str, &str)]) -> Result<bool, SdnError> {
    for (key, value) in filters {
        let hit = match *key {
            "parent_id" => object.meta().parent_uuid.as_deref() == Some(*value),
            "back_ref_id" => object.refs().iter().any(|r| r.uuid == *value),
            "name" => object.meta().name == *value,
            other => {
                return Err(SdnError::InvalidRequest(format!("unsupported filter: {}", other)));
            }
        };
        if !hit {
            return Ok(false);
        }
    }
    Ok(true)
}

pub(crate) fn list(client: &MockSdnClient, kind: ObjectKind, filters: &[(&str, &str)]) -> Result<Vec<ApiObject>, SdnError> {
    let store = client.store();
    let mut results = Vec::new();
    if let Some(objects) = store.get(&kind) {
        for object in objects.values() {
            if matches(object, filters)? {
                results.push(object.clone());
            }
        }
    }
    Ok(results)
}

pub(crate) fn create(client: &MockSdnClient, object: &ApiObject) -> Result<ApiObject, SdnError> {
    let mut store = client.store();
    let objects = store.entry(object.kind()).or_default();
    if objects.contains_key(object.uuid()) {
        return Err(SdnError::Api(format!(
            "{} {} already exists",
            object.kind(),
            object.uuid()
        )));
    }

    let mut stored = object.clone();
    let meta = stored.meta_mut();
    meta.version = 1;
    meta.last_modified = Some(now());
    objects.insert(stored.uuid().to_string(), stored.clone());
    Ok(stored)
}

pub(crate) fn update(client: &MockSdnClient, object: &ApiObject) -> Result<ApiObject, SdnError> {
    let kind = object.kind();
    let uuid = object.uuid().to_string();
    let concurrent_write = client.fault_state().take_conflict();

    let mut store = client.store();
    let current = store
        .get_mut(&kind)
        .and_then(|objects| objects.get_mut(&uuid))
        .ok_or_else(|| SdnError::NotFound(format!("{} {} not found", kind, uuid)))?;

    if concurrent_write {
        // Someone else wrote first: their version wins, ours is stale.
        current.meta_mut().version += 1;
    }

    let expected = object.meta().version;
    let actual = current.meta().version;
    if expected != actual {
        return Err(SdnError::VersionConflict {
            kind,
            uuid,
            expected,
            actual,
        });
    }

    let mut stored = object.clone();
    let meta = stored.meta_mut();
    meta.version = actual + 1;
    meta.last_modified = Some(now());
    *current = stored.clone();
    Ok(stored)
}

pub(crate) fn delete(client: &MockSdnClient, kind: ObjectKind, uuid: &str) -> Result<(), SdnError> {
    client
        .store()
        .get_mut(&kind)
        .and_then(|objects| objects.remove(uuid))
        .map(|_| ())
        .ok_or_else(|| SdnError::NotFound(format!("{} {} not found", kind, uuid)))
}

#[cfg(test)]
mod tests {
    use crate::mock::MockSdnClient;
    use crate::models::{BackendObject, ObjectKind, VirtualNetwork};
    use crate::sdn_trait::SdnClientTrait;
    use crate::SdnError;

    #[tokio::test]
    async fn test_update_requires_current_version() {
        let mock = MockSdnClient::new("http://test-sdn");
        let project = mock.add_project("p1", "demo");
        let network = mock.fixtures().network(&project, "n1", "net1");
        let stored = mock.create(&network.into_api()).await.unwrap();
        assert_eq!(stored.meta().version, 1);

        let updated = mock.update(&stored).await.unwrap();
        assert_eq!(updated.meta().version, 2);

        // Writing the stale copy again loses.
        let err = mock.update(&stored).await.unwrap_err();
        assert!(matches!(
            err,
            SdnError::VersionConflict { expected: 1, actual: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_list_filters_by_parent_and_back_ref() {
        let mock = MockSdnClient::new("http://test-sdn");
        let project = mock.add_project("p1", "demo");
        let network = mock.fixtures().network(&project, "n1", "net1");
        mock.add_object(network.clone());
        mock.add_object(mock.fixtures().port(&project, &network, "port1"));

        let children = mock.list(ObjectKind::VirtualNetwork, &[("parent_id", "p1")]).await.unwrap();
        assert_eq!(children.len(), 1);
        let ports = mock
            .list(ObjectKind::VirtualMachineInterface, &[("back_ref_id", "n1")])
            .await
            .unwrap();
        assert_eq!(ports.len(), 1);
        assert!(mock.list(ObjectKind::VirtualNetwork, &[("color", "red")]).await.is_err());
        assert!(mock.get::<VirtualNetwork>("n1").is_some());
    }

    #[tokio::test]
    async fn test_conflicting_update_bumps_stored_version() {
        let mock = MockSdnClient::new("http://test-sdn");
        let project = mock.add_project("p1", "demo");
        mock.add_object(mock.fixtures().network(&project, "n1", "net1"));
        mock.conflict_next_updates(1);

        let current = mock.get::<VirtualNetwork>("n1").unwrap();
        assert!(mock.update(&current.clone().into_api()).await.is_err());

        let fresh = mock.get::<VirtualNetwork>("n1").unwrap();
        assert_eq!(fresh.meta.version, current.meta.version + 1);
        assert!(mock.update(&fresh.into_api()).await.is_ok());
    }
}
