//! Mock SdnClient for unit testing
//!
//! This module provides a mock implementation of SdnClientTrait that can be used
//! in unit tests without requiring a running SDN controller.
//!
//! The mock is organized into:
//! - `store.rs` - in-memory object store with optimistic versioning and filters
//! - `faults.rs` - fault injection (transport failures, concurrent writers,
//!   objects that only become visible after a few lookups)
//! - `helpers.rs` - builders for fixture objects

mod faults;
mod helpers;
mod store;

pub use faults::MockOperation;
pub use helpers::Fixtures;

use crate::error::SdnError;
use crate::models::{ApiObject, BackendObject, ObjectKind, Project};
use crate::sdn_trait::SdnClientTrait;
use faults::Faults;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) type ObjectStore = HashMap<ObjectKind, BTreeMap<String, ApiObject>>;

/// Mock SdnClient for testing
///
/// This mock stores objects in memory and can be configured to fail or
/// delay specific operations for testing different scenarios.
#[derive(Clone)]
pub struct MockSdnClient {
    pub(crate) base_url: String,
    pub(crate) objects: Arc<Mutex<ObjectStore>>,
    pub(crate) faults: Arc<Mutex<Faults>>,
    pub(crate) calls: Arc<Mutex<Vec<String>>>,
}

impl MockSdnClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Arc::new(Mutex::new(HashMap::new())),
            faults: Arc::new(Mutex::new(Faults::default())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn store(&self) -> MutexGuard<'_, ObjectStore> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn fault_state(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }

    /// Fixture builders rooted at this mock's domain
    pub fn fixtures(&self) -> Fixtures {
        Fixtures::new(store::DEFAULT_DOMAIN)
    }

    /// Add an object to the mock store (for test setup)
    pub fn add_object<T: BackendObject>(&self, object: T) {
        store::insert(self, object.into_api());
    }

    /// Add a project to the mock store (for test setup)
    pub fn add_project(&self, uuid: &str, name: &str) -> Project {
        let project = self.fixtures().project(uuid, name);
        self.add_object(project.clone());
        project
    }

    /// Add a project that stays invisible for the next `lookups` reads
    pub fn add_project_after_lookups(&self, uuid: &str, name: &str, lookups: u32) {
        let project = self.fixtures().project(uuid, name);
        self.fault_state().delay_visibility(project.into_api(), lookups);
    }

    /// Fetch a stored object (for test assertions)
    pub fn get<T: BackendObject>(&self, uuid: &str) -> Option<T> {
        self.store()
            .get(&T::KIND)
            .and_then(|objects| objects.get(uuid))
            .cloned()
            .and_then(T::from_api)
    }

    /// All stored objects of type `T` (for test assertions)
    pub fn all<T: BackendObject>(&self) -> Vec<T> {
        self.store()
            .get(&T::KIND)
            .map(|objects| objects.values().cloned().filter_map(T::from_api).collect())
            .unwrap_or_default()
    }

    /// Remove an object directly, bypassing fault injection
    pub fn remove(&self, kind: ObjectKind, uuid: &str) -> bool {
        self.store()
            .get_mut(&kind)
            .map(|objects| objects.remove(uuid).is_some())
            .unwrap_or(false)
    }

    /// Make every operation fail with `SdnError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.fault_state().unavailable = unavailable;
    }

    /// Fail the next `count` calls of `operation`
    pub fn fail_next(&self, operation: MockOperation, count: u32) {
        self.fault_state().fail_next(operation, count);
    }

    /// Simulate a concurrent writer on the next `count` updates
    pub fn conflict_next_updates(&self, count: u32) {
        self.fault_state().conflicting_updates = count;
    }

    /// Calls received so far, as `"<operation> <kind> <detail>"`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[async_trait::async_trait]
impl SdnClientTrait for MockSdnClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn validate_token(&self) -> Result<(), SdnError> {
        self.fault_state().check(MockOperation::FindById)
    }

    async fn find_by_id(&self, kind: ObjectKind, uuid: &str) -> Result<Option<ApiObject>, SdnError> {
        self.record(format!("find_by_id {} {}", kind, uuid));
        self.fault_state().check(MockOperation::FindById)?;
        store::find_by_id(self, kind, uuid)
    }

    async fn find_by_name(&self, kind: ObjectKind, parent_uuid: &str, name: &str) -> Result<Option<String>, SdnError> {
        self.record(format!("find_by_name {} {}/{}", kind, parent_uuid, name));
        self.fault_state().check(MockOperation::FindByName)?;
        Ok(store::list(self, kind, &[("parent_id", parent_uuid), ("name", name)])?
            .into_iter()
            .next()
            .map(|o| o.uuid().to_string()))
    }

    async fn list(&self, kind: ObjectKind, filters: &[(&str, &str)]) -> Result<Vec<ApiObject>, SdnError> {
        self.record(format!("list {} {:?}", kind, filters));
        self.fault_state().check(MockOperation::List)?;
        store::list(self, kind, filters)
    }

    async fn create(&self, object: &ApiObject) -> Result<ApiObject, SdnError> {
        self.record(format!("create {} {}", object.kind(), object.uuid()));
        self.fault_state().check(MockOperation::Create)?;
        store::create(self, object)
    }

    async fn update(&self, object: &ApiObject) -> Result<ApiObject, SdnError> {
        self.record(format!("update {} {}", object.kind(), object.uuid()));
        self.fault_state().check(MockOperation::Update)?;
        store::update(self, object)
    }

    async fn delete(&self, kind: ObjectKind, uuid: &str) -> Result<(), SdnError> {
        self.record(format!("delete {} {}", kind, uuid));
        self.fault_state().check(MockOperation::Delete)?;
        store::delete(self, kind, uuid)
    }
}
