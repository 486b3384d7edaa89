//! SdnClient trait for mocking
//!
//! This trait abstracts the SdnClient to enable mocking in unit tests.
//! The concrete SdnClient implements this trait, and tests can use mock implementations.

use crate::error::SdnError;
use crate::models::{ApiObject, ObjectKind};

/// Trait for SDN controller API operations
///
/// Handlers receive an instance of this trait at construction; there is no
/// process-wide connector. All async methods must be `Send` to work with
/// Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait SdnClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Validate the API token
    async fn validate_token(&self) -> Result<(), SdnError>;

    /// Look up an object by uuid. `Ok(None)` when it does not exist.
    async fn find_by_id(&self, kind: ObjectKind, uuid: &str) -> Result<Option<ApiObject>, SdnError>;

    /// Resolve `name` under `parent_uuid` to an object uuid.
    async fn find_by_name(&self, kind: ObjectKind, parent_uuid: &str, name: &str) -> Result<Option<String>, SdnError>;

    /// List objects of a kind.
    ///
    /// Supported filters: `parent_id`, `back_ref_id` (objects referencing the
    /// given uuid) and `name`.
    async fn list(&self, kind: ObjectKind, filters: &[(&str, &str)]) -> Result<Vec<ApiObject>, SdnError>;

    /// Create an object, returning it as stored (with its version).
    async fn create(&self, object: &ApiObject) -> Result<ApiObject, SdnError>;

    /// Replace an object. Fails with [`SdnError::VersionConflict`] if the
    /// stored version no longer matches `object.meta().version`.
    async fn update(&self, object: &ApiObject) -> Result<ApiObject, SdnError>;

    /// Delete an object by uuid.
    async fn delete(&self, kind: ObjectKind, uuid: &str) -> Result<(), SdnError>;
}
