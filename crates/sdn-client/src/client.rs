//! SDN controller API client
//!
//! Implements the controller's REST API over the generic object model:
//! `/<kind>/<uuid>` for single objects and `/<kind>s` for collections.

use crate::common::query::{collection_path, object_path, query_objects};
use crate::common::HttpClient;
use crate::error::SdnError;
use crate::models::{ApiObject, ObjectKind};
use crate::sdn_trait::SdnClientTrait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// SDN controller API client
pub struct SdnClient {
    http: HttpClient,
}

impl SdnClient {
    /// Create a new SDN controller client
    ///
    /// # Arguments
    /// * `base_url` - Controller base URL (e.g., "http://sdn-api:8082")
    /// * `token` - API token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, SdnError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(SdnError::Http)?;

        Ok(Self {
            http: HttpClient::new(client, base_url, token),
        })
    }
}

#[async_trait::async_trait]
impl SdnClientTrait for SdnClient {
    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Validate the API token by making a simple authenticated request.
    async fn validate_token(&self) -> Result<(), SdnError> {
        debug!("Validating SDN controller token and connectivity");
        let _: serde_json::Value = self.http.get("/").await?;
        debug!("Token validated successfully");
        Ok(())
    }

    async fn find_by_id(&self, kind: ObjectKind, uuid: &str) -> Result<Option<ApiObject>, SdnError> {
        debug!("Fetching {} {} from controller", kind, uuid);
        match self.http.get::<ApiObject>(&object_path(kind, uuid)).await {
            Ok(object) => Ok(Some(object)),
            Err(SdnError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_by_name(&self, kind: ObjectKind, parent_uuid: &str, name: &str) -> Result<Option<String>, SdnError> {
        debug!("Resolving {} named {} under {}", kind, name, parent_uuid);
        let matches = self.list(kind, &[("parent_id", parent_uuid), ("name", name)]).await?;
        Ok(matches.into_iter().next().map(|o| o.uuid().to_string()))
    }

    async fn list(&self, kind: ObjectKind, filters: &[(&str, &str)]) -> Result<Vec<ApiObject>, SdnError> {
        debug!("Querying {} with filters: {:?}", kind, filters);
        query_objects(&self.http, kind, filters, true).await
    }

    async fn create(&self, object: &ApiObject) -> Result<ApiObject, SdnError> {
        let body = serde_json::to_value(object)?;
        debug!("Creating {} {}", object.kind(), object.uuid());
        self.http.post(&collection_path(object.kind()), &body).await
    }

    async fn update(&self, object: &ApiObject) -> Result<ApiObject, SdnError> {
        let kind = object.kind();
        let uuid = object.uuid();
        let expected = object.meta().version;
        let body = serde_json::to_value(object)?;
        debug!("Updating {} {} at version {}", kind, uuid, expected);

        match self.http.put_if_match(&object_path(kind, uuid), expected, &body).await? {
            Ok(stored) => Ok(stored),
            Err(actual) => Err(SdnError::VersionConflict {
                kind,
                uuid: uuid.to_string(),
                expected,
                actual,
            }),
        }
    }

    async fn delete(&self, kind: ObjectKind, uuid: &str) -> Result<(), SdnError> {
        debug!("Deleting {} {}", kind, uuid);
        self.http.delete(&object_path(kind, uuid)).await
    }
}
