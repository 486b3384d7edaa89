//! Query utilities for the SDN controller API
//!
//! Provides helpers for building object paths and handling pagination.

use crate::common::{HttpClient, PaginatedResponse};
use crate::error::SdnError;
use crate::models::ObjectKind;
use serde::Deserialize;

/// Path of a single object: `/virtual-network/<uuid>`
pub fn object_path(kind: ObjectKind, uuid: &str) -> String {
    format!("/{}/{}", kind, urlencoding::encode(uuid))
}

/// Path of a collection: `/virtual-networks`
pub fn collection_path(kind: ObjectKind) -> String {
    format!("/{}s", kind)
}

/// Query objects with optional filtering and pagination
pub async fn query_objects<T: for<'de> Deserialize<'de>>(
    http: &HttpClient,
    kind: ObjectKind,
    filters: &[(&str, &str)],
    fetch_all: bool,
) -> Result<Vec<T>, SdnError> {
    let mut url = collection_path(kind);

    if !filters.is_empty() {
        let query_string = http.build_query_string(filters);
        url = format!("{}?{}", url, query_string);
    }

    if fetch_all {
        http.fetch_all_pages(http.build_url(&url)).await
    } else {
        let response: PaginatedResponse<T> = http.get(&url).await?;
        Ok(response.results)
    }
}
