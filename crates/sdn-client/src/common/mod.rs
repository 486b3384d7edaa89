//! Common utilities for the SDN controller API client
//!
//! Provides shared functionality used across all API modules.

pub mod query;

use crate::error::SdnError;
pub use crate::models::PaginatedResponse;
use reqwest::header::{ACCEPT, ETAG, IF_MATCH};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

/// HTTP client wrapper with authentication
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `path`; pagination links are already absolute
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
    }

    /// Send `request` and turn non-success statuses into errors
    async fn send(request: RequestBuilder, verb: &str, path: &str) -> Result<Response, SdnError> {
        let response = request.send().await.map_err(SdnError::Http)?;
        Self::check(response, verb, path).await
    }

    async fn check(response: Response, verb: &str, path: &str) -> Result<Response, SdnError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                SdnError::Authentication(format!("{} {} rejected: {} - {}", verb, path, status, body))
            }
            StatusCode::NOT_FOUND => SdnError::NotFound(format!("{} {}: {}", verb, path, body)),
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
                SdnError::Unavailable(format!("{} {} failed: {}", verb, path, status))
            }
            _ => SdnError::Api(format!("{} {} failed: {} - {}", verb, path, status, body)),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, SdnError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            SdnError::Api(format!(
                "cannot decode {}: {} - body starts with: {}",
                path,
                e,
                text.chars().take(500).collect::<String>()
            ))
        })
    }

    /// Follow `next` links until the collection is exhausted
    pub async fn fetch_all_pages<T: DeserializeOwned>(&self, mut url: String) -> Result<Vec<T>, SdnError> {
        let mut objects = Vec::new();
        loop {
            debug!("Fetching page: {}", url);
            let response = Self::send(self.request(Method::GET, &url), "GET", &url).await?;
            let page: PaginatedResponse<T> = Self::decode(response, &url).await?;
            objects.extend(page.results);
            match page.next {
                Some(next) => url = self.build_url(&next),
                None => return Ok(objects),
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SdnError> {
        let url = self.build_url(path);
        debug!("GET {}", url);
        let response = Self::send(self.request(Method::GET, &url), "GET", path).await?;
        Self::decode(response, path).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T, SdnError> {
        let url = self.build_url(path);
        debug!("POST {} with body: {}", url, body);
        let response = Self::send(self.request(Method::POST, &url).json(body), "POST", path).await?;
        Self::decode(response, path).await
    }

    /// PUT guarded by `If-Match: <version>`
    ///
    /// A `412 Precondition Failed` answer comes back as `Ok(Err(current))`,
    /// with the stored version taken from the `ETag` header.
    pub async fn put_if_match<T: DeserializeOwned>(
        &self,
        path: &str,
        version: u64,
        body: &serde_json::Value,
    ) -> Result<Result<T, u64>, SdnError> {
        let url = self.build_url(path);
        debug!("PUT {} (If-Match {}) with body: {}", url, version, body);
        let request = self
            .request(Method::PUT, &url)
            .header(IF_MATCH, version.to_string())
            .json(body);
        let response = request.send().await.map_err(SdnError::Http)?;

        if response.status() == StatusCode::PRECONDITION_FAILED {
            let current = response
                .headers()
                .get(ETAG)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim_matches('"').parse::<u64>().ok())
                .unwrap_or_default();
            return Ok(Err(current));
        }
        let response = Self::check(response, "PUT", path).await?;
        Ok(Ok(Self::decode(response, path).await?))
    }

    pub async fn delete(&self, path: &str) -> Result<(), SdnError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);
        Self::send(self.request(Method::DELETE, &url), "DELETE", path).await?;
        Ok(())
    }

    /// Encoded `k=v&...` query from filter pairs
    pub fn build_query_string(&self, filters: &[(&str, &str)]) -> String {
        filters
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http() -> HttpClient {
        HttpClient::new(Client::new(), "http://sdn:8082/".to_string(), "secret".to_string())
    }

    #[test]
    fn test_build_url_trims_trailing_slash() {
        let http = http();
        assert_eq!(http.base_url(), "http://sdn:8082");
        assert_eq!(http.build_url("/projects"), "http://sdn:8082/projects");
        assert_eq!(http.build_url("http://other/x"), "http://other/x");
    }

    #[test]
    fn test_query_string_is_encoded() {
        let http = http();
        assert_eq!(http.build_query_string(&[]), "");
        assert_eq!(
            http.build_query_string(&[("parent_id", "a b"), ("name", "net/1")]),
            "parent_id=a%20b&name=net%2F1"
        );
    }
}
