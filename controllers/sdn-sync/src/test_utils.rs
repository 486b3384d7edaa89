//! Shared fixtures for handler tests

use crate::backoff::RetryPolicy;
use crate::config::Config;
use crate::handlers::{HandlerContext, ResourceHandler, ResourcePolicy};
use crate::metrics::SyncMetrics;
use sdn_client::{MockSdnClient, SdnClientTrait};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const TENANT: &str = "0f2e1d3c-4b5a-6978-8a9b-0c1d2e3f4a5b";
pub const OTHER_TENANT: &str = "1a2b3c4d-5e6f-4a8b-9c0d-1e2f3a4b5c6d";
pub const NETWORK: &str = "6b9570f2-17b1-4fc3-99ec-1b7f7778a29a";
pub const OTHER_NETWORK: &str = "7c0681a3-28c2-4ad4-8afd-2c808889b3ab";
pub const EXTERNAL_NETWORK: &str = "8d1792b4-39d3-4be5-9b0e-3d919990c4bc";
pub const SUBNET: &str = "9e28a3c5-4ae4-4cf6-8c1f-4ea2aaa1d5cd";
pub const OTHER_SUBNET: &str = "af39b4d6-5bf5-4d07-9d20-5fb3bbb2e6de";
pub const PORT: &str = "b04ac5e7-6c06-4e18-8e31-60c4ccc3f7ef";
pub const OTHER_PORT: &str = "c15bd6f8-7d17-4f29-9f42-71d5ddd40800";
pub const DEVICE: &str = "d26ce709-8e28-4a3a-8a53-82e6eee51911";
pub const ROUTER: &str = "e37df81a-9f39-4b4b-9b64-93f7fff62a22";
pub const GROUP: &str = "f48e092b-a04a-4c5c-8c75-a40800073b33";
pub const OTHER_GROUP: &str = "059f1a3c-b15b-4d6d-9d86-b51911184c44";
pub const RULE: &str = "16a02b4d-c26c-4e7e-8e97-c62a22295d55";
pub const POOL: &str = "27b13c5e-d37d-4f8f-9fa8-d73b333a6e66";
pub const MEMBER: &str = "38c24d6f-e48e-4090-80b9-e84c444b7f77";
pub const MONITOR: &str = "49d35e70-f59f-41a1-91ca-f95d555c8088";
pub const LISTENER: &str = "5ae46f81-06a0-42b2-a2db-0a6e666d9199";
pub const FLOATING_IP: &str = "6bf57092-17b1-43c3-b3ec-1b7f777ea2aa";

/// Context over `client` with millisecond waits
pub fn test_context(client: Arc<dyn SdnClientTrait>) -> HandlerContext {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("SDN_API_TOKEN", "test-token"),
        ("PARENT_WAIT_ATTEMPTS", "2"),
        ("PARENT_WAIT_INITIAL_MS", "1"),
        ("PARENT_WAIT_MAX_MS", "1"),
        ("LEASE_WAIT_MS", "50"),
    ]);
    let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
    let metrics = Arc::new(SyncMetrics::new().unwrap());
    let mut ctx = HandlerContext::new(client, &config, metrics);
    ctx.commit_retry = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1));
    ctx
}

/// Handler for `policy` over a fresh context on `mock`
pub fn test_handler<P: ResourcePolicy>(mock: &MockSdnClient, policy: P) -> ResourceHandler<P> {
    ResourceHandler::new(Arc::new(test_context(Arc::new(mock.clone()))), policy)
}

/// Mock backend with the tenant project already present
pub fn mock_with_tenant() -> MockSdnClient {
    let mock = MockSdnClient::new("http://test-sdn");
    mock.add_project(TENANT, "demo");
    mock
}
