//! Integration tests for the SDN client
//!
//! These tests require a running SDN controller.
//! Set SDN_API_URL and SDN_API_TOKEN environment variables to run.

use sdn_client::{ObjectKind, SdnClient, SdnClientTrait};

fn client() -> SdnClient {
    let url = std::env::var("SDN_API_URL")
        .unwrap_or_else(|_| "http://localhost:8082".to_string());
    let token = std::env::var("SDN_API_TOKEN")
        .expect("SDN_API_TOKEN environment variable must be set");

    SdnClient::new(url, token).expect("Failed to create client")
}

#[tokio::test]
#[ignore] // Requires running SDN controller
async fn test_client_creation() {
    let client = client();
    assert!(client.validate_token().await.is_ok(), "Failed to validate token");
}

#[tokio::test]
#[ignore]
async fn test_list_projects() {
    let client = client();

    let projects = client.list(ObjectKind::Project, &[]).await
        .expect("Failed to list projects");

    println!("Found {} projects", projects.len());
}

#[tokio::test]
#[ignore]
async fn test_missing_network_is_none() {
    let client = client();

    let network = client
        .find_by_id(ObjectKind::VirtualNetwork, "00000000-0000-0000-0000-000000000000")
        .await
        .expect("Lookup failed");

    assert!(network.is_none());
}
