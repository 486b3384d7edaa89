//! SDN Controller REST API Client
//!
//! A Rust client library for the SDN controller that holds the authoritative
//! object graph for tenant networking (projects, virtual networks, interfaces,
//! routers, security groups, load balancer objects).
//!
//! # Example
//!
//! ```no_run
//! use sdn_client::{SdnClient, SdnClientTrait, VirtualNetwork};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SdnClient::new(
//!     "http://sdn-api:8082".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! // Fetch a network by uuid
//! let network: Option<VirtualNetwork> =
//!     sdn_client::typed::find(&client, "6b9570f2-17b1-4fc3-99ec-1b7f7778a29a").await?;
//!
//! // Resolve a name within a project
//! let id = client
//!     .find_by_name(sdn_client::ObjectKind::VirtualNetwork, "0f2e1d3c-4b5a-6978-8a9b-0c1d2e3f4a5b", "net1")
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Generic object API**: find by id or name, list with filters, create, update, delete
//! - **Optimistic concurrency**: updates carry the version they read (`If-Match`)
//! - **Pagination**: list calls follow `next` links
//! - **Mocking**: `MockSdnClient` behind the `test-util` feature

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod sdn_trait;
pub mod typed;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::SdnClient;
pub use common::HttpClient;
pub use error::SdnError;
pub use models::*;
pub use sdn_trait::SdnClientTrait;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{Fixtures, MockOperation, MockSdnClient};
