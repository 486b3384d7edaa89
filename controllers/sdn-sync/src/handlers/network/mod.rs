//! Network resource policies
//!
//! Handles: Network, Subnet (embedded in its network), Port, Router, FloatingIp

pub mod floating_ip;
pub mod network;
pub mod port;
pub mod router;
pub mod subnet;

#[cfg(test)]
mod network_test;
#[cfg(test)]
mod port_test;
#[cfg(test)]
mod router_test;

pub use floating_ip::FloatingIpPolicy;
pub use network::NetworkPolicy;
pub use port::PortPolicy;
pub use router::RouterPolicy;
pub use subnet::SubnetPolicy;

use crate::sync_error::SyncError;
use sdn_client::{ObjectRef, VirtualNetwork};

/// Tenants may attach to their own networks and to shared ones
fn require_attachable(network: &VirtualNetwork, tenant: &str) -> Result<(), SyncError> {
    if network.is_shared || network.meta.parent_uuid.as_deref() == Some(tenant) {
        return Ok(());
    }
    Err(SyncError::OwnershipMismatch(format!(
        "network {} is neither owned by project {} nor shared",
        network.meta.uuid, tenant
    )))
}

fn first_ref(refs: &[ObjectRef]) -> Option<String> {
    refs.first().map(|r| r.uuid.clone())
}
