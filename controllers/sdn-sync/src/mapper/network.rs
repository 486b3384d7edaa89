//! Networks, subnets, floating IP pools and floating IPs

use super::{admin_state, assign, backend_name, project_child, rename};
use crate::handlers::HandlerContext;
use crate::sync_error::SyncError;
use ipnetwork::IpNetwork;
use sdn_client::{
    typed, AllocationPool, BackendObject, FloatingIp as BackendFloatingIp, FloatingIpPool, HostRoute, IpamSubnet,
    ObjectMeta, ObjectRef, Project, SdnClientTrait, VirtualMachineInterface, VirtualNetwork,
};
use std::net::IpAddr;
use tenant_resources::{FloatingIp, Network, Subnet};
use tracing::info;

pub const FLOATING_IP_POOL_NAME: &str = "floating-ip-pool";

pub fn network_to_backend(candidate: &Network, id: &str, project: &Project) -> VirtualNetwork {
    VirtualNetwork {
        meta: project_child(id, candidate.name.as_deref(), project),
        router_external: candidate.router_external.unwrap_or(false),
        is_shared: candidate.shared.unwrap_or(false),
        admin_state_up: admin_state(candidate.admin_state_up),
        ipam_subnets: Vec::new(),
    }
}

pub fn apply_network(network: &mut VirtualNetwork, candidate: &Network) -> bool {
    let mut changed = rename(&mut network.meta, candidate.name.as_deref());
    changed |= assign(&mut network.admin_state_up, candidate.admin_state_up.as_ref());
    changed |= assign(&mut network.is_shared, candidate.shared.as_ref());
    changed |= assign(&mut network.router_external, candidate.router_external.as_ref());
    changed
}

fn allocation_pools(candidate: &Subnet) -> Option<Vec<AllocationPool>> {
    candidate.allocation_pools.as_ref().map(|pools| {
        pools
            .iter()
            .map(|p| AllocationPool {
                start: p.start.clone(),
                end: p.end.clone(),
            })
            .collect()
    })
}

fn host_routes(candidate: &Subnet) -> Option<Vec<HostRoute>> {
    candidate.host_routes.as_ref().map(|routes| {
        routes
            .iter()
            .map(|r| HostRoute {
                prefix: r.destination.clone(),
                next_hop: r.nexthop.clone(),
            })
            .collect()
    })
}

pub fn subnet_to_entry(candidate: &Subnet, id: &str, cidr: &IpNetwork) -> IpamSubnet {
    IpamSubnet {
        subnet_uuid: id.to_string(),
        subnet_name: candidate.name.clone(),
        ip_prefix: cidr.network().to_string(),
        ip_prefix_len: cidr.prefix(),
        default_gateway: candidate.gateway_ip.clone(),
        enable_dhcp: candidate.enable_dhcp.unwrap_or(true),
        allocation_pools: allocation_pools(candidate).unwrap_or_default(),
        dns_nameservers: candidate.dns_nameservers.clone().unwrap_or_default(),
        host_routes: host_routes(candidate).unwrap_or_default(),
    }
}

/// Applies the mutable subnet fields. The gateway is only filled in if unset.
pub fn apply_subnet(entry: &mut IpamSubnet, candidate: &Subnet) -> bool {
    let mut changed = false;
    if candidate.name.is_some() && entry.subnet_name != candidate.name {
        entry.subnet_name = candidate.name.clone();
        changed = true;
    }
    if entry.default_gateway.is_none() && candidate.gateway_ip.is_some() {
        entry.default_gateway = candidate.gateway_ip.clone();
        changed = true;
    }
    changed |= assign(&mut entry.enable_dhcp, candidate.enable_dhcp.as_ref());
    changed |= assign(&mut entry.allocation_pools, allocation_pools(candidate).as_ref());
    changed |= assign(&mut entry.dns_nameservers, candidate.dns_nameservers.as_ref());
    changed |= assign(&mut entry.host_routes, host_routes(candidate).as_ref());
    changed
}

pub fn floating_ip_pool(network: &VirtualNetwork, id: &str) -> FloatingIpPool {
    FloatingIpPool {
        meta: ObjectMeta::new(id, FLOATING_IP_POOL_NAME, &network.meta.fq_name, Some(&network.meta.uuid)),
    }
}

pub async fn floating_ip_pools(client: &dyn SdnClientTrait, network_uuid: &str) -> Result<Vec<FloatingIpPool>, SyncError> {
    Ok(typed::children::<FloatingIpPool>(client, network_uuid).await?)
}

/// Floating IPs allocated from any pool of `network_uuid`
pub async fn floating_ips(client: &dyn SdnClientTrait, network_uuid: &str) -> Result<Vec<BackendFloatingIp>, SyncError> {
    let mut ips = Vec::new();
    for pool in floating_ip_pools(client, network_uuid).await? {
        ips.extend(typed::children::<BackendFloatingIp>(client, pool.uuid()).await?);
    }
    Ok(ips)
}

/// Creates the network's floating IP pool unless it already has one
pub async fn ensure_floating_ip_pool(ctx: &HandlerContext, network: &VirtualNetwork) -> Result<FloatingIpPool, SyncError> {
    if let Some(pool) = floating_ip_pools(ctx.client(), network.uuid()).await?.into_iter().next() {
        return Ok(pool);
    }
    let pool = floating_ip_pool(network, &crate::identifier::generate());
    let stored = typed::create(ctx.client(), pool).await?;
    info!("Created floating IP pool {} for external network {}", stored.uuid(), network.uuid());
    Ok(stored)
}

/// Deletes every floating IP pool of the network; returns how many were removed
pub async fn remove_floating_ip_pools(ctx: &HandlerContext, network_uuid: &str) -> Result<usize, SyncError> {
    let pools = floating_ip_pools(ctx.client(), network_uuid).await?;
    for pool in &pools {
        typed::delete::<FloatingIpPool>(ctx.client(), pool.uuid()).await?;
        info!("Deleted floating IP pool {} of network {}", pool.uuid(), network_uuid);
    }
    Ok(pools.len())
}

pub fn floating_ip_to_backend(
    candidate: &FloatingIp,
    id: &str,
    pool: &FloatingIpPool,
    project: &Project,
    address: IpAddr,
    port: Option<&VirtualMachineInterface>,
) -> BackendFloatingIp {
    BackendFloatingIp {
        meta: ObjectMeta::new(id, &backend_name(None, id), &pool.meta.fq_name, Some(&pool.meta.uuid)),
        address: address.to_string(),
        fixed_ip_address: port.and(candidate.fixed_ip_address.clone()),
        project_refs: vec![ObjectRef::to_meta(&project.meta)],
        virtual_machine_interface_refs: port.map(|p| vec![ObjectRef::to_meta(&p.meta)]).unwrap_or_default(),
    }
}

/// Points the floating IP at `port`, or disassociates it when `None`
pub fn associate(floating_ip: &mut BackendFloatingIp, port: Option<&VirtualMachineInterface>, fixed_ip: Option<&str>) -> bool {
    let refs = port.map(|p| vec![ObjectRef::to_meta(&p.meta)]).unwrap_or_default();
    let mut changed = super::assign_refs(&mut floating_ip.virtual_machine_interface_refs, refs);
    let fixed = port.and(fixed_ip.map(str::to_string));
    if floating_ip.fixed_ip_address != fixed {
        floating_ip.fixed_ip_address = fixed;
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdn_client::mock::Fixtures;
    use tenant_resources::{AllocationRange, Route};

    #[test]
    fn test_network_defaults() {
        let project = Fixtures::new("default-domain").project("p1", "demo");
        let candidate = Network {
            tenant_id: Some("p1".to_string()),
            ..Default::default()
        };
        let network = network_to_backend(&candidate, "n1", &project);
        assert_eq!(network.meta.name, "n1");
        assert_eq!(network.meta.fq_name, vec!["default-domain", "demo", "n1"]);
        assert_eq!(network.meta.parent_uuid.as_deref(), Some("p1"));
        assert!(network.admin_state_up);
        assert!(!network.router_external);
    }

    #[test]
    fn test_subnet_entry_and_gateway_fill_in() {
        let cidr: IpNetwork = "10.0.0.0/24".parse().unwrap();
        let candidate = Subnet {
            name: Some("sub".to_string()),
            cidr: Some("10.0.0.0/24".to_string()),
            allocation_pools: Some(vec![AllocationRange {
                start: "10.0.0.10".to_string(),
                end: "10.0.0.20".to_string(),
            }]),
            host_routes: Some(vec![Route {
                destination: "192.168.0.0/16".to_string(),
                nexthop: "10.0.0.254".to_string(),
            }]),
            ..Default::default()
        };
        let mut entry = subnet_to_entry(&candidate, "s1", &cidr);
        assert_eq!(entry.cidr(), "10.0.0.0/24");
        assert_eq!(entry.default_gateway, None);
        assert_eq!(entry.host_routes[0].next_hop, "10.0.0.254");

        let update = Subnet {
            gateway_ip: Some("10.0.0.1".to_string()),
            ..Default::default()
        };
        assert!(apply_subnet(&mut entry, &update));
        assert_eq!(entry.default_gateway.as_deref(), Some("10.0.0.1"));
        // Once set, a different gateway is not applied
        let again = Subnet {
            gateway_ip: Some("10.0.0.2".to_string()),
            ..Default::default()
        };
        assert!(!apply_subnet(&mut entry, &again));
        assert_eq!(entry.default_gateway.as_deref(), Some("10.0.0.1"));
    }
}
