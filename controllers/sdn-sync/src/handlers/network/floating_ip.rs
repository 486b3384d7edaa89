//! Floating IP policy
//!
//! Floating IPs live in the floating IP pool of an external network. The
//! address is allocated from the network's subnets unless one is requested.

use super::first_ref;
use crate::handlers::{candidate_id, target_id, HandlerContext, ResourcePolicy};
use crate::identifier;
use crate::ipam;
use crate::mapper::{self, network as map, port as map_port};
use crate::sync_error::SyncError;
use crate::validator::{require_owner, require_unchanged};
use async_trait::async_trait;
use sdn_client::{
    typed, BackendObject, FloatingIp as BackendFloatingIp, FloatingIpPool, InstanceIp, VirtualMachineInterface,
    VirtualNetwork,
};
use std::collections::HashSet;
use std::net::IpAddr;
use tenant_resources::FloatingIp;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct FloatingIpPolicy;

/// An external network with its floating IP pool
async fn floating_network(ctx: &HandlerContext, network_id: &str) -> Result<(VirtualNetwork, FloatingIpPool), SyncError> {
    let network = ctx.validator().parent::<VirtualNetwork>(network_id).await?;
    if !network.router_external {
        return Err(SyncError::InvalidCombination(format!(
            "network {} is not external",
            network_id
        )));
    }
    let pool = map::floating_ip_pools(ctx.client(), network_id)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            SyncError::InvalidCombination(format!("network {} has no floating IP pool", network_id))
        })?;
    Ok((network, pool))
}

/// Network the floating IP was allocated from
async fn network_of(ctx: &HandlerContext, floating_ip: &BackendFloatingIp) -> Result<Option<String>, SyncError> {
    let Some(pool_uuid) = floating_ip.meta.parent_uuid.as_deref() else {
        return Ok(None);
    };
    Ok(typed::find::<FloatingIpPool>(ctx.client(), pool_uuid)
        .await?
        .and_then(|pool| pool.meta.parent_uuid))
}

/// A requested address: inside one of the network's subnets and not in use
async fn require_free_address(ctx: &HandlerContext, network: &VirtualNetwork, raw: &str) -> Result<IpAddr, SyncError> {
    let address = ipam::parse_ip("floatingIpAddress", raw)?;
    let inside = network
        .ipam_subnets
        .iter()
        .any(|s| ipam::subnet_network(s).map(|net| net.contains(address)).unwrap_or(false));
    if !inside {
        return Err(SyncError::range(
            "floatingIpAddress",
            format!("{} is not inside any subnet of network {}", address, network.uuid()),
        ));
    }
    if map_port::used_addresses(ctx.client(), network, None).await?.contains(&address) {
        return Err(SyncError::duplicate("ip address", &address.to_string()));
    }
    Ok(address)
}

/// The port to associate with, owned by `tenant`.
///
/// `None` leaves the association alone; `Some(None)` disassociates.
async fn resolve_port(
    ctx: &HandlerContext,
    candidate: &FloatingIp,
    tenant: &str,
) -> Result<Option<Option<VirtualMachineInterface>>, SyncError> {
    let port_id = match candidate.port_id.as_deref() {
        None => return Ok(None),
        Some("") => return Ok(Some(None)),
        Some(id) => id,
    };
    let port = ctx
        .validator()
        .reference::<VirtualMachineInterface>("portId", port_id)
        .await?;
    require_owner(&port.meta, tenant, "port")?;

    if let Some(raw) = candidate.fixed_ip_address.as_deref() {
        let fixed = ipam::parse_ip("fixedIpAddress", raw)?;
        let addresses = typed::back_refs::<InstanceIp>(ctx.client(), port_id).await?;
        if !addresses.iter().any(|iip| iip.address.parse::<IpAddr>().is_ok_and(|a| a == fixed)) {
            return Err(SyncError::InvalidCombination(format!(
                "{} is not a fixed IP of port {}",
                fixed, port_id
            )));
        }
    }
    Ok(Some(Some(port)))
}

fn allocate(network: &VirtualNetwork, used: &HashSet<IpAddr>) -> Result<IpAddr, SyncError> {
    for subnet in &network.ipam_subnets {
        if let Some(address) = ipam::allocate(subnet, used)? {
            return Ok(address);
        }
    }
    Err(SyncError::CommitFailure(format!(
        "network {} has no free floating addresses",
        network.uuid()
    )))
}

#[async_trait]
impl ResourcePolicy for FloatingIpPolicy {
    type Candidate = FloatingIp;

    fn normalize(&self, candidate: &mut FloatingIp) -> Result<(), SyncError> {
        candidate.id = identifier::optional_uuid("id", candidate.id.as_deref())?;
        candidate.tenant_id = identifier::optional_uuid("tenantId", candidate.tenant_id.as_deref())?;
        candidate.floating_network_id =
            identifier::optional_uuid("floatingNetworkId", candidate.floating_network_id.as_deref())?;
        candidate.port_id = identifier::optional_uuid_or_empty("portId", candidate.port_id.as_deref())?;
        Ok(())
    }

    async fn validate_create(&self, ctx: &HandlerContext, candidate: &FloatingIp) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        let network_id = identifier::require_uuid("floatingNetworkId", candidate.floating_network_id.as_deref())?;

        let validator = ctx.validator();
        validator.project(&tenant).await?;
        let (network, _) = floating_network(ctx, &network_id).await?;
        validator.absent::<BackendFloatingIp>(&id).await?;
        if let Some(raw) = candidate.floating_ip_address.as_deref() {
            require_free_address(ctx, &network, raw).await?;
        }
        resolve_port(ctx, candidate, &tenant).await?;
        Ok(())
    }

    async fn validate_update(
        &self,
        ctx: &HandlerContext,
        delta: &FloatingIp,
        original: &FloatingIp,
    ) -> Result<(), SyncError> {
        let id = target_id(delta, original)?;
        let current = ctx.validator().existing::<BackendFloatingIp>(&id).await?;
        let tenant = first_ref(&current.project_refs);

        require_unchanged("tenantId", &delta.tenant_id, &tenant)?;
        require_unchanged("floatingNetworkId", &delta.floating_network_id, &network_of(ctx, &current).await?)?;
        require_unchanged("floatingIpAddress", &delta.floating_ip_address, &Some(current.address.clone()))?;
        resolve_port(ctx, delta, &tenant.unwrap_or_default()).await?;
        Ok(())
    }

    async fn validate_delete(&self, ctx: &HandlerContext, candidate: &FloatingIp) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        ctx.validator().existing::<BackendFloatingIp>(&id).await?;
        Ok(())
    }

    async fn commit_create(&self, ctx: &HandlerContext, candidate: &FloatingIp) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        let network_id = identifier::require_uuid("floatingNetworkId", candidate.floating_network_id.as_deref())?;

        let project = ctx.validator().project(&tenant).await?;
        let (network, pool) = floating_network(ctx, &network_id).await?;
        let address = match candidate.floating_ip_address.as_deref() {
            Some(raw) => require_free_address(ctx, &network, raw).await?,
            None => allocate(&network, &map_port::used_addresses(ctx.client(), &network, None).await?)?,
        };
        let port = resolve_port(ctx, candidate, &tenant).await?.flatten();

        let floating_ip = map::floating_ip_to_backend(candidate, &id, &pool, &project, address, port.as_ref());
        typed::create(ctx.client(), floating_ip).await?;
        info!("Allocated floating IP {} ({}) on network {}", id, address, network_id);
        Ok(())
    }

    async fn commit_update(&self, ctx: &HandlerContext, candidate: &FloatingIp) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let current = ctx.validator().existing::<BackendFloatingIp>(&id).await?;
        let tenant = first_ref(&current.project_refs).unwrap_or_default();
        let Some(port) = resolve_port(ctx, candidate, &tenant).await? else {
            return Ok(());
        };

        let fixed_ip = candidate.fixed_ip_address.as_deref();
        let _: BackendFloatingIp = mapper::mutate(ctx, &id, |floating_ip| {
            Ok(map::associate(floating_ip, port.as_ref(), fixed_ip))
        })
        .await?;
        match port {
            Some(port) => info!("Associated floating IP {} with port {}", id, port.uuid()),
            None => info!("Disassociated floating IP {}", id),
        }
        Ok(())
    }

    async fn commit_delete(&self, ctx: &HandlerContext, candidate: &FloatingIp) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        typed::delete::<BackendFloatingIp>(ctx.client(), &id).await?;
        info!("Released floating IP {}", id);
        Ok(())
    }

    async fn exists(&self, ctx: &HandlerContext, candidate: &FloatingIp) -> Result<bool, SyncError> {
        let id = candidate_id(candidate)?;
        Ok(typed::find::<BackendFloatingIp>(ctx.client(), &id).await?.is_some())
    }
}
