//! Subnet policy
//!
//! Subnets are entries of their network's `ipam_subnets` list, so every
//! commit is a read-modify-write of the network, leased by its id.

use crate::handlers::{candidate_id, target_id, HandlerContext, ResourcePolicy};
use crate::identifier;
use crate::ipam;
use crate::mapper::{self, network as map};
use crate::sync_error::SyncError;
use crate::validator::{require_non_empty, require_owner, require_unchanged};
use async_trait::async_trait;
use ipnetwork::IpNetwork;
use sdn_client::{typed, BackendObject, InstanceIp, IpamSubnet, LoadbalancerPool, VirtualNetwork};
use tenant_resources::Subnet;
use tracing::info;

const KIND: &str = "subnet";

#[derive(Debug, Default, Clone, Copy)]
pub struct SubnetPolicy;

fn not_found(id: &str) -> SyncError {
    SyncError::ResourceNotFound {
        kind: KIND.to_string(),
        id: id.to_string(),
    }
}

fn require_ip_version(version: Option<u8>, cidr: &IpNetwork) -> Result<(), SyncError> {
    let Some(version) = version else {
        return Ok(());
    };
    let family = match cidr {
        IpNetwork::V4(_) => 4,
        IpNetwork::V6(_) => 6,
    };
    match version {
        4 | 6 if version == family => Ok(()),
        4 | 6 => Err(SyncError::InvalidCombination(format!(
            "ipVersion {} does not match cidr {}",
            version, cidr
        ))),
        other => Err(SyncError::InvalidEnumValue {
            field: "ipVersion".to_string(),
            value: other.to_string(),
            allowed: "4, 6".to_string(),
        }),
    }
}

/// Checks the fields that may be set at creation or later, against `cidr`
fn require_subnet_options(candidate: &Subnet, cidr: &IpNetwork) -> Result<(), SyncError> {
    let gateway = candidate
        .gateway_ip
        .as_deref()
        .map(|raw| ipam::parse_ip("gatewayIp", raw))
        .transpose()?;
    if let Some(gateway) = gateway {
        ipam::require_in_cidr("gatewayIp", gateway, cidr)?;
    }

    for pool in candidate.allocation_pools.iter().flatten() {
        let (first, last) = ipam::require_range_in_cidr(&pool.start, &pool.end, cidr)?;
        if let Some(gateway) = gateway.filter(|g| first <= *g && *g <= last) {
            return Err(SyncError::InvalidCombination(format!(
                "gateway {} lies inside allocation pool {}-{}",
                gateway, pool.start, pool.end
            )));
        }
    }
    for server in candidate.dns_nameservers.iter().flatten() {
        ipam::parse_ip("dnsNameservers", server)?;
    }
    for route in candidate.host_routes.iter().flatten() {
        ipam::parse_cidr("hostRoutes.destination", &route.destination)?;
        ipam::parse_ip("hostRoutes.nexthop", &route.nexthop)?;
    }
    Ok(())
}

/// Network holding subnet `id`
async fn locate(ctx: &HandlerContext, id: &str) -> Result<(VirtualNetwork, IpamSubnet), SyncError> {
    mapper::find_subnet(ctx.client(), id).await?.ok_or_else(|| not_found(id))
}

#[async_trait]
impl ResourcePolicy for SubnetPolicy {
    type Candidate = Subnet;

    fn normalize(&self, candidate: &mut Subnet) -> Result<(), SyncError> {
        candidate.id = identifier::optional_uuid("id", candidate.id.as_deref())?;
        candidate.network_id = identifier::optional_uuid("networkId", candidate.network_id.as_deref())?;
        candidate.tenant_id = identifier::optional_uuid("tenantId", candidate.tenant_id.as_deref())?;
        Ok(())
    }

    fn parent_keys(&self, candidate: &Subnet) -> Vec<String> {
        candidate.network_id.iter().cloned().collect()
    }

    async fn validate_create(&self, ctx: &HandlerContext, candidate: &Subnet) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let network_id = identifier::require_uuid("networkId", candidate.network_id.as_deref())?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        let cidr = ipam::parse_cidr("cidr", require_non_empty("cidr", &candidate.cidr)?)?;
        require_ip_version(candidate.ip_version, &cidr)?;
        require_subnet_options(candidate, &cidr)?;

        let validator = ctx.validator();
        validator.project(&tenant).await?;
        let network = validator.parent::<VirtualNetwork>(&network_id).await?;
        require_owner(&network.meta, &tenant, "network")?;

        if let Some((holder, _)) = mapper::find_subnet(ctx.client(), &id).await? {
            return Err(SyncError::DuplicateEntry {
                kind: KIND.to_string(),
                id: format!("{} (in network {})", id, holder.uuid()),
            });
        }
        ipam::require_disjoint(&cidr, &network.ipam_subnets)
    }

    async fn validate_update(&self, ctx: &HandlerContext, delta: &Subnet, original: &Subnet) -> Result<(), SyncError> {
        let id = target_id(delta, original)?;
        let (network, current) = locate(ctx, &id).await?;
        require_unchanged("networkId", &delta.network_id, &Some(network.uuid().to_string()))?;
        require_unchanged("tenantId", &delta.tenant_id, &network.meta.parent_uuid)?;

        let cidr = ipam::subnet_network(&current)?;
        if let Some(raw) = delta.cidr.as_deref() {
            if ipam::parse_cidr("cidr", raw)? != cidr {
                return Err(SyncError::immutable("cidr"));
            }
        }
        let gateway = |raw: Option<&str>| raw.map(|raw| ipam::parse_ip("gatewayIp", raw)).transpose();
        require_unchanged(
            "gatewayIp",
            &gateway(delta.gateway_ip.as_deref())?,
            &gateway(current.default_gateway.as_deref())?,
        )?;
        require_subnet_options(delta, &cidr)
    }

    async fn validate_delete(&self, ctx: &HandlerContext, candidate: &Subnet) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let (network, _) = locate(ctx, &id).await?;

        let mut dependents = Vec::new();
        let addresses = typed::back_refs::<InstanceIp>(ctx.client(), network.uuid())
            .await?
            .into_iter()
            .filter(|iip| iip.subnet_uuid.as_deref() == Some(id.as_str()))
            .count();
        if addresses > 0 {
            dependents.push(format!("{} allocated address(es)", addresses));
        }
        let pools = typed::list::<LoadbalancerPool>(ctx.client(), &[])
            .await?
            .into_iter()
            .filter(|pool| pool.subnet_uuid.as_deref() == Some(id.as_str()))
            .count();
        if pools > 0 {
            dependents.push(format!("{} load balancer pool(s)", pools));
        }
        if network.ipam_subnets.len() == 1 {
            let floating = map::floating_ips(ctx.client(), network.uuid()).await?;
            if !floating.is_empty() {
                dependents.push(format!("{} floating IP(s) on its network", floating.len()));
            }
        }

        if dependents.is_empty() {
            Ok(())
        } else {
            Err(SyncError::dependents(KIND, &id, dependents.join(", ")))
        }
    }

    async fn commit_create(&self, ctx: &HandlerContext, candidate: &Subnet) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let network_id = identifier::require_uuid("networkId", candidate.network_id.as_deref())?;
        let cidr = ipam::parse_cidr("cidr", require_non_empty("cidr", &candidate.cidr)?)?;
        let entry = map::subnet_to_entry(candidate, &id, &cidr);

        // Re-checked on every attempt: the list may have changed since validation.
        mapper::mutate_embedded::<VirtualNetwork, IpamSubnet, _>(ctx, &network_id, |subnets| {
            if subnets.iter().any(|s| s.subnet_uuid == id) {
                return Err(SyncError::DuplicateEntry {
                    kind: KIND.to_string(),
                    id: id.clone(),
                });
            }
            ipam::require_disjoint(&cidr, subnets.iter())?;
            subnets.push(entry.clone());
            Ok(true)
        })
        .await?;
        info!("Added subnet {} ({}) to network {}", id, cidr, network_id);
        Ok(())
    }

    async fn commit_update(&self, ctx: &HandlerContext, candidate: &Subnet) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let (network, _) = locate(ctx, &id).await?;
        mapper::mutate_embedded::<VirtualNetwork, IpamSubnet, _>(ctx, network.uuid(), |subnets| {
            let entry = subnets
                .iter_mut()
                .find(|s| s.subnet_uuid == id)
                .ok_or_else(|| not_found(&id))?;
            Ok(map::apply_subnet(entry, candidate))
        })
        .await?;
        Ok(())
    }

    async fn commit_delete(&self, ctx: &HandlerContext, candidate: &Subnet) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let Some((network, _)) = mapper::find_subnet(ctx.client(), &id).await? else {
            return Ok(());
        };
        mapper::mutate_embedded::<VirtualNetwork, IpamSubnet, _>(ctx, network.uuid(), |subnets| {
            let before = subnets.len();
            subnets.retain(|s| s.subnet_uuid != id);
            Ok(subnets.len() != before)
        })
        .await?;
        info!("Removed subnet {} from network {}", id, network.uuid());
        Ok(())
    }

    async fn exists(&self, ctx: &HandlerContext, candidate: &Subnet) -> Result<bool, SyncError> {
        let id = candidate_id(candidate)?;
        Ok(mapper::find_subnet(ctx.client(), &id).await?.is_some())
    }
}
