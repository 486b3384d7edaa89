//! Port policy

use super::{first_ref, require_attachable};
use crate::handlers::{candidate_id, target_id, HandlerContext, ResourcePolicy};
use crate::identifier;
use crate::ipam;
use crate::mapper::{self, network as map_network, port as map};
use crate::sync_error::SyncError;
use crate::validator::{require_owner, require_unchanged};
use async_trait::async_trait;
use sdn_client::{
    typed, BackendObject, FloatingIp, LogicalRouter, SecurityGroup, VirtualMachine, VirtualMachineInterface,
    VirtualNetwork,
};
use std::collections::HashSet;
use tenant_resources::Port;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct PortPolicy;

fn require_mac(raw: &str) -> Result<(), SyncError> {
    let octets: Vec<&str> = raw.split(':').collect();
    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    if well_formed {
        Ok(())
    } else {
        Err(SyncError::malformed("macAddress", format!("'{}' is not a MAC address", raw)))
    }
}

/// Validates requested fixed IPs on `network` and checks explicit addresses are free
async fn require_fixed_ips(
    ctx: &HandlerContext,
    network: &VirtualNetwork,
    candidate: &Port,
    port_id: &str,
) -> Result<(), SyncError> {
    let requests = map::resolve_fixed_ips(network, candidate.fixed_ips.as_deref())?;
    let used = map::used_addresses(ctx.client(), network, Some(port_id)).await?;
    let mut requested = HashSet::new();
    for address in requests.iter().filter_map(|r| r.address) {
        if !requested.insert(address) {
            return Err(SyncError::InvalidCombination(format!("fixed IP {} requested twice", address)));
        }
        if used.contains(&address) {
            return Err(SyncError::duplicate("ip address", &address.to_string()));
        }
    }

    // Addresses left to the allocator must be available at commit time
    let mut taken: HashSet<_> = used.union(&requested).copied().collect();
    for request in requests.iter().filter(|r| r.address.is_none()) {
        let subnet = network
            .ipam_subnets
            .iter()
            .find(|s| s.subnet_uuid == request.subnet_id)
            .ok_or_else(|| SyncError::InvalidReference {
                field: "fixedIps.subnetId".to_string(),
                kind: "subnet".to_string(),
                id: request.subnet_id.clone(),
            })?;
        match ipam::allocate(subnet, &taken)? {
            Some(address) => {
                taken.insert(address);
            }
            None => {
                return Err(SyncError::InvalidCombination(format!(
                    "subnet {} has no free addresses",
                    request.subnet_id
                )));
            }
        }
    }
    Ok(())
}

async fn require_groups(
    ctx: &HandlerContext,
    ids: Option<&[String]>,
    tenant: &str,
) -> Result<Vec<SecurityGroup>, SyncError> {
    let Some(ids) = ids else {
        return Ok(Vec::new());
    };
    let groups = ctx.validator().references::<SecurityGroup>("securityGroups", ids).await?;
    for group in &groups {
        require_owner(&group.meta, tenant, "security group")?;
    }
    Ok(groups)
}

#[async_trait]
impl ResourcePolicy for PortPolicy {
    type Candidate = Port;

    fn normalize(&self, candidate: &mut Port) -> Result<(), SyncError> {
        candidate.id = identifier::optional_uuid("id", candidate.id.as_deref())?;
        candidate.network_id = identifier::optional_uuid("networkId", candidate.network_id.as_deref())?;
        candidate.tenant_id = identifier::optional_uuid("tenantId", candidate.tenant_id.as_deref())?;
        candidate.device_id = identifier::optional_uuid_or_empty("deviceId", candidate.device_id.as_deref())?;
        candidate.security_groups = identifier::uuid_list("securityGroups", candidate.security_groups.as_deref())?;
        for fixed in candidate.fixed_ips.iter_mut().flatten() {
            fixed.subnet_id = identifier::optional_uuid("fixedIps.subnetId", fixed.subnet_id.as_deref())?;
        }
        Ok(())
    }

    async fn validate_create(&self, ctx: &HandlerContext, candidate: &Port) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let network_id = identifier::require_uuid("networkId", candidate.network_id.as_deref())?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        if let Some(mac) = candidate.mac_address.as_deref() {
            require_mac(mac)?;
        }

        let validator = ctx.validator();
        validator.project(&tenant).await?;
        let network = validator.parent::<VirtualNetwork>(&network_id).await?;
        require_attachable(&network, &tenant)?;
        validator.absent::<VirtualMachineInterface>(&id).await?;

        let mac = candidate.mac_address.clone().unwrap_or_else(|| mapper::mac_for(&id));
        let ports = typed::list::<VirtualMachineInterface>(ctx.client(), &[]).await?;
        if ports
            .iter()
            .any(|p| p.mac_addresses.iter().any(|m| m.eq_ignore_ascii_case(&mac)))
        {
            return Err(SyncError::duplicate("mac address", &mac));
        }

        require_fixed_ips(ctx, &network, candidate, &id).await?;
        require_groups(ctx, candidate.security_groups.as_deref(), &tenant).await?;
        Ok(())
    }

    async fn validate_update(&self, ctx: &HandlerContext, delta: &Port, original: &Port) -> Result<(), SyncError> {
        let id = target_id(delta, original)?;
        let validator = ctx.validator();
        let current = validator.existing::<VirtualMachineInterface>(&id).await?;

        if let Some(mac) = delta.mac_address.as_deref() {
            require_mac(mac)?;
        }
        require_unchanged("macAddress", &delta.mac_address, &current.mac_addresses.first().cloned())?;
        require_unchanged("networkId", &delta.network_id, &first_ref(&current.virtual_network_refs))?;
        require_unchanged("tenantId", &delta.tenant_id, &current.meta.parent_uuid)?;

        if delta.fixed_ips.is_some() {
            let network_id = first_ref(&current.virtual_network_refs).unwrap_or_default();
            let network = validator.parent::<VirtualNetwork>(&network_id).await?;
            require_fixed_ips(ctx, &network, delta, &id).await?;
        }
        let tenant = current.meta.parent_uuid.clone().unwrap_or_default();
        require_groups(ctx, delta.security_groups.as_deref(), &tenant).await?;
        Ok(())
    }

    async fn validate_delete(&self, ctx: &HandlerContext, candidate: &Port) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        ctx.validator().existing::<VirtualMachineInterface>(&id).await?;
        let routers = typed::back_refs::<LogicalRouter>(ctx.client(), &id).await?;
        if let Some(router) = routers.first() {
            return Err(SyncError::dependents(
                VirtualMachineInterface::KIND,
                &id,
                format!("an interface on router {}", router.uuid()),
            ));
        }
        Ok(())
    }

    async fn commit_create(&self, ctx: &HandlerContext, candidate: &Port) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let network_id = identifier::require_uuid("networkId", candidate.network_id.as_deref())?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;

        let validator = ctx.validator();
        let project = validator.project(&tenant).await?;
        let network = validator.parent::<VirtualNetwork>(&network_id).await?;
        let groups = require_groups(ctx, candidate.security_groups.as_deref(), &tenant).await?;
        let vm = match candidate.device_id.as_deref() {
            Some(device) if !device.is_empty() => Some(map::ensure_virtual_machine(ctx, device).await?),
            _ => None,
        };

        let port = map::port_to_backend(candidate, &id, &project, &network, vm.as_ref(), &groups);
        let port = typed::create(ctx.client(), port).await?;
        let requests = map::resolve_fixed_ips(&network, candidate.fixed_ips.as_deref())?;
        let addresses = map::sync_instance_ips(ctx, &port, &network, &requests).await?;
        info!(
            "Created port {} on network {} with {} address(es)",
            id,
            network_id,
            addresses.len()
        );
        Ok(())
    }

    async fn commit_update(&self, ctx: &HandlerContext, candidate: &Port) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let current = ctx.validator().existing::<VirtualMachineInterface>(&id).await?;
        let previous_vm = first_ref(&current.virtual_machine_refs);

        let vm: Option<Option<VirtualMachine>> = match candidate.device_id.as_deref() {
            None => None,
            Some("") => Some(None),
            Some(device) => Some(Some(map::ensure_virtual_machine(ctx, device).await?)),
        };
        let groups = match candidate.security_groups.as_deref() {
            Some(ids) => {
                let tenant = current.meta.parent_uuid.clone().unwrap_or_default();
                Some(require_groups(ctx, Some(ids), &tenant).await?)
            }
            None => None,
        };

        let vm_ref = vm.as_ref().map(Option::as_ref);
        let port: VirtualMachineInterface = mapper::mutate(ctx, &id, |port| {
            Ok(map::apply_port(port, candidate, vm_ref, groups.as_deref()))
        })
        .await?;

        if let Some(previous) = previous_vm {
            if first_ref(&port.virtual_machine_refs).as_deref() != Some(previous.as_str()) {
                map::release_virtual_machine(ctx, &previous, &id).await?;
            }
        }

        if candidate.fixed_ips.is_some() {
            let network_id = first_ref(&port.virtual_network_refs).unwrap_or_default();
            let network = ctx.validator().parent::<VirtualNetwork>(&network_id).await?;
            let requests = map::resolve_fixed_ips(&network, candidate.fixed_ips.as_deref())?;
            map::sync_instance_ips(ctx, &port, &network, &requests).await?;
        }
        Ok(())
    }

    async fn commit_delete(&self, ctx: &HandlerContext, candidate: &Port) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let Some(port) = typed::find::<VirtualMachineInterface>(ctx.client(), &id).await? else {
            return Ok(());
        };

        for floating in typed::back_refs::<FloatingIp>(ctx.client(), &id).await? {
            let _: FloatingIp = mapper::mutate(ctx, floating.uuid(), |floating| {
                Ok(map_network::associate(floating, None, None))
            })
            .await?;
            info!("Disassociated floating IP {} from port {}", floating.address, id);
        }
        map::remove_instance_ips(ctx, &id).await?;
        typed::delete::<VirtualMachineInterface>(ctx.client(), &id).await?;
        for vm in &port.virtual_machine_refs {
            map::release_virtual_machine(ctx, &vm.uuid, &id).await?;
        }
        info!("Deleted port {}", id);
        Ok(())
    }

    async fn exists(&self, ctx: &HandlerContext, candidate: &Port) -> Result<bool, SyncError> {
        let id = candidate_id(candidate)?;
        Ok(typed::find::<VirtualMachineInterface>(ctx.client(), &id).await?.is_some())
    }
}
