//! Ports: virtual machine interfaces, their virtual machine and instance IPs

use super::{admin_state, assign, assign_refs, mac_for, project_child, rename};
use crate::handlers::HandlerContext;
use crate::identifier;
use crate::ipam;
use crate::sync_error::SyncError;
use sdn_client::{
    typed, BackendObject, InstanceIp, ObjectMeta, ObjectRef, Project, SdnClientTrait, SecurityGroup,
    VirtualMachine, VirtualMachineInterface, VirtualNetwork,
};
use std::collections::HashSet;
use std::net::IpAddr;
use tenant_resources::{FixedIp, Port};
use tracing::{debug, info};

/// A fixed IP resolved against the port's network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedIpRequest {
    pub subnet_id: String,
    pub address: Option<IpAddr>,
}

/// Resolves requested fixed IPs to subnets of `network`.
///
/// `None` asks for one address on the network's first subnet (if it has any).
pub fn resolve_fixed_ips(network: &VirtualNetwork, fixed_ips: Option<&[FixedIp]>) -> Result<Vec<FixedIpRequest>, SyncError> {
    let Some(fixed_ips) = fixed_ips else {
        return Ok(network
            .ipam_subnets
            .first()
            .map(|s| FixedIpRequest {
                subnet_id: s.subnet_uuid.clone(),
                address: None,
            })
            .into_iter()
            .collect());
    };

    let mut requests = Vec::with_capacity(fixed_ips.len());
    for fixed in fixed_ips {
        let address = fixed
            .ip_address
            .as_deref()
            .map(|raw| ipam::parse_ip("fixedIps.ipAddress", raw))
            .transpose()?;
        let subnet_id = identifier::optional_uuid("fixedIps.subnetId", fixed.subnet_id.as_deref())?;

        let subnet = match (&subnet_id, address) {
            (Some(id), _) => network.subnet(id).ok_or_else(|| SyncError::InvalidReference {
                field: "fixedIps.subnetId".to_string(),
                kind: "subnet".to_string(),
                id: id.clone(),
            })?,
            (None, Some(ip)) => network
                .ipam_subnets
                .iter()
                .find(|s| ipam::subnet_network(s).map(|net| net.contains(ip)).unwrap_or(false))
                .ok_or_else(|| {
                    SyncError::InvalidCombination(format!("{} is not inside any subnet of network {}", ip, network.uuid()))
                })?,
            (None, None) => network.ipam_subnets.first().ok_or_else(|| {
                SyncError::InvalidCombination(format!("network {} has no subnets to allocate from", network.uuid()))
            })?,
        };

        if let Some(ip) = address {
            ipam::require_in_cidr("fixedIps.ipAddress", ip, &ipam::subnet_network(subnet)?)?;
        }
        requests.push(FixedIpRequest {
            subnet_id: subnet.subnet_uuid.clone(),
            address,
        });
    }
    Ok(requests)
}

/// Addresses already handed out on `network`, ignoring those of `except_port`
pub async fn used_addresses(
    client: &dyn SdnClientTrait,
    network: &VirtualNetwork,
    except_port: Option<&str>,
) -> Result<HashSet<IpAddr>, SyncError> {
    let mut used = HashSet::new();
    for iip in typed::back_refs::<InstanceIp>(client, network.uuid()).await? {
        let owned_by_port = except_port.is_some_and(|port| {
            iip.virtual_machine_interface_refs.iter().any(|r| r.uuid == port)
        });
        if owned_by_port {
            continue;
        }
        if let Ok(ip) = iip.address.parse() {
            used.insert(ip);
        }
    }
    for fip in super::network::floating_ips(client, network.uuid()).await? {
        if let Ok(ip) = fip.address.parse() {
            used.insert(ip);
        }
    }
    Ok(used)
}

pub fn virtual_machine(device_id: &str) -> VirtualMachine {
    VirtualMachine {
        meta: ObjectMeta::new(device_id, device_id, &[], None),
        server_type: None,
    }
}

fn group_refs(groups: &[SecurityGroup]) -> Vec<ObjectRef> {
    groups.iter().map(|g| ObjectRef::to_meta(&g.meta)).collect()
}

pub fn port_to_backend(
    candidate: &Port,
    id: &str,
    project: &Project,
    network: &VirtualNetwork,
    vm: Option<&VirtualMachine>,
    groups: &[SecurityGroup],
) -> VirtualMachineInterface {
    VirtualMachineInterface {
        meta: project_child(id, candidate.name.as_deref(), project),
        mac_addresses: vec![candidate.mac_address.clone().unwrap_or_else(|| mac_for(id))],
        device_owner: candidate.device_owner.clone(),
        admin_state_up: admin_state(candidate.admin_state_up),
        virtual_network_refs: vec![ObjectRef::to_meta(&network.meta)],
        virtual_machine_refs: vm.map(|vm| vec![ObjectRef::to_meta(&vm.meta)]).unwrap_or_default(),
        security_group_refs: group_refs(groups),
    }
}

/// Applies the mutable port fields.
///
/// `vm` is `Some(None)` to unbind the port from its device; `groups` replaces
/// the security group list when given.
pub fn apply_port(
    vmi: &mut VirtualMachineInterface,
    candidate: &Port,
    vm: Option<Option<&VirtualMachine>>,
    groups: Option<&[SecurityGroup]>,
) -> bool {
    let mut changed = rename(&mut vmi.meta, candidate.name.as_deref());
    changed |= assign(&mut vmi.admin_state_up, candidate.admin_state_up.as_ref());
    if candidate.device_owner.is_some() && vmi.device_owner != candidate.device_owner {
        vmi.device_owner = candidate.device_owner.clone();
        changed = true;
    }
    if let Some(vm) = vm {
        let refs = vm.map(|vm| vec![ObjectRef::to_meta(&vm.meta)]).unwrap_or_default();
        changed |= assign_refs(&mut vmi.virtual_machine_refs, refs);
    }
    if let Some(groups) = groups {
        changed |= assign_refs(&mut vmi.security_group_refs, group_refs(groups));
    }
    changed
}

/// The device's virtual machine, created if it does not exist yet
pub async fn ensure_virtual_machine(ctx: &HandlerContext, device_id: &str) -> Result<VirtualMachine, SyncError> {
    if let Some(vm) = typed::find::<VirtualMachine>(ctx.client(), device_id).await? {
        return Ok(vm);
    }
    let vm = typed::create(ctx.client(), virtual_machine(device_id)).await?;
    info!("Created virtual machine {} for device", vm.uuid());
    Ok(vm)
}

/// Deletes the virtual machine once `leaving_port` was its last interface
pub async fn release_virtual_machine(ctx: &HandlerContext, vm_uuid: &str, leaving_port: &str) -> Result<bool, SyncError> {
    let ports = typed::back_refs::<VirtualMachineInterface>(ctx.client(), vm_uuid).await?;
    if ports.iter().any(|p| p.uuid() != leaving_port) {
        debug!("Virtual machine {} still has other interfaces", vm_uuid);
        return Ok(false);
    }
    typed::delete::<VirtualMachine>(ctx.client(), vm_uuid).await?;
    info!("Deleted virtual machine {} with its last interface", vm_uuid);
    Ok(true)
}

fn instance_ip(port: &VirtualMachineInterface, network: &VirtualNetwork, subnet_id: &str, address: IpAddr) -> InstanceIp {
    let uuid = identifier::generate();
    InstanceIp {
        meta: ObjectMeta::new(&uuid, &uuid, &[], None),
        address: address.to_string(),
        subnet_uuid: Some(subnet_id.to_string()),
        virtual_network_refs: vec![ObjectRef::to_meta(&network.meta)],
        virtual_machine_interface_refs: vec![ObjectRef::to_meta(&port.meta)],
    }
}

/// Reconciles the port's instance IPs with `requests`.
///
/// Matching instance IPs are kept, missing ones created (allocating an address
/// where none was requested) and the rest deleted.
pub async fn sync_instance_ips(
    ctx: &HandlerContext,
    port: &VirtualMachineInterface,
    network: &VirtualNetwork,
    requests: &[FixedIpRequest],
) -> Result<Vec<InstanceIp>, SyncError> {
    let mut remaining = typed::back_refs::<InstanceIp>(ctx.client(), port.uuid()).await?;
    let mut kept = Vec::new();
    let mut missing = Vec::new();

    // Explicit addresses first, so an "any address" request cannot claim them.
    let (explicit, wildcard): (Vec<&FixedIpRequest>, Vec<&FixedIpRequest>) =
        requests.iter().partition(|r| r.address.is_some());
    for request in explicit.into_iter().chain(wildcard) {
        let position = remaining.iter().position(|iip| match request.address {
            Some(ip) => iip.address.parse::<IpAddr>().is_ok_and(|a| a == ip),
            None => iip.subnet_uuid.as_deref() == Some(request.subnet_id.as_str()),
        });
        match position {
            Some(i) => kept.push(remaining.remove(i)),
            None => missing.push(request),
        }
    }

    for stale in &remaining {
        typed::delete::<InstanceIp>(ctx.client(), stale.uuid()).await?;
        debug!("Deleted instance IP {} ({}) of port {}", stale.uuid(), stale.address, port.uuid());
    }

    if missing.is_empty() {
        return Ok(kept);
    }
    let mut used = used_addresses(ctx.client(), network, Some(port.uuid())).await?;
    used.extend(kept.iter().filter_map(|iip| iip.address.parse::<IpAddr>().ok()));

    for request in missing {
        let subnet = network.subnet(&request.subnet_id).ok_or_else(|| {
            SyncError::CommitFailure(format!("subnet {} vanished from network {}", request.subnet_id, network.uuid()))
        })?;
        let address = match request.address {
            Some(ip) => ip,
            None => ipam::allocate(subnet, &used)?.ok_or_else(|| {
                SyncError::CommitFailure(format!("subnet {} has no free addresses", request.subnet_id))
            })?,
        };
        used.insert(address);
        let stored = typed::create(ctx.client(), instance_ip(port, network, &request.subnet_id, address)).await?;
        debug!("Created instance IP {} ({}) for port {}", stored.uuid(), address, port.uuid());
        kept.push(stored);
    }
    Ok(kept)
}

/// Deletes every instance IP of the port
pub async fn remove_instance_ips(ctx: &HandlerContext, port_uuid: &str) -> Result<usize, SyncError> {
    let iips = typed::back_refs::<InstanceIp>(ctx.client(), port_uuid).await?;
    for iip in &iips {
        typed::delete::<InstanceIp>(ctx.client(), iip.uuid()).await?;
    }
    Ok(iips.len())
}
