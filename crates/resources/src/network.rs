//! Network, subnet, port, router and floating IP candidates

use crate::candidate::candidate;
use serde::{Deserialize, Serialize};

/// Tenant network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Owning project
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// Name, unique within the project (defaults to the id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared: Option<bool>,

    /// External networks get a floating IP pool
    #[serde(alias = "external", skip_serializing_if = "Option::is_none")]
    pub router_external: Option<bool>,
}

candidate!(Network, "networks", name = name; id, tenant_id, name, admin_state_up, shared, router_external);

/// Subnet of a tenant network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Subnet CIDR (e.g., "10.0.0.0/24"); fixed once created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,

    /// Gateway address inside the CIDR; fixed once set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_ip: Option<String>,

    /// 4 or 6
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_version: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_dhcp: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation_pools: Option<Vec<AllocationRange>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_nameservers: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_routes: Option<Vec<Route>>,
}

candidate!(Subnet, "subnets", name = name; id, network_id, tenant_id, name, cidr, gateway_ip, ip_version, enable_dhcp, allocation_pools, dns_nameservers, host_routes);

/// Inclusive address range handed out by DHCP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRange {
    pub start: String,
    pub end: String,
}

/// Static route pushed to hosts on a subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub destination: String,
    pub nexthop: String,
}

/// Tenant port
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// MAC address; fixed once created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,

    /// Device (virtual machine) the port is bound to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_owner: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_ips: Option<Vec<FixedIp>>,

    /// Security group ids
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_groups: Option<Vec<String>>,
}

candidate!(Port, "ports", name = name; id, network_id, tenant_id, name, mac_address, admin_state_up, device_id, device_owner, fixed_ips, security_groups);

/// Fixed IP assignment of a port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedIp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,

    /// Allocated from the subnet when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// Tenant router
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Router {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,

    /// External gateway; `networkId: null` clears it on update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_gateway: Option<RouterGateway>,

    /// Ids of the ports attached as router interfaces
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<Vec<String>>,
}

candidate!(Router, "routers", name = name; id, tenant_id, name, admin_state_up, external_gateway, interfaces);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterGateway {
    #[serde(default)]
    pub network_id: Option<String>,
}

/// Floating IP on an external network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloatingIp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// External network providing the address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floating_network_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub floating_ip_address: Option<String>,

    /// Associated port; an empty string disassociates on update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_ip_address: Option<String>,
}

candidate!(FloatingIp, "floating-ips", name = -; id, tenant_id, floating_network_id, floating_ip_address, port_id, fixed_ip_address);
