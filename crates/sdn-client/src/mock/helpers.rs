//! Helper functions for creating fixture objects in tests

use crate::models::*;

/// Builders for well-formed backend objects
pub struct Fixtures {
    domain: String,
}

impl Fixtures {
    pub fn new(domain: impl Into<String>) -> Self {
        Self { domain: domain.into() }
    }

    /// Helper to create a Project under the domain
    pub fn project(&self, uuid: &str, name: &str) -> Project {
        Project {
            meta: ObjectMeta::new(uuid, name, &[self.domain.clone()], None),
            description: None,
        }
    }

    /// Helper to create an internal VirtualNetwork without subnets
    pub fn network(&self, project: &Project, uuid: &str, name: &str) -> VirtualNetwork {
        VirtualNetwork {
            meta: ObjectMeta::new(uuid, name, &project.meta.fq_name, Some(&project.meta.uuid)),
            router_external: false,
            is_shared: false,
            admin_state_up: true,
            ipam_subnets: Vec::new(),
        }
    }

    /// Helper to create an IPAM subnet entry
    pub fn subnet(&self, uuid: &str, cidr: &str, gateway: Option<&str>) -> IpamSubnet {
        let (prefix, len) = cidr.split_once('/').unwrap_or((cidr, "32"));
        IpamSubnet {
            subnet_uuid: uuid.to_string(),
            subnet_name: None,
            ip_prefix: prefix.to_string(),
            ip_prefix_len: len.parse().unwrap_or(32),
            default_gateway: gateway.map(str::to_string),
            enable_dhcp: true,
            allocation_pools: Vec::new(),
            dns_nameservers: Vec::new(),
            host_routes: Vec::new(),
        }
    }

    /// Helper to create a FloatingIpPool under a network
    pub fn floating_ip_pool(&self, network: &VirtualNetwork, uuid: &str) -> FloatingIpPool {
        FloatingIpPool {
            meta: ObjectMeta::new(uuid, "floating-ip-pool", &network.meta.fq_name, Some(&network.meta.uuid)),
        }
    }

    /// Helper to create a port attached to `network`
    pub fn port(&self, project: &Project, network: &VirtualNetwork, uuid: &str) -> VirtualMachineInterface {
        VirtualMachineInterface {
            meta: ObjectMeta::new(uuid, uuid, &project.meta.fq_name, Some(&project.meta.uuid)),
            mac_addresses: vec!["02:00:00:00:00:01".to_string()],
            device_owner: None,
            admin_state_up: true,
            virtual_network_refs: vec![ObjectRef::to_meta(&network.meta)],
            virtual_machine_refs: Vec::new(),
            security_group_refs: Vec::new(),
        }
    }

    /// Helper to create an empty SecurityGroup
    pub fn security_group(&self, project: &Project, uuid: &str, name: &str) -> SecurityGroup {
        SecurityGroup {
            meta: ObjectMeta::new(uuid, name, &project.meta.fq_name, Some(&project.meta.uuid)),
            description: None,
            rules: Vec::new(),
        }
    }

    /// Helper to create a round-robin HTTP pool
    pub fn pool(&self, project: &Project, uuid: &str, name: &str) -> LoadbalancerPool {
        LoadbalancerPool {
            meta: ObjectMeta::new(uuid, name, &project.meta.fq_name, Some(&project.meta.uuid)),
            protocol: "HTTP".to_string(),
            lb_method: "ROUND_ROBIN".to_string(),
            provider: "native".to_string(),
            subnet_uuid: None,
            admin_state_up: true,
            healthmonitor_refs: Vec::new(),
        }
    }
}
