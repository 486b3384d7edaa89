//! SDN controller object model
//!
//! These models match the controller's REST serializers. Every object is
//! addressed by `uuid` and placed in the hierarchy by `fq_name`
//! (`[domain, project, ..., name]`). Child collections that the controller
//! does not expose as standalone objects (subnets, security group rules)
//! are embedded as list attributes of their parent.

use serde::{Deserialize, Serialize};
use std::fmt;

fn default_true() -> bool {
    true
}

/// Kind of a backend object, used in URLs and the wire envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    Project,
    VirtualNetwork,
    FloatingIpPool,
    FloatingIp,
    VirtualMachineInterface,
    VirtualMachine,
    InstanceIp,
    LogicalRouter,
    SecurityGroup,
    LoadbalancerPool,
    LoadbalancerMember,
    LoadbalancerHealthmonitor,
    LoadbalancerListener,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Project => "project",
            ObjectKind::VirtualNetwork => "virtual-network",
            ObjectKind::FloatingIpPool => "floating-ip-pool",
            ObjectKind::FloatingIp => "floating-ip",
            ObjectKind::VirtualMachineInterface => "virtual-machine-interface",
            ObjectKind::VirtualMachine => "virtual-machine",
            ObjectKind::InstanceIp => "instance-ip",
            ObjectKind::LogicalRouter => "logical-router",
            ObjectKind::SecurityGroup => "security-group",
            ObjectKind::LoadbalancerPool => "loadbalancer-pool",
            ObjectKind::LoadbalancerMember => "loadbalancer-member",
            ObjectKind::LoadbalancerHealthmonitor => "loadbalancer-healthmonitor",
            ObjectKind::LoadbalancerListener => "loadbalancer-listener",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paginated list response from the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Identity and placement shared by every object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ObjectMeta {
    pub uuid: String,
    pub name: String,
    pub fq_name: Vec<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_uuid: Option<String>,
    /// Optimistic concurrency token, bumped by the controller on every write
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>, // ISO 8601 datetime
}

impl ObjectMeta {
    /// Builds the identity block for a new child of `parent_fq_name`.
    pub fn new(uuid: &str, name: &str, parent_fq_name: &[String], parent_uuid: Option<&str>) -> Self {
        let mut fq_name = parent_fq_name.to_vec();
        fq_name.push(name.to_string());
        Self {
            uuid: uuid.to_string(),
            name: name.to_string(),
            fq_name,
            display_name: name.to_string(),
            parent_uuid: parent_uuid.map(str::to_string),
            version: 0,
            last_modified: None,
        }
    }
}

/// Reference from one object to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub uuid: String,
    /// fq_name of the referenced object
    #[serde(default)]
    pub to: Vec<String>,
}

impl ObjectRef {
    pub fn new(uuid: &str, to: &[String]) -> Self {
        Self {
            uuid: uuid.to_string(),
            to: to.to_vec(),
        }
    }

    /// Reference to an object's own identity block.
    pub fn to_meta(meta: &ObjectMeta) -> Self {
        Self::new(&meta.uuid, &meta.fq_name)
    }
}

/// Project (tenant) model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    #[serde(default)]
    pub description: Option<String>,
}

/// Virtual network model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualNetwork {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    #[serde(default)]
    pub router_external: bool,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    /// IP address management entries (embedded subnets)
    #[serde(default)]
    pub ipam_subnets: Vec<IpamSubnet>,
}

impl VirtualNetwork {
    pub fn subnet(&self, subnet_uuid: &str) -> Option<&IpamSubnet> {
        self.ipam_subnets.iter().find(|s| s.subnet_uuid == subnet_uuid)
    }
}

/// Subnet entry inside a network's IPAM attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpamSubnet {
    pub subnet_uuid: String,
    #[serde(default)]
    pub subnet_name: Option<String>,
    pub ip_prefix: String, // e.g., "10.0.0.0"
    pub ip_prefix_len: u8,
    #[serde(default)]
    pub default_gateway: Option<String>,
    #[serde(default = "default_true")]
    pub enable_dhcp: bool,
    #[serde(default)]
    pub allocation_pools: Vec<AllocationPool>,
    #[serde(default)]
    pub dns_nameservers: Vec<String>,
    #[serde(default)]
    pub host_routes: Vec<HostRoute>,
}

impl IpamSubnet {
    /// CIDR notation of the subnet prefix
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.ip_prefix, self.ip_prefix_len)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPool {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRoute {
    pub prefix: String,
    pub next_hop: String,
}

/// Floating IP pool, child of an external virtual network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatingIpPool {
    #[serde(flatten)]
    pub meta: ObjectMeta,
}

/// Floating IP, child of a floating IP pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatingIp {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    pub address: String,
    #[serde(default)]
    pub fixed_ip_address: Option<String>,
    #[serde(default)]
    pub project_refs: Vec<ObjectRef>,
    #[serde(default)]
    pub virtual_machine_interface_refs: Vec<ObjectRef>,
}

/// Virtual machine interface (tenant port), child of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachineInterface {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    #[serde(default)]
    pub mac_addresses: Vec<String>,
    #[serde(default)]
    pub device_owner: Option<String>,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    #[serde(default)]
    pub virtual_network_refs: Vec<ObjectRef>,
    #[serde(default)]
    pub virtual_machine_refs: Vec<ObjectRef>,
    #[serde(default)]
    pub security_group_refs: Vec<ObjectRef>,
}

/// Virtual machine, created on demand for a port's device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachine {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    #[serde(default)]
    pub server_type: Option<String>,
}

/// Instance IP, one per fixed IP of a port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceIp {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    pub address: String,
    #[serde(default)]
    pub subnet_uuid: Option<String>,
    #[serde(default)]
    pub virtual_network_refs: Vec<ObjectRef>,
    #[serde(default)]
    pub virtual_machine_interface_refs: Vec<ObjectRef>,
}

/// Logical router, child of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalRouter {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    /// External gateway network (at most one)
    #[serde(default)]
    pub gateway_network_refs: Vec<ObjectRef>,
    /// Attached interfaces (ports)
    #[serde(default)]
    pub virtual_machine_interface_refs: Vec<ObjectRef>,
}

/// Security group, child of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroup {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered rule entries (embedded)
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

impl SecurityGroup {
    pub fn rule(&self, rule_uuid: &str) -> Option<&PolicyRule> {
        self.rules.iter().find(|r| r.rule_uuid == rule_uuid)
    }
}

/// Security group rule entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub rule_uuid: String,
    pub direction: String, // "ingress" | "egress"
    pub protocol: String,  // "tcp" | "udp" | "icmp" | "any"
    #[serde(default = "default_ethertype")]
    pub ethertype: String,
    #[serde(default)]
    pub port_min: Option<u32>,
    #[serde(default)]
    pub port_max: Option<u32>,
    #[serde(default)]
    pub remote_cidr: Option<String>,
    #[serde(default)]
    pub remote_group: Option<String>,
}

fn default_ethertype() -> String {
    "IPv4".to_string()
}

/// Load balancer pool, child of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadbalancerPool {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    pub protocol: String,
    pub lb_method: String,
    pub provider: String,
    #[serde(default)]
    pub subnet_uuid: Option<String>,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    #[serde(default)]
    pub healthmonitor_refs: Vec<ObjectRef>,
}

/// Load balancer pool member, child of a pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadbalancerMember {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    pub address: String,
    pub protocol_port: u16,
    pub weight: u32,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    #[serde(default)]
    pub subnet_uuid: Option<String>,
}

/// Load balancer health monitor, child of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadbalancerHealthmonitor {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    pub monitor_type: String,
    pub delay: u32,
    pub timeout: u32,
    pub max_retries: u32,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub url_path: Option<String>,
    #[serde(default)]
    pub expected_codes: Option<String>,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
}

/// Load balancer listener, child of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadbalancerListener {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    pub protocol: String,
    pub protocol_port: u16,
    #[serde(default)]
    pub connection_limit: Option<i64>,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    /// Default pool (at most one)
    #[serde(default)]
    pub loadbalancer_pool_refs: Vec<ObjectRef>,
}

/// Any backend object, in the controller's `{ "<kind>": { ... } }` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiObject {
    Project(Project),
    VirtualNetwork(VirtualNetwork),
    FloatingIpPool(FloatingIpPool),
    FloatingIp(FloatingIp),
    VirtualMachineInterface(VirtualMachineInterface),
    VirtualMachine(VirtualMachine),
    InstanceIp(InstanceIp),
    LogicalRouter(LogicalRouter),
    SecurityGroup(SecurityGroup),
    LoadbalancerPool(LoadbalancerPool),
    LoadbalancerMember(LoadbalancerMember),
    LoadbalancerHealthmonitor(LoadbalancerHealthmonitor),
    LoadbalancerListener(LoadbalancerListener),
}

macro_rules! each_variant {
    ($value:expr, $binding:ident => $body:expr) => {
        match $value {
            ApiObject::Project($binding) => $body,
            ApiObject::VirtualNetwork($binding) => $body,
            ApiObject::FloatingIpPool($binding) => $body,
            ApiObject::FloatingIp($binding) => $body,
            ApiObject::VirtualMachineInterface($binding) => $body,
            ApiObject::VirtualMachine($binding) => $body,
            ApiObject::InstanceIp($binding) => $body,
            ApiObject::LogicalRouter($binding) => $body,
            ApiObject::SecurityGroup($binding) => $body,
            ApiObject::LoadbalancerPool($binding) => $body,
            ApiObject::LoadbalancerMember($binding) => $body,
            ApiObject::LoadbalancerHealthmonitor($binding) => $body,
            ApiObject::LoadbalancerListener($binding) => $body,
        }
    };
}

impl ApiObject {
    pub fn kind(&self) -> ObjectKind {
        each_variant!(self, o => backend_kind(o))
    }

    pub fn meta(&self) -> &ObjectMeta {
        each_variant!(self, o => o.meta())
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        each_variant!(self, o => o.meta_mut())
    }

    pub fn uuid(&self) -> &str {
        &self.meta().uuid
    }

    /// Outgoing references of this object
    pub fn refs(&self) -> Vec<&ObjectRef> {
        each_variant!(self, o => o.refs())
    }
}

fn backend_kind<T: BackendObject>(_object: &T) -> ObjectKind {
    T::KIND
}

/// Typed view over [`ApiObject`] variants
pub trait BackendObject: Clone + Send + Sync + Sized + 'static {
    const KIND: ObjectKind;

    fn meta(&self) -> &ObjectMeta;
    fn meta_mut(&mut self) -> &mut ObjectMeta;
    fn into_api(self) -> ApiObject;
    fn from_api(object: ApiObject) -> Option<Self>;

    /// Outgoing references, used for back-reference queries
    fn refs(&self) -> Vec<&ObjectRef>;

    fn uuid(&self) -> &str {
        &self.meta().uuid
    }
}

macro_rules! backend_object {
    ($ty:ident => $kind:ident $(; $($field:ident),+)?) => {
        impl BackendObject for $ty {
            const KIND: ObjectKind = ObjectKind::$kind;

            fn meta(&self) -> &ObjectMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut ObjectMeta {
                &mut self.meta
            }

            fn into_api(self) -> ApiObject {
                ApiObject::$kind(self)
            }

            fn from_api(object: ApiObject) -> Option<Self> {
                match object {
                    ApiObject::$kind(inner) => Some(inner),
                    _ => None,
                }
            }

            fn refs(&self) -> Vec<&ObjectRef> {
                #[allow(unused_mut)]
                let mut refs: Vec<&ObjectRef> = Vec::new();
                $($(refs.extend(self.$field.iter());)+)?
                refs
            }
        }
    };
}

backend_object!(Project => Project);
backend_object!(VirtualNetwork => VirtualNetwork);
backend_object!(FloatingIpPool => FloatingIpPool);
backend_object!(FloatingIp => FloatingIp; project_refs, virtual_machine_interface_refs);
backend_object!(VirtualMachineInterface => VirtualMachineInterface; virtual_network_refs, virtual_machine_refs, security_group_refs);
backend_object!(VirtualMachine => VirtualMachine);
backend_object!(InstanceIp => InstanceIp; virtual_network_refs, virtual_machine_interface_refs);
backend_object!(LogicalRouter => LogicalRouter; gateway_network_refs, virtual_machine_interface_refs);
backend_object!(SecurityGroup => SecurityGroup);
backend_object!(LoadbalancerPool => LoadbalancerPool; healthmonitor_refs);
backend_object!(LoadbalancerMember => LoadbalancerMember);
backend_object!(LoadbalancerHealthmonitor => LoadbalancerHealthmonitor);
backend_object!(LoadbalancerListener => LoadbalancerListener; loadbalancer_pool_refs);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_object_envelope_uses_kind_name() {
        let network = VirtualNetwork {
            meta: ObjectMeta::new(
                "6b9570f2-17b1-4fc3-99ec-1b7f7778a29a",
                "net1",
                &["default-domain".to_string(), "demo".to_string()],
                Some("0f2e1d3c-4b5a-6978-8a9b-0c1d2e3f4a5b"),
            ),
            router_external: true,
            is_shared: false,
            admin_state_up: true,
            ipam_subnets: vec![],
        };
        let value = serde_json::to_value(network.clone().into_api()).unwrap();
        assert_eq!(value["virtual-network"]["name"], "net1");
        assert_eq!(
            value["virtual-network"]["fq_name"],
            serde_json::json!(["default-domain", "demo", "net1"])
        );

        let parsed: ApiObject = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.kind(), ObjectKind::VirtualNetwork);
        assert_eq!(VirtualNetwork::from_api(parsed), Some(network));
    }

    #[test]
    fn test_refs_cover_every_reference_list() {
        let vmi = VirtualMachineInterface {
            meta: ObjectMeta::new("a", "port", &[], None),
            mac_addresses: vec![],
            device_owner: None,
            admin_state_up: true,
            virtual_network_refs: vec![ObjectRef::new("net", &[])],
            virtual_machine_refs: vec![ObjectRef::new("vm", &[])],
            security_group_refs: vec![ObjectRef::new("sg", &[])],
        };
        let uuids: Vec<&str> = vmi.refs().iter().map(|r| r.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["net", "vm", "sg"]);
        assert!(Project {
            meta: ObjectMeta::new("p", "p", &[], None),
            description: None,
        }
        .refs()
        .is_empty());
    }
}
