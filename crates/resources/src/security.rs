//! Security group and rule candidates

use crate::candidate::candidate;
use serde::{Deserialize, Serialize};

/// Security group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

candidate!(SecurityGroup, "security-groups", name = name; id, tenant_id, name, description);

/// Rule of a security group
///
/// Exactly one of `remote_cidr` and `remote_group_id` names the remote end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// ingress | egress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,

    /// tcp | udp | icmp | any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// IPv4 | IPv6 (defaults to IPv4)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethertype: Option<String>,

    /// First port, or ICMP type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range_min: Option<u32>,

    /// Last port, or ICMP code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range_max: Option<u32>,

    #[serde(alias = "remoteIpPrefix", skip_serializing_if = "Option::is_none")]
    pub remote_cidr: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_group_id: Option<String>,
}

candidate!(SecurityRule, "security-group-rules", name = -; id, security_group_id, tenant_id, direction, protocol, ethertype, port_range_min, port_range_max, remote_cidr, remote_group_id);
