//! Load balancer candidates: pools, members, health monitors, listeners

use crate::candidate::candidate;
use serde::{Deserialize, Serialize};

/// Load balancer pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// HTTP | HTTPS | TCP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// round-robin | least-connections | source-ip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lb_algorithm: Option<String>,

    /// Only the native provider is supported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,

    /// Subnet the pool's members live on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,

    /// Health monitor ids
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_monitors: Option<Vec<String>>,
}

candidate!(Pool, "pools", name = name; id, tenant_id, name, protocol, lb_algorithm, provider, admin_state_up, subnet_id, health_monitors);

/// Pool member
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,

    /// Must match the pool's tenant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_port: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
}

candidate!(Member, "members", name = -; id, pool_id, tenant_id, address, protocol_port, weight, admin_state_up, subnet_id);

/// Health monitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMonitor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// PING | TCP | HTTP | HTTPS
    #[serde(alias = "type", skip_serializing_if = "Option::is_none")]
    pub monitor_type: Option<String>,

    /// Seconds between probes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,

    /// Seconds to wait for a probe reply; must not exceed `delay`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,

    /// 1..=10
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_codes: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,
}

candidate!(HealthMonitor, "health-monitors", name = -; id, tenant_id, monitor_type, delay, timeout, max_retries, http_method, url_path, expected_codes, admin_state_up);

/// Listener (virtual IP front end)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// HTTP | HTTPS | TCP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_port: Option<u32>,

    /// Pool receiving traffic by default; must exist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_pool_id: Option<String>,

    /// -1 for unlimited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_limit: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,
}

candidate!(Listener, "listeners", name = name; id, tenant_id, name, protocol, protocol_port, default_pool_id, connection_limit, admin_state_up);
