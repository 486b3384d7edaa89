//! Load balancer pools, members, health monitors and listeners

use super::{admin_state, assign, assign_refs, backend_name, project_child, rename};
use sdn_client::{
    LoadbalancerHealthmonitor, LoadbalancerListener, LoadbalancerMember, LoadbalancerPool, ObjectMeta, ObjectRef,
    Project,
};
use tenant_resources::{HealthMonitor, LbAlgorithm, LbProtocol, Listener, Member, MonitorType, Pool};

/// The only provider the controller implements
pub const PROVIDER: &str = "native";

pub const DEFAULT_WEIGHT: u32 = 1;

fn monitor_refs(monitors: &[LoadbalancerHealthmonitor]) -> Vec<ObjectRef> {
    monitors.iter().map(|m| ObjectRef::to_meta(&m.meta)).collect()
}

pub fn pool_to_backend(
    candidate: &Pool,
    id: &str,
    project: &Project,
    protocol: LbProtocol,
    algorithm: LbAlgorithm,
    monitors: &[LoadbalancerHealthmonitor],
) -> LoadbalancerPool {
    LoadbalancerPool {
        meta: project_child(id, candidate.name.as_deref(), project),
        protocol: protocol.as_str().to_string(),
        lb_method: algorithm.as_str().to_string(),
        provider: PROVIDER.to_string(),
        subnet_uuid: candidate.subnet_id.clone(),
        admin_state_up: admin_state(candidate.admin_state_up),
        healthmonitor_refs: monitor_refs(monitors),
    }
}

pub fn apply_pool(
    pool: &mut LoadbalancerPool,
    candidate: &Pool,
    algorithm: Option<LbAlgorithm>,
    monitors: Option<&[LoadbalancerHealthmonitor]>,
) -> bool {
    let mut changed = rename(&mut pool.meta, candidate.name.as_deref());
    changed |= assign(&mut pool.admin_state_up, candidate.admin_state_up.as_ref());
    if let Some(algorithm) = algorithm {
        changed |= assign(&mut pool.lb_method, Some(&algorithm.as_str().to_string()));
    }
    if let Some(monitors) = monitors {
        changed |= assign_refs(&mut pool.healthmonitor_refs, monitor_refs(monitors));
    }
    changed
}

pub fn member_to_backend(candidate: &Member, id: &str, pool: &LoadbalancerPool, address: &str, port: u16) -> LoadbalancerMember {
    LoadbalancerMember {
        meta: ObjectMeta::new(id, &backend_name(None, id), &pool.meta.fq_name, Some(&pool.meta.uuid)),
        address: address.to_string(),
        protocol_port: port,
        weight: candidate.weight.unwrap_or(DEFAULT_WEIGHT),
        admin_state_up: admin_state(candidate.admin_state_up),
        subnet_uuid: candidate.subnet_id.clone(),
    }
}

pub fn apply_member(member: &mut LoadbalancerMember, candidate: &Member) -> bool {
    let mut changed = assign(&mut member.weight, candidate.weight.as_ref());
    changed |= assign(&mut member.admin_state_up, candidate.admin_state_up.as_ref());
    changed
}

/// Probe settings after validation
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub monitor_type: MonitorType,
    pub delay: u32,
    pub timeout: u32,
    pub max_retries: u32,
}

pub fn monitor_to_backend(candidate: &HealthMonitor, id: &str, project: &Project, probe: Probe) -> LoadbalancerHealthmonitor {
    let http = probe.monitor_type.is_http();
    LoadbalancerHealthmonitor {
        meta: project_child(id, None, project),
        monitor_type: probe.monitor_type.as_str().to_string(),
        delay: probe.delay,
        timeout: probe.timeout,
        max_retries: probe.max_retries,
        http_method: http.then(|| candidate.http_method.clone().unwrap_or_else(|| "GET".to_string())),
        url_path: http.then(|| candidate.url_path.clone().unwrap_or_else(|| "/".to_string())),
        expected_codes: http.then(|| candidate.expected_codes.clone().unwrap_or_else(|| "200".to_string())),
        admin_state_up: admin_state(candidate.admin_state_up),
    }
}

pub fn apply_monitor(monitor: &mut LoadbalancerHealthmonitor, candidate: &HealthMonitor) -> bool {
    let mut changed = assign(&mut monitor.delay, candidate.delay.as_ref());
    changed |= assign(&mut monitor.timeout, candidate.timeout.as_ref());
    changed |= assign(&mut monitor.max_retries, candidate.max_retries.as_ref());
    changed |= assign(&mut monitor.admin_state_up, candidate.admin_state_up.as_ref());
    for (target, value) in [
        (&mut monitor.http_method, &candidate.http_method),
        (&mut monitor.url_path, &candidate.url_path),
        (&mut monitor.expected_codes, &candidate.expected_codes),
    ] {
        if value.is_some() && *target != *value {
            *target = value.clone();
            changed = true;
        }
    }
    changed
}

fn pool_refs(pool: Option<&LoadbalancerPool>) -> Vec<ObjectRef> {
    pool.map(|p| vec![ObjectRef::to_meta(&p.meta)]).unwrap_or_default()
}

pub fn listener_to_backend(
    candidate: &Listener,
    id: &str,
    project: &Project,
    protocol: LbProtocol,
    port: u16,
    default_pool: Option<&LoadbalancerPool>,
) -> LoadbalancerListener {
    LoadbalancerListener {
        meta: project_child(id, candidate.name.as_deref(), project),
        protocol: protocol.as_str().to_string(),
        protocol_port: port,
        connection_limit: candidate.connection_limit,
        admin_state_up: admin_state(candidate.admin_state_up),
        loadbalancer_pool_refs: pool_refs(default_pool),
    }
}

/// Applies the mutable listener fields; `default_pool` is `Some(None)` to clear it
pub fn apply_listener(
    listener: &mut LoadbalancerListener,
    candidate: &Listener,
    default_pool: Option<Option<&LoadbalancerPool>>,
) -> bool {
    let mut changed = rename(&mut listener.meta, candidate.name.as_deref());
    changed |= assign(&mut listener.admin_state_up, candidate.admin_state_up.as_ref());
    if candidate.connection_limit.is_some() && listener.connection_limit != candidate.connection_limit {
        listener.connection_limit = candidate.connection_limit;
        changed = true;
    }
    if let Some(pool) = default_pool {
        changed |= assign_refs(&mut listener.loadbalancer_pool_refs, pool_refs(pool));
    }
    changed
}
