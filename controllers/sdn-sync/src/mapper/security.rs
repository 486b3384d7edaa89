//! Security groups and their rule entries

use super::project_child;
use super::rename;
use sdn_client::{PolicyRule, Project, SecurityGroup as BackendGroup};
use tenant_resources::{Direction, EtherType, RuleProtocol, SecurityGroup, SecurityRule};

pub fn group_to_backend(candidate: &SecurityGroup, id: &str, project: &Project) -> BackendGroup {
    BackendGroup {
        meta: project_child(id, candidate.name.as_deref(), project),
        description: candidate.description.clone(),
        rules: Vec::new(),
    }
}

pub fn apply_group(group: &mut BackendGroup, candidate: &SecurityGroup) -> bool {
    let mut changed = rename(&mut group.meta, candidate.name.as_deref());
    if candidate.description.is_some() && group.description != candidate.description {
        group.description = candidate.description.clone();
        changed = true;
    }
    changed
}

/// Rule fields after validation
#[derive(Debug, Clone, Copy)]
pub struct RuleMatch {
    pub direction: Direction,
    pub protocol: RuleProtocol,
    pub ethertype: EtherType,
}

pub fn rule_to_entry(candidate: &SecurityRule, id: &str, rule: RuleMatch) -> PolicyRule {
    let (port_min, port_max) = if rule.protocol == RuleProtocol::Any {
        (None, None)
    } else {
        (candidate.port_range_min, candidate.port_range_max)
    };
    PolicyRule {
        rule_uuid: id.to_string(),
        direction: rule.direction.as_str().to_string(),
        protocol: rule.protocol.as_str().to_string(),
        ethertype: rule.ethertype.as_str().to_string(),
        port_min,
        port_max,
        remote_cidr: candidate.remote_cidr.clone(),
        remote_group: candidate.remote_group_id.clone(),
    }
}

/// True if both entries match the same traffic, whatever their ids
pub fn same_match(a: &PolicyRule, b: &PolicyRule) -> bool {
    a.direction == b.direction
        && a.protocol == b.protocol
        && a.ethertype == b.ethertype
        && a.port_min == b.port_min
        && a.port_max == b.port_max
        && a.remote_cidr == b.remote_cidr
        && a.remote_group == b.remote_group
}
