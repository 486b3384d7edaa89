//! Security rule policy
//!
//! Rules are entries of their group's rule list. Once created a rule cannot
//! be changed, only deleted.

use super::find_rule;
use crate::handlers::{candidate_id, target_id, HandlerContext, ResourcePolicy};
use crate::identifier;
use crate::ipam;
use crate::mapper::{self, security as map};
use crate::sync_error::SyncError;
use crate::validator::{optional_enum, require_enum, require_owner, require_range, require_unchanged};
use async_trait::async_trait;
use ipnetwork::IpNetwork;
use sdn_client::{BackendObject, PolicyRule, SecurityGroup as BackendGroup};
use tenant_resources::{Direction, EtherType, RuleProtocol, SecurityRule};
use tracing::{debug, info};

const KIND: &str = "security-group-rule";
const MAX_PORT: u32 = 65535;
const MAX_ICMP: u32 = 255;

#[derive(Debug, Default, Clone, Copy)]
pub struct SecurityRulePolicy;

fn not_found(id: &str) -> SyncError {
    SyncError::ResourceNotFound {
        kind: KIND.to_string(),
        id: id.to_string(),
    }
}

fn rule_match(candidate: &SecurityRule) -> Result<map::RuleMatch, SyncError> {
    Ok(map::RuleMatch {
        direction: require_enum("direction", &candidate.direction)?,
        protocol: require_enum("protocol", &candidate.protocol)?,
        ethertype: optional_enum("ethertype", &candidate.ethertype)?.unwrap_or(EtherType::Ipv4),
    })
}

/// Port range for tcp/udp, type and code for icmp, nothing for any
fn require_ports(candidate: &SecurityRule, protocol: RuleProtocol) -> Result<(), SyncError> {
    let (min, max) = (candidate.port_range_min, candidate.port_range_max);
    if protocol.has_ports() {
        match (min, max) {
            (None, None) => Ok(()),
            (Some(min), Some(max)) => {
                require_range("portRangeMin", min, 0, MAX_PORT)?;
                require_range("portRangeMax", max, 0, MAX_PORT)?;
                if min > max {
                    return Err(SyncError::range(
                        "portRangeMin",
                        format!("{} is greater than portRangeMax {}", min, max),
                    ));
                }
                Ok(())
            }
            _ => Err(SyncError::InvalidCombination(
                "portRangeMin and portRangeMax must be given together".to_string(),
            )),
        }
    } else if protocol == RuleProtocol::Icmp {
        if let Some(icmp_type) = min {
            require_range("portRangeMin", icmp_type, 0, MAX_ICMP)?;
        }
        if let Some(icmp_code) = max {
            require_range("portRangeMax", icmp_code, 0, MAX_ICMP)?;
        }
        Ok(())
    } else if min.is_some() || max.is_some() {
        Err(SyncError::InvalidCombination(format!(
            "protocol {} takes no port range",
            protocol
        )))
    } else {
        Ok(())
    }
}

/// Exactly one remote: a CIDR of the rule's address family, or a group
fn require_remote(candidate: &SecurityRule, ethertype: EtherType) -> Result<(), SyncError> {
    match (candidate.remote_cidr.as_deref(), candidate.remote_group_id.as_deref()) {
        (None, None) => Err(SyncError::missing("remoteCidr or remoteGroupId")),
        (Some(_), Some(_)) => Err(SyncError::InvalidCombination(
            "remoteCidr and remoteGroupId are mutually exclusive".to_string(),
        )),
        (Some(raw), None) => {
            let cidr = ipam::parse_cidr("remoteCidr", raw)?;
            let family = match cidr {
                IpNetwork::V4(_) => EtherType::Ipv4,
                IpNetwork::V6(_) => EtherType::Ipv6,
            };
            if family != ethertype {
                return Err(SyncError::InvalidCombination(format!(
                    "remoteCidr {} does not match ethertype {}",
                    raw, ethertype
                )));
            }
            Ok(())
        }
        (None, Some(_)) => Ok(()),
    }
}

fn duplicate(id: &str, group: &str) -> SyncError {
    SyncError::DuplicateEntry {
        kind: KIND.to_string(),
        id: format!("{} (in security group {})", id, group),
    }
}

/// Rejects an entry whose id or match is already in `rules`
fn require_new_entry(rules: &[PolicyRule], entry: &PolicyRule, group: &str) -> Result<(), SyncError> {
    if rules.iter().any(|r| r.rule_uuid == entry.rule_uuid) {
        return Err(duplicate(&entry.rule_uuid, group));
    }
    if let Some(same) = rules.iter().find(|r| map::same_match(r, entry)) {
        return Err(SyncError::DuplicateEntry {
            kind: KIND.to_string(),
            id: format!("{} (same match as {})", entry.rule_uuid, same.rule_uuid),
        });
    }
    Ok(())
}

#[async_trait]
impl ResourcePolicy for SecurityRulePolicy {
    type Candidate = SecurityRule;

    fn normalize(&self, candidate: &mut SecurityRule) -> Result<(), SyncError> {
        candidate.id = identifier::optional_uuid("id", candidate.id.as_deref())?;
        candidate.security_group_id =
            identifier::optional_uuid("securityGroupId", candidate.security_group_id.as_deref())?;
        candidate.tenant_id = identifier::optional_uuid("tenantId", candidate.tenant_id.as_deref())?;
        candidate.remote_group_id = identifier::optional_uuid("remoteGroupId", candidate.remote_group_id.as_deref())?;
        Ok(())
    }

    fn parent_keys(&self, candidate: &SecurityRule) -> Vec<String> {
        candidate.security_group_id.iter().cloned().collect()
    }

    async fn validate_create(&self, ctx: &HandlerContext, candidate: &SecurityRule) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let group_id = identifier::require_uuid("securityGroupId", candidate.security_group_id.as_deref())?;
        let matched = rule_match(candidate)?;
        require_ports(candidate, matched.protocol)?;
        require_remote(candidate, matched.ethertype)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;

        let validator = ctx.validator();
        validator.project(&tenant).await?;
        let group = validator.parent::<BackendGroup>(&group_id).await?;
        require_owner(&group.meta, &tenant, "security group")?;
        if let Some(remote) = candidate.remote_group_id.as_deref() {
            validator.reference::<BackendGroup>("remoteGroupId", remote).await?;
        }

        if let Some((holder, _)) = find_rule(ctx.client(), &id).await? {
            return Err(duplicate(&id, holder.uuid()));
        }
        require_new_entry(&group.rules, &map::rule_to_entry(candidate, &id, matched), &group_id)
    }

    async fn validate_update(
        &self,
        ctx: &HandlerContext,
        delta: &SecurityRule,
        original: &SecurityRule,
    ) -> Result<(), SyncError> {
        let id = target_id(delta, original)?;
        let (group, current) = find_rule(ctx.client(), &id).await?.ok_or_else(|| not_found(&id))?;

        require_unchanged("securityGroupId", &delta.security_group_id, &Some(group.uuid().to_string()))?;
        require_unchanged("tenantId", &delta.tenant_id, &group.meta.parent_uuid)?;
        let direction = optional_enum::<Direction>("direction", &delta.direction)?;
        require_unchanged(
            "direction",
            &direction.map(|d| d.as_str().to_string()),
            &Some(current.direction.clone()),
        )?;
        let protocol = optional_enum::<RuleProtocol>("protocol", &delta.protocol)?;
        require_unchanged(
            "protocol",
            &protocol.map(|p| p.as_str().to_string()),
            &Some(current.protocol.clone()),
        )?;
        let ethertype = optional_enum::<EtherType>("ethertype", &delta.ethertype)?;
        require_unchanged(
            "ethertype",
            &ethertype.map(|e| e.as_str().to_string()),
            &Some(current.ethertype.clone()),
        )?;
        require_unchanged("portRangeMin", &delta.port_range_min, &current.port_min)?;
        require_unchanged("portRangeMax", &delta.port_range_max, &current.port_max)?;
        require_unchanged("remoteCidr", &delta.remote_cidr, &current.remote_cidr)?;
        require_unchanged("remoteGroupId", &delta.remote_group_id, &current.remote_group)?;
        Ok(())
    }

    async fn validate_delete(&self, ctx: &HandlerContext, candidate: &SecurityRule) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        find_rule(ctx.client(), &id).await?.ok_or_else(|| not_found(&id))?;
        Ok(())
    }

    async fn commit_create(&self, ctx: &HandlerContext, candidate: &SecurityRule) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let group_id = identifier::require_uuid("securityGroupId", candidate.security_group_id.as_deref())?;
        let entry = map::rule_to_entry(candidate, &id, rule_match(candidate)?);

        mapper::mutate_embedded::<BackendGroup, PolicyRule, _>(ctx, &group_id, |rules| {
            require_new_entry(rules, &entry, &group_id)?;
            rules.push(entry.clone());
            Ok(true)
        })
        .await?;
        info!(
            "Added {} {} rule {} to security group {}",
            entry.direction, entry.protocol, id, group_id
        );
        Ok(())
    }

    async fn commit_update(&self, ctx: &HandlerContext, candidate: &SecurityRule) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        find_rule(ctx.client(), &id).await?.ok_or_else(|| not_found(&id))?;
        debug!("Rule {} has no mutable fields; nothing to apply", id);
        Ok(())
    }

    async fn commit_delete(&self, ctx: &HandlerContext, candidate: &SecurityRule) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let Some((group, _)) = find_rule(ctx.client(), &id).await? else {
            return Ok(());
        };
        mapper::mutate_embedded::<BackendGroup, PolicyRule, _>(ctx, group.uuid(), |rules| {
            let before = rules.len();
            rules.retain(|r| r.rule_uuid != id);
            Ok(rules.len() != before)
        })
        .await?;
        info!("Removed rule {} from security group {}", id, group.uuid());
        Ok(())
    }

    async fn exists(&self, ctx: &HandlerContext, candidate: &SecurityRule) -> Result<bool, SyncError> {
        let id = candidate_id(candidate)?;
        Ok(find_rule(ctx.client(), &id).await?.is_some())
    }
}
