//! Member policy
//!
//! Members are children of their pool and share its tenant.

use super::require_port;
use crate::handlers::{candidate_id, target_id, HandlerContext, ResourcePolicy};
use crate::identifier;
use crate::ipam;
use crate::mapper::{self, lbaas as map};
use crate::sync_error::SyncError;
use crate::validator::{require_non_empty, require_owner, require_range, require_unchanged};
use async_trait::async_trait;
use sdn_client::{typed, BackendObject, LoadbalancerMember, LoadbalancerPool};
use std::net::IpAddr;
use tenant_resources::Member;
use tracing::info;

const MAX_WEIGHT: u32 = 256;

#[derive(Debug, Default, Clone, Copy)]
pub struct MemberPolicy;

fn require_address(candidate: &Member) -> Result<IpAddr, SyncError> {
    ipam::parse_ip("address", require_non_empty("address", &candidate.address)?)
}

fn require_weight(candidate: &Member) -> Result<(), SyncError> {
    if let Some(weight) = candidate.weight {
        require_range("weight", weight, 0, MAX_WEIGHT)?;
    }
    Ok(())
}

/// The member's address must lie inside its subnet, when one is named
async fn require_subnet(ctx: &HandlerContext, subnet_id: Option<&str>, address: IpAddr) -> Result<(), SyncError> {
    let Some(subnet_id) = subnet_id else {
        return Ok(());
    };
    let (_, subnet) = mapper::find_subnet(ctx.client(), subnet_id)
        .await?
        .ok_or_else(|| SyncError::InvalidReference {
            field: "subnetId".to_string(),
            kind: "subnet".to_string(),
            id: subnet_id.to_string(),
        })?;
    ipam::require_in_cidr("address", address, &ipam::subnet_network(&subnet)?)
}

#[async_trait]
impl ResourcePolicy for MemberPolicy {
    type Candidate = Member;

    fn normalize(&self, candidate: &mut Member) -> Result<(), SyncError> {
        candidate.id = identifier::optional_uuid("id", candidate.id.as_deref())?;
        candidate.pool_id = identifier::optional_uuid("poolId", candidate.pool_id.as_deref())?;
        candidate.tenant_id = identifier::optional_uuid("tenantId", candidate.tenant_id.as_deref())?;
        candidate.subnet_id = identifier::optional_uuid("subnetId", candidate.subnet_id.as_deref())?;
        Ok(())
    }

    fn parent_keys(&self, candidate: &Member) -> Vec<String> {
        candidate.pool_id.iter().cloned().collect()
    }

    async fn validate_create(&self, ctx: &HandlerContext, candidate: &Member) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let pool_id = identifier::require_uuid("poolId", candidate.pool_id.as_deref())?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        let address = require_address(candidate)?;
        let port = require_port("protocolPort", &candidate.protocol_port)?;
        require_weight(candidate)?;

        let validator = ctx.validator();
        validator.project(&tenant).await?;
        let pool = validator.parent::<LoadbalancerPool>(&pool_id).await?;
        require_owner(&pool.meta, &tenant, "pool")?;
        validator.absent::<LoadbalancerMember>(&id).await?;

        let members = typed::children::<LoadbalancerMember>(ctx.client(), &pool_id).await?;
        let taken = members.iter().any(|m| {
            m.protocol_port == port && m.address.parse::<IpAddr>().is_ok_and(|a| a == address)
        });
        if taken {
            return Err(SyncError::duplicate(
                LoadbalancerMember::KIND,
                &format!("{}:{} in pool {}", address, port, pool_id),
            ));
        }
        require_subnet(ctx, candidate.subnet_id.as_deref(), address).await
    }

    async fn validate_update(&self, ctx: &HandlerContext, delta: &Member, original: &Member) -> Result<(), SyncError> {
        let id = target_id(delta, original)?;
        let validator = ctx.validator();
        let current = validator.existing::<LoadbalancerMember>(&id).await?;
        require_unchanged("poolId", &delta.pool_id, &current.meta.parent_uuid)?;
        let address = delta
            .address
            .as_deref()
            .map(|raw| ipam::parse_ip("address", raw))
            .transpose()?;
        require_unchanged("address", &address, &Some(ipam::parse_ip("address", &current.address)?))?;
        require_unchanged("protocolPort", &delta.protocol_port, &Some(u32::from(current.protocol_port)))?;
        require_unchanged("subnetId", &delta.subnet_id, &current.subnet_uuid)?;
        require_weight(delta)?;

        if delta.tenant_id.is_some() {
            let pool_id = current.meta.parent_uuid.clone().unwrap_or_default();
            let pool = validator.parent::<LoadbalancerPool>(&pool_id).await?;
            require_unchanged("tenantId", &delta.tenant_id, &pool.meta.parent_uuid)?;
        }
        Ok(())
    }

    async fn validate_delete(&self, ctx: &HandlerContext, candidate: &Member) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        ctx.validator().existing::<LoadbalancerMember>(&id).await?;
        Ok(())
    }

    async fn commit_create(&self, ctx: &HandlerContext, candidate: &Member) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let pool_id = identifier::require_uuid("poolId", candidate.pool_id.as_deref())?;
        let address = require_address(candidate)?;
        let port = require_port("protocolPort", &candidate.protocol_port)?;

        let pool = ctx.validator().parent::<LoadbalancerPool>(&pool_id).await?;
        let member = map::member_to_backend(candidate, &id, &pool, &address.to_string(), port);
        typed::create(ctx.client(), member).await?;
        info!("Added member {} ({}:{}) to pool {}", id, address, port, pool_id);
        Ok(())
    }

    async fn commit_update(&self, ctx: &HandlerContext, candidate: &Member) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let _: LoadbalancerMember =
            mapper::mutate(ctx, &id, |member| Ok(map::apply_member(member, candidate))).await?;
        Ok(())
    }

    async fn commit_delete(&self, ctx: &HandlerContext, candidate: &Member) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        typed::delete::<LoadbalancerMember>(ctx.client(), &id).await?;
        info!("Removed member {}", id);
        Ok(())
    }

    async fn exists(&self, ctx: &HandlerContext, candidate: &Member) -> Result<bool, SyncError> {
        let id = candidate_id(candidate)?;
        Ok(typed::find::<LoadbalancerMember>(ctx.client(), &id).await?.is_some())
    }
}
