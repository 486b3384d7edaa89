//! Pool policy

use crate::handlers::{candidate_id, target_id, HandlerContext, ResourcePolicy};
use crate::identifier;
use crate::mapper::{self, lbaas as map};
use crate::sync_error::SyncError;
use crate::validator::{optional_enum, require_enum, require_owner, require_unchanged};
use async_trait::async_trait;
use sdn_client::{
    typed, BackendObject, LoadbalancerHealthmonitor, LoadbalancerListener, LoadbalancerMember, LoadbalancerPool,
};
use tenant_resources::{LbAlgorithm, LbProtocol, Pool};
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct PoolPolicy;

fn require_provider(provider: Option<&str>) -> Result<(), SyncError> {
    match provider {
        Some(p) if !p.eq_ignore_ascii_case(map::PROVIDER) => Err(SyncError::InvalidEnumValue {
            field: "provider".to_string(),
            value: p.to_string(),
            allowed: map::PROVIDER.to_string(),
        }),
        _ => Ok(()),
    }
}

async fn require_subnet(ctx: &HandlerContext, subnet_id: Option<&str>) -> Result<(), SyncError> {
    let Some(subnet_id) = subnet_id else {
        return Ok(());
    };
    if mapper::find_subnet(ctx.client(), subnet_id).await?.is_none() {
        return Err(SyncError::InvalidReference {
            field: "subnetId".to_string(),
            kind: "subnet".to_string(),
            id: subnet_id.to_string(),
        });
    }
    Ok(())
}

async fn require_monitors(
    ctx: &HandlerContext,
    ids: Option<&[String]>,
    tenant: &str,
) -> Result<Option<Vec<LoadbalancerHealthmonitor>>, SyncError> {
    let Some(ids) = ids else {
        return Ok(None);
    };
    let monitors = ctx
        .validator()
        .references::<LoadbalancerHealthmonitor>("healthMonitors", ids)
        .await?;
    for monitor in &monitors {
        require_owner(&monitor.meta, tenant, "health monitor")?;
    }
    Ok(Some(monitors))
}

#[async_trait]
impl ResourcePolicy for PoolPolicy {
    type Candidate = Pool;

    fn normalize(&self, candidate: &mut Pool) -> Result<(), SyncError> {
        candidate.id = identifier::optional_uuid("id", candidate.id.as_deref())?;
        candidate.tenant_id = identifier::optional_uuid("tenantId", candidate.tenant_id.as_deref())?;
        candidate.subnet_id = identifier::optional_uuid("subnetId", candidate.subnet_id.as_deref())?;
        candidate.health_monitors = identifier::uuid_list("healthMonitors", candidate.health_monitors.as_deref())?;
        Ok(())
    }

    async fn validate_create(&self, ctx: &HandlerContext, candidate: &Pool) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        require_enum::<LbProtocol>("protocol", &candidate.protocol)?;
        optional_enum::<LbAlgorithm>("lbAlgorithm", &candidate.lb_algorithm)?;
        require_provider(candidate.provider.as_deref())?;

        let validator = ctx.validator();
        let project = validator.project(&tenant).await?;
        validator.absent::<LoadbalancerPool>(&id).await?;
        let name = mapper::backend_name(candidate.name.as_deref(), &id);
        validator
            .unique_name::<LoadbalancerPool>(project.uuid(), &name, None)
            .await?;
        require_subnet(ctx, candidate.subnet_id.as_deref()).await?;
        require_monitors(ctx, candidate.health_monitors.as_deref(), &tenant).await?;
        Ok(())
    }

    async fn validate_update(&self, ctx: &HandlerContext, delta: &Pool, original: &Pool) -> Result<(), SyncError> {
        let id = target_id(delta, original)?;
        let validator = ctx.validator();
        let current = validator.existing::<LoadbalancerPool>(&id).await?;
        require_unchanged("tenantId", &delta.tenant_id, &current.meta.parent_uuid)?;

        let protocol = optional_enum::<LbProtocol>("protocol", &delta.protocol)?;
        require_unchanged(
            "protocol",
            &protocol.map(|p| p.as_str().to_string()),
            &Some(current.protocol.clone()),
        )?;
        require_unchanged("subnetId", &delta.subnet_id, &current.subnet_uuid)?;
        optional_enum::<LbAlgorithm>("lbAlgorithm", &delta.lb_algorithm)?;
        require_provider(delta.provider.as_deref())?;

        let tenant = current.meta.parent_uuid.clone().unwrap_or_default();
        if let Some(name) = delta.name.as_deref() {
            validator
                .unique_name::<LoadbalancerPool>(&tenant, name, Some(&id))
                .await?;
        }
        require_monitors(ctx, delta.health_monitors.as_deref(), &tenant).await?;
        Ok(())
    }

    async fn validate_delete(&self, ctx: &HandlerContext, candidate: &Pool) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        ctx.validator().existing::<LoadbalancerPool>(&id).await?;

        let mut dependents = Vec::new();
        let members = typed::children::<LoadbalancerMember>(ctx.client(), &id).await?;
        if !members.is_empty() {
            dependents.push(format!("{} member(s)", members.len()));
        }
        let listeners = typed::back_refs::<LoadbalancerListener>(ctx.client(), &id).await?;
        if !listeners.is_empty() {
            dependents.push(format!("{} listener(s) using it as default pool", listeners.len()));
        }

        if dependents.is_empty() {
            Ok(())
        } else {
            Err(SyncError::dependents(LoadbalancerPool::KIND, &id, dependents.join(", ")))
        }
    }

    async fn commit_create(&self, ctx: &HandlerContext, candidate: &Pool) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        let protocol = require_enum::<LbProtocol>("protocol", &candidate.protocol)?;
        let algorithm = optional_enum("lbAlgorithm", &candidate.lb_algorithm)?.unwrap_or(LbAlgorithm::RoundRobin);

        let project = ctx.validator().project(&tenant).await?;
        let monitors = require_monitors(ctx, candidate.health_monitors.as_deref(), &tenant)
            .await?
            .unwrap_or_default();
        let pool = map::pool_to_backend(candidate, &id, &project, protocol, algorithm, &monitors);
        typed::create(ctx.client(), pool).await?;
        info!("Created {} pool {} ({}) in project {}", protocol, id, algorithm, tenant);
        Ok(())
    }

    async fn commit_update(&self, ctx: &HandlerContext, candidate: &Pool) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let current = ctx.validator().existing::<LoadbalancerPool>(&id).await?;
        let tenant = current.meta.parent_uuid.clone().unwrap_or_default();
        let algorithm = optional_enum::<LbAlgorithm>("lbAlgorithm", &candidate.lb_algorithm)?;
        let monitors = require_monitors(ctx, candidate.health_monitors.as_deref(), &tenant).await?;

        let _: LoadbalancerPool = mapper::mutate(ctx, &id, |pool| {
            Ok(map::apply_pool(pool, candidate, algorithm, monitors.as_deref()))
        })
        .await?;
        Ok(())
    }

    async fn commit_delete(&self, ctx: &HandlerContext, candidate: &Pool) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        typed::delete::<LoadbalancerPool>(ctx.client(), &id).await?;
        info!("Deleted pool {}", id);
        Ok(())
    }

    async fn exists(&self, ctx: &HandlerContext, candidate: &Pool) -> Result<bool, SyncError> {
        let id = candidate_id(candidate)?;
        Ok(typed::find::<LoadbalancerPool>(ctx.client(), &id).await?.is_some())
    }
}
