//! Listener policy

use super::require_port;
use crate::handlers::{candidate_id, target_id, HandlerContext, ResourcePolicy};
use crate::identifier;
use crate::mapper::{self, lbaas as map};
use crate::sync_error::SyncError;
use crate::validator::{optional_enum, require_enum, require_owner, require_unchanged};
use async_trait::async_trait;
use sdn_client::{typed, BackendObject, LoadbalancerListener, LoadbalancerPool};
use tenant_resources::{LbProtocol, Listener};
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct ListenerPolicy;

fn require_connection_limit(limit: Option<i64>) -> Result<(), SyncError> {
    match limit {
        Some(limit) if limit < -1 => Err(SyncError::range(
            "connectionLimit",
            format!("{} is below -1 (unlimited)", limit),
        )),
        _ => Ok(()),
    }
}

/// The default pool, owned by `tenant` and balancing `protocol`.
///
/// `None` leaves it alone; `Some(None)` clears it.
async fn resolve_default_pool(
    ctx: &HandlerContext,
    pool_id: Option<&str>,
    tenant: &str,
    protocol: &str,
) -> Result<Option<Option<LoadbalancerPool>>, SyncError> {
    let pool_id = match pool_id {
        None => return Ok(None),
        Some("") => return Ok(Some(None)),
        Some(id) => id,
    };
    let pool = ctx
        .validator()
        .reference::<LoadbalancerPool>("defaultPoolId", pool_id)
        .await?;
    require_owner(&pool.meta, tenant, "pool")?;
    if pool.protocol != protocol {
        return Err(SyncError::InvalidCombination(format!(
            "pool {} balances {} but the listener serves {}",
            pool_id, pool.protocol, protocol
        )));
    }
    Ok(Some(Some(pool)))
}

#[async_trait]
impl ResourcePolicy for ListenerPolicy {
    type Candidate = Listener;

    fn normalize(&self, candidate: &mut Listener) -> Result<(), SyncError> {
        candidate.id = identifier::optional_uuid("id", candidate.id.as_deref())?;
        candidate.tenant_id = identifier::optional_uuid("tenantId", candidate.tenant_id.as_deref())?;
        candidate.default_pool_id =
            identifier::optional_uuid_or_empty("defaultPoolId", candidate.default_pool_id.as_deref())?;
        Ok(())
    }

    async fn validate_create(&self, ctx: &HandlerContext, candidate: &Listener) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        let protocol = require_enum::<LbProtocol>("protocol", &candidate.protocol)?;
        require_port("protocolPort", &candidate.protocol_port)?;
        require_connection_limit(candidate.connection_limit)?;

        let validator = ctx.validator();
        let project = validator.project(&tenant).await?;
        validator.absent::<LoadbalancerListener>(&id).await?;
        let name = mapper::backend_name(candidate.name.as_deref(), &id);
        validator
            .unique_name::<LoadbalancerListener>(project.uuid(), &name, None)
            .await?;
        resolve_default_pool(ctx, candidate.default_pool_id.as_deref(), &tenant, protocol.as_str()).await?;
        Ok(())
    }

    async fn validate_update(&self, ctx: &HandlerContext, delta: &Listener, original: &Listener) -> Result<(), SyncError> {
        let id = target_id(delta, original)?;
        let validator = ctx.validator();
        let current = validator.existing::<LoadbalancerListener>(&id).await?;
        require_unchanged("tenantId", &delta.tenant_id, &current.meta.parent_uuid)?;
        let protocol = optional_enum::<LbProtocol>("protocol", &delta.protocol)?;
        require_unchanged(
            "protocol",
            &protocol.map(|p| p.as_str().to_string()),
            &Some(current.protocol.clone()),
        )?;
        require_unchanged("protocolPort", &delta.protocol_port, &Some(u32::from(current.protocol_port)))?;
        require_connection_limit(delta.connection_limit)?;

        let tenant = current.meta.parent_uuid.clone().unwrap_or_default();
        if let Some(name) = delta.name.as_deref() {
            validator
                .unique_name::<LoadbalancerListener>(&tenant, name, Some(&id))
                .await?;
        }
        resolve_default_pool(ctx, delta.default_pool_id.as_deref(), &tenant, &current.protocol).await?;
        Ok(())
    }

    async fn validate_delete(&self, ctx: &HandlerContext, candidate: &Listener) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        ctx.validator().existing::<LoadbalancerListener>(&id).await?;
        Ok(())
    }

    async fn commit_create(&self, ctx: &HandlerContext, candidate: &Listener) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        let protocol = require_enum::<LbProtocol>("protocol", &candidate.protocol)?;
        let port = require_port("protocolPort", &candidate.protocol_port)?;

        let project = ctx.validator().project(&tenant).await?;
        let pool = resolve_default_pool(ctx, candidate.default_pool_id.as_deref(), &tenant, protocol.as_str())
            .await?
            .flatten();
        let listener = map::listener_to_backend(candidate, &id, &project, protocol, port, pool.as_ref());
        typed::create(ctx.client(), listener).await?;
        info!("Created {} listener {} on port {}", protocol, id, port);
        Ok(())
    }

    async fn commit_update(&self, ctx: &HandlerContext, candidate: &Listener) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let current = ctx.validator().existing::<LoadbalancerListener>(&id).await?;
        let tenant = current.meta.parent_uuid.clone().unwrap_or_default();
        let pool = resolve_default_pool(ctx, candidate.default_pool_id.as_deref(), &tenant, &current.protocol).await?;

        let pool_ref = pool.as_ref().map(Option::as_ref);
        let _: LoadbalancerListener = mapper::mutate(ctx, &id, |listener| {
            Ok(map::apply_listener(listener, candidate, pool_ref))
        })
        .await?;
        Ok(())
    }

    async fn commit_delete(&self, ctx: &HandlerContext, candidate: &Listener) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        typed::delete::<LoadbalancerListener>(ctx.client(), &id).await?;
        info!("Deleted listener {}", id);
        Ok(())
    }

    async fn exists(&self, ctx: &HandlerContext, candidate: &Listener) -> Result<bool, SyncError> {
        let id = candidate_id(candidate)?;
        Ok(typed::find::<LoadbalancerListener>(ctx.client(), &id).await?.is_some())
    }
}
