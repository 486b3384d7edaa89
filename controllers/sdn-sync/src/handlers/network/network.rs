//! Network policy

use crate::handlers::{candidate_id, target_id, HandlerContext, ResourcePolicy};
use crate::identifier;
use crate::mapper::{self, network as map};
use crate::sync_error::SyncError;
use crate::validator::require_unchanged;
use async_trait::async_trait;
use sdn_client::{typed, BackendObject, LogicalRouter, VirtualMachineInterface, VirtualNetwork};
use tenant_resources::Network;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct NetworkPolicy;

#[async_trait]
impl ResourcePolicy for NetworkPolicy {
    type Candidate = Network;

    fn normalize(&self, candidate: &mut Network) -> Result<(), SyncError> {
        candidate.id = identifier::optional_uuid("id", candidate.id.as_deref())?;
        candidate.tenant_id = identifier::optional_uuid("tenantId", candidate.tenant_id.as_deref())?;
        Ok(())
    }

    async fn validate_create(&self, ctx: &HandlerContext, candidate: &Network) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;

        let validator = ctx.validator();
        let project = validator.project(&tenant).await?;
        validator.absent::<VirtualNetwork>(&id).await?;
        let name = mapper::backend_name(candidate.name.as_deref(), &id);
        validator
            .unique_name::<VirtualNetwork>(project.uuid(), &name, None)
            .await
    }

    async fn validate_update(&self, ctx: &HandlerContext, delta: &Network, original: &Network) -> Result<(), SyncError> {
        let id = target_id(delta, original)?;
        let validator = ctx.validator();
        let current = validator.existing::<VirtualNetwork>(&id).await?;
        require_unchanged("tenantId", &delta.tenant_id, &current.meta.parent_uuid)?;

        if let (Some(name), Some(project)) = (delta.name.as_deref(), current.meta.parent_uuid.as_deref()) {
            validator
                .unique_name::<VirtualNetwork>(project, name, Some(&id))
                .await?;
        }

        if delta.router_external == Some(false) && current.router_external {
            let in_use = map::floating_ips(ctx.client(), &id).await?;
            if !in_use.is_empty() {
                return Err(SyncError::dependents(
                    VirtualNetwork::KIND,
                    &id,
                    format!("{} floating IP(s) allocated", in_use.len()),
                ));
            }
        }
        Ok(())
    }

    async fn validate_delete(&self, ctx: &HandlerContext, candidate: &Network) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let network = ctx.validator().existing::<VirtualNetwork>(&id).await?;

        let mut dependents = Vec::new();
        if !network.ipam_subnets.is_empty() {
            dependents.push(format!("{} subnet(s)", network.ipam_subnets.len()));
        }
        let ports = typed::back_refs::<VirtualMachineInterface>(ctx.client(), &id).await?;
        if !ports.is_empty() {
            dependents.push(format!("{} port(s)", ports.len()));
        }
        if !map::floating_ip_pools(ctx.client(), &id).await?.is_empty() {
            dependents.push("a floating IP pool".to_string());
        }
        let routers = typed::back_refs::<LogicalRouter>(ctx.client(), &id).await?;
        if !routers.is_empty() {
            dependents.push(format!("{} router gateway(s)", routers.len()));
        }

        if dependents.is_empty() {
            Ok(())
        } else {
            Err(SyncError::dependents(VirtualNetwork::KIND, &id, dependents.join(", ")))
        }
    }

    async fn commit_create(&self, ctx: &HandlerContext, candidate: &Network) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        let project = ctx.validator().project(&tenant).await?;

        let network = typed::create(ctx.client(), map::network_to_backend(candidate, &id, &project)).await?;
        info!("Created network {} ({}) in project {}", id, network.meta.name, tenant);
        if network.router_external {
            map::ensure_floating_ip_pool(ctx, &network).await?;
        }
        Ok(())
    }

    async fn commit_update(&self, ctx: &HandlerContext, candidate: &Network) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let network: VirtualNetwork =
            mapper::mutate(ctx, &id, |network| Ok(map::apply_network(network, candidate))).await?;

        if network.router_external {
            map::ensure_floating_ip_pool(ctx, &network).await?;
        } else {
            map::remove_floating_ip_pools(ctx, &id).await?;
        }
        Ok(())
    }

    async fn commit_delete(&self, ctx: &HandlerContext, candidate: &Network) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        typed::delete::<VirtualNetwork>(ctx.client(), &id).await?;
        info!("Deleted network {}", id);
        Ok(())
    }

    async fn exists(&self, ctx: &HandlerContext, candidate: &Network) -> Result<bool, SyncError> {
        let id = candidate_id(candidate)?;
        Ok(typed::find::<VirtualNetwork>(ctx.client(), &id).await?.is_some())
    }
}
