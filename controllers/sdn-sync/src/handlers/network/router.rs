//! Router policy

use super::first_ref;
use crate::handlers::{candidate_id, target_id, HandlerContext, ResourcePolicy};
use crate::identifier;
use crate::mapper::{self, router as map};
use crate::sync_error::SyncError;
use crate::validator::{require_owner, require_unchanged};
use async_trait::async_trait;
use sdn_client::{typed, BackendObject, LogicalRouter, VirtualMachineInterface, VirtualNetwork};
use tenant_resources::{Router, RouterGateway};
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct RouterPolicy;

/// The gateway network, which must exist and be external.
///
/// `None` when no gateway is requested; `Some(None)` when it is cleared.
async fn resolve_gateway(
    ctx: &HandlerContext,
    gateway: Option<&RouterGateway>,
) -> Result<Option<Option<VirtualNetwork>>, SyncError> {
    let Some(gateway) = gateway else {
        return Ok(None);
    };
    let Some(network_id) = gateway.network_id.as_deref() else {
        return Ok(Some(None));
    };
    let network = ctx
        .validator()
        .reference::<VirtualNetwork>("externalGateway.networkId", network_id)
        .await?;
    if !network.router_external {
        return Err(SyncError::InvalidCombination(format!(
            "gateway network {} is not external",
            network_id
        )));
    }
    Ok(Some(Some(network)))
}

/// Interface ports, which must belong to the tenant and not sit on another router
async fn resolve_interfaces(
    ctx: &HandlerContext,
    router_id: &str,
    tenant: &str,
    ids: Option<&[String]>,
) -> Result<Option<Vec<VirtualMachineInterface>>, SyncError> {
    let Some(ids) = ids else {
        return Ok(None);
    };
    let ports = ctx
        .validator()
        .references::<VirtualMachineInterface>("interfaces", ids)
        .await?;
    for port in &ports {
        require_owner(&port.meta, tenant, "port")?;
        let routers = typed::back_refs::<LogicalRouter>(ctx.client(), port.uuid()).await?;
        if let Some(other) = routers.iter().find(|r| r.uuid() != router_id) {
            return Err(SyncError::InvalidCombination(format!(
                "port {} is already an interface of router {}",
                port.uuid(),
                other.uuid()
            )));
        }
    }
    Ok(Some(ports))
}

#[async_trait]
impl ResourcePolicy for RouterPolicy {
    type Candidate = Router;

    fn normalize(&self, candidate: &mut Router) -> Result<(), SyncError> {
        candidate.id = identifier::optional_uuid("id", candidate.id.as_deref())?;
        candidate.tenant_id = identifier::optional_uuid("tenantId", candidate.tenant_id.as_deref())?;
        candidate.interfaces = identifier::uuid_list("interfaces", candidate.interfaces.as_deref())?;
        if let Some(gateway) = candidate.external_gateway.as_mut() {
            gateway.network_id =
                identifier::optional_uuid("externalGateway.networkId", gateway.network_id.as_deref())?;
        }
        Ok(())
    }

    async fn validate_create(&self, ctx: &HandlerContext, candidate: &Router) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;

        let validator = ctx.validator();
        let project = validator.project(&tenant).await?;
        validator.absent::<LogicalRouter>(&id).await?;
        let name = mapper::backend_name(candidate.name.as_deref(), &id);
        validator
            .unique_name::<LogicalRouter>(project.uuid(), &name, None)
            .await?;

        resolve_gateway(ctx, candidate.external_gateway.as_ref()).await?;
        resolve_interfaces(ctx, &id, &tenant, candidate.interfaces.as_deref()).await?;
        Ok(())
    }

    async fn validate_update(&self, ctx: &HandlerContext, delta: &Router, original: &Router) -> Result<(), SyncError> {
        let id = target_id(delta, original)?;
        let validator = ctx.validator();
        let current = validator.existing::<LogicalRouter>(&id).await?;
        require_unchanged("tenantId", &delta.tenant_id, &current.meta.parent_uuid)?;
        let tenant = current.meta.parent_uuid.clone().unwrap_or_default();

        if let Some(name) = delta.name.as_deref() {
            validator
                .unique_name::<LogicalRouter>(&tenant, name, Some(&id))
                .await?;
        }
        resolve_gateway(ctx, delta.external_gateway.as_ref()).await?;
        resolve_interfaces(ctx, &id, &tenant, delta.interfaces.as_deref()).await?;
        Ok(())
    }

    async fn validate_delete(&self, ctx: &HandlerContext, candidate: &Router) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let router = ctx.validator().existing::<LogicalRouter>(&id).await?;
        if !router.virtual_machine_interface_refs.is_empty() {
            return Err(SyncError::dependents(
                LogicalRouter::KIND,
                &id,
                format!("{} interface(s)", router.virtual_machine_interface_refs.len()),
            ));
        }
        Ok(())
    }

    async fn commit_create(&self, ctx: &HandlerContext, candidate: &Router) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        let project = ctx.validator().project(&tenant).await?;
        let gateway = resolve_gateway(ctx, candidate.external_gateway.as_ref())
            .await?
            .flatten();
        let interfaces = resolve_interfaces(ctx, &id, &tenant, candidate.interfaces.as_deref())
            .await?
            .unwrap_or_default();

        let router = map::router_to_backend(candidate, &id, &project, gateway.as_ref(), &interfaces);
        let router = typed::create(ctx.client(), router).await?;
        info!(
            "Created router {} with gateway {:?} and {} interface(s)",
            id,
            first_ref(&router.gateway_network_refs),
            router.virtual_machine_interface_refs.len()
        );
        Ok(())
    }

    async fn commit_update(&self, ctx: &HandlerContext, candidate: &Router) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let current = ctx.validator().existing::<LogicalRouter>(&id).await?;
        let tenant = current.meta.parent_uuid.clone().unwrap_or_default();
        let gateway = resolve_gateway(ctx, candidate.external_gateway.as_ref()).await?;
        let interfaces = resolve_interfaces(ctx, &id, &tenant, candidate.interfaces.as_deref()).await?;

        let gateway_ref = gateway.as_ref().map(Option::as_ref);
        let _: LogicalRouter = mapper::mutate(ctx, &id, |router| {
            Ok(map::apply_router(router, candidate, gateway_ref, interfaces.as_deref()))
        })
        .await?;
        Ok(())
    }

    async fn commit_delete(&self, ctx: &HandlerContext, candidate: &Router) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        typed::delete::<LogicalRouter>(ctx.client(), &id).await?;
        info!("Deleted router {}", id);
        Ok(())
    }

    async fn exists(&self, ctx: &HandlerContext, candidate: &Router) -> Result<bool, SyncError> {
        let id = candidate_id(candidate)?;
        Ok(typed::find::<LogicalRouter>(ctx.client(), &id).await?.is_some())
    }
}
