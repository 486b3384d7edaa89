//! Security group policy

use crate::handlers::{candidate_id, target_id, HandlerContext, ResourcePolicy};
use crate::identifier;
use crate::mapper::{self, security as map};
use crate::sync_error::SyncError;
use crate::validator::{require_non_empty, require_unchanged};
use async_trait::async_trait;
use sdn_client::{typed, BackendObject, SecurityGroup as BackendGroup, VirtualMachineInterface};
use tenant_resources::SecurityGroup;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct SecurityGroupPolicy;

#[async_trait]
impl ResourcePolicy for SecurityGroupPolicy {
    type Candidate = SecurityGroup;

    fn normalize(&self, candidate: &mut SecurityGroup) -> Result<(), SyncError> {
        candidate.id = identifier::optional_uuid("id", candidate.id.as_deref())?;
        candidate.tenant_id = identifier::optional_uuid("tenantId", candidate.tenant_id.as_deref())?;
        Ok(())
    }

    async fn validate_create(&self, ctx: &HandlerContext, candidate: &SecurityGroup) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        let name = require_non_empty("name", &candidate.name)?;

        let validator = ctx.validator();
        let project = validator.project(&tenant).await?;
        validator.absent::<BackendGroup>(&id).await?;
        validator
            .unique_name::<BackendGroup>(project.uuid(), name, None)
            .await
    }

    async fn validate_update(
        &self,
        ctx: &HandlerContext,
        delta: &SecurityGroup,
        original: &SecurityGroup,
    ) -> Result<(), SyncError> {
        let id = target_id(delta, original)?;
        let validator = ctx.validator();
        let current = validator.existing::<BackendGroup>(&id).await?;
        require_unchanged("tenantId", &delta.tenant_id, &current.meta.parent_uuid)?;

        if delta.name.is_some() {
            let name = require_non_empty("name", &delta.name)?;
            let project = current.meta.parent_uuid.clone().unwrap_or_default();
            validator
                .unique_name::<BackendGroup>(&project, name, Some(&id))
                .await?;
        }
        Ok(())
    }

    async fn validate_delete(&self, ctx: &HandlerContext, candidate: &SecurityGroup) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        ctx.validator().existing::<BackendGroup>(&id).await?;

        let mut dependents = Vec::new();
        let ports = typed::back_refs::<VirtualMachineInterface>(ctx.client(), &id).await?;
        if !ports.is_empty() {
            dependents.push(format!("{} attached port(s)", ports.len()));
        }
        let referencing = typed::list::<BackendGroup>(ctx.client(), &[])
            .await?
            .into_iter()
            .filter(|group| group.uuid() != id)
            .filter(|group| group.rules.iter().any(|r| r.remote_group.as_deref() == Some(id.as_str())))
            .count();
        if referencing > 0 {
            dependents.push(format!("rules in {} other group(s) naming it as remote", referencing));
        }

        if dependents.is_empty() {
            Ok(())
        } else {
            Err(SyncError::dependents(BackendGroup::KIND, &id, dependents.join(", ")))
        }
    }

    async fn commit_create(&self, ctx: &HandlerContext, candidate: &SecurityGroup) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        let project = ctx.validator().project(&tenant).await?;
        let group = typed::create(ctx.client(), map::group_to_backend(candidate, &id, &project)).await?;
        info!("Created security group {} ({}) in project {}", id, group.meta.name, tenant);
        Ok(())
    }

    async fn commit_update(&self, ctx: &HandlerContext, candidate: &SecurityGroup) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let _: BackendGroup = mapper::mutate(ctx, &id, |group| Ok(map::apply_group(group, candidate))).await?;
        Ok(())
    }

    async fn commit_delete(&self, ctx: &HandlerContext, candidate: &SecurityGroup) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        typed::delete::<BackendGroup>(ctx.client(), &id).await?;
        info!("Deleted security group {}", id);
        Ok(())
    }

    async fn exists(&self, ctx: &HandlerContext, candidate: &SecurityGroup) -> Result<bool, SyncError> {
        let id = candidate_id(candidate)?;
        Ok(typed::find::<BackendGroup>(ctx.client(), &id).await?.is_some())
    }
}
