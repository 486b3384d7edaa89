//! Health monitor policy

use crate::handlers::{candidate_id, target_id, HandlerContext, ResourcePolicy};
use crate::identifier;
use crate::mapper::{self, lbaas as map};
use crate::sync_error::SyncError;
use crate::validator::{optional_enum, require, require_enum, require_range, require_unchanged};
use async_trait::async_trait;
use sdn_client::{typed, BackendObject, LoadbalancerHealthmonitor, LoadbalancerPool};
use tenant_resources::{HealthMonitor, MonitorType};
use tracing::info;

const MAX_RETRIES: u32 = 10;
const HTTP_METHODS: &[&str] = &["GET", "HEAD", "POST", "PUT", "DELETE", "OPTIONS"];

#[derive(Debug, Default, Clone, Copy)]
pub struct HealthMonitorPolicy;

/// Delay, timeout and retries; `timeout` may not exceed `delay`
fn require_timing(delay: u32, timeout: u32, max_retries: u32) -> Result<(), SyncError> {
    require_range("delay", delay, 1, u32::MAX)?;
    require_range("timeout", timeout, 1, delay)?;
    require_range("maxRetries", max_retries, 1, MAX_RETRIES)?;
    Ok(())
}

/// Parses "200", "200,202" or "200-204"
fn require_expected_codes(raw: &str) -> Result<(), SyncError> {
    let malformed = || SyncError::malformed("expectedCodes", format!("'{}' is not a status code list or range", raw));
    let code = |s: &str| -> Result<u16, SyncError> {
        let code: u16 = s.trim().parse().map_err(|_| malformed())?;
        if (100..=599).contains(&code) {
            Ok(code)
        } else {
            Err(malformed())
        }
    };
    if let Some((first, last)) = raw.split_once('-') {
        if code(first)? > code(last)? {
            return Err(malformed());
        }
        return Ok(());
    }
    for part in raw.split(',') {
        code(part)?;
    }
    Ok(())
}

/// HTTP probe fields are only accepted on HTTP(S) monitors
fn require_http_fields(candidate: &HealthMonitor, monitor_type: MonitorType) -> Result<(), SyncError> {
    let any_set = candidate.http_method.is_some() || candidate.url_path.is_some() || candidate.expected_codes.is_some();
    if !monitor_type.is_http() {
        if any_set {
            return Err(SyncError::InvalidCombination(format!(
                "{} monitors take no HTTP probe settings",
                monitor_type
            )));
        }
        return Ok(());
    }
    if let Some(method) = candidate.http_method.as_deref() {
        if !HTTP_METHODS.iter().any(|m| m.eq_ignore_ascii_case(method)) {
            return Err(SyncError::InvalidEnumValue {
                field: "httpMethod".to_string(),
                value: method.to_string(),
                allowed: HTTP_METHODS.join(", "),
            });
        }
    }
    if let Some(path) = candidate.url_path.as_deref() {
        if !path.starts_with('/') {
            return Err(SyncError::malformed("urlPath", format!("'{}' must start with '/'", path)));
        }
    }
    if let Some(codes) = candidate.expected_codes.as_deref() {
        require_expected_codes(codes)?;
    }
    Ok(())
}

#[async_trait]
impl ResourcePolicy for HealthMonitorPolicy {
    type Candidate = HealthMonitor;

    fn normalize(&self, candidate: &mut HealthMonitor) -> Result<(), SyncError> {
        candidate.id = identifier::optional_uuid("id", candidate.id.as_deref())?;
        candidate.tenant_id = identifier::optional_uuid("tenantId", candidate.tenant_id.as_deref())?;
        if let Some(method) = candidate.http_method.as_mut() {
            *method = method.to_ascii_uppercase();
        }
        Ok(())
    }

    async fn validate_create(&self, ctx: &HandlerContext, candidate: &HealthMonitor) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        let monitor_type = require_enum::<MonitorType>("type", &candidate.monitor_type)?;
        require_timing(
            *require("delay", &candidate.delay)?,
            *require("timeout", &candidate.timeout)?,
            *require("maxRetries", &candidate.max_retries)?,
        )?;
        require_http_fields(candidate, monitor_type)?;

        let validator = ctx.validator();
        validator.project(&tenant).await?;
        validator.absent::<LoadbalancerHealthmonitor>(&id).await
    }

    async fn validate_update(
        &self,
        ctx: &HandlerContext,
        delta: &HealthMonitor,
        original: &HealthMonitor,
    ) -> Result<(), SyncError> {
        let id = target_id(delta, original)?;
        let current = ctx.validator().existing::<LoadbalancerHealthmonitor>(&id).await?;
        require_unchanged("tenantId", &delta.tenant_id, &current.meta.parent_uuid)?;

        let monitor_type = optional_enum::<MonitorType>("type", &delta.monitor_type)?;
        require_unchanged(
            "type",
            &monitor_type.map(|t| t.as_str().to_string()),
            &Some(current.monitor_type.clone()),
        )?;
        require_timing(
            delta.delay.unwrap_or(current.delay),
            delta.timeout.unwrap_or(current.timeout),
            delta.max_retries.unwrap_or(current.max_retries),
        )?;
        let current_type = current
            .monitor_type
            .parse::<MonitorType>()
            .map_err(|e| SyncError::CommitFailure(format!("stored monitor {} has {}", id, e.value)))?;
        require_http_fields(delta, current_type)
    }

    async fn validate_delete(&self, ctx: &HandlerContext, candidate: &HealthMonitor) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        ctx.validator().existing::<LoadbalancerHealthmonitor>(&id).await?;
        let pools = typed::back_refs::<LoadbalancerPool>(ctx.client(), &id).await?;
        if !pools.is_empty() {
            return Err(SyncError::dependents(
                LoadbalancerHealthmonitor::KIND,
                &id,
                format!("{} pool(s) using it", pools.len()),
            ));
        }
        Ok(())
    }

    async fn commit_create(&self, ctx: &HandlerContext, candidate: &HealthMonitor) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let tenant = identifier::require_uuid("tenantId", candidate.tenant_id.as_deref())?;
        let probe = map::Probe {
            monitor_type: require_enum("type", &candidate.monitor_type)?,
            delay: *require("delay", &candidate.delay)?,
            timeout: *require("timeout", &candidate.timeout)?,
            max_retries: *require("maxRetries", &candidate.max_retries)?,
        };

        let project = ctx.validator().project(&tenant).await?;
        typed::create(ctx.client(), map::monitor_to_backend(candidate, &id, &project, probe)).await?;
        info!(
            "Created {} health monitor {} (every {}s, {} retries)",
            probe.monitor_type, id, probe.delay, probe.max_retries
        );
        Ok(())
    }

    async fn commit_update(&self, ctx: &HandlerContext, candidate: &HealthMonitor) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        let _: LoadbalancerHealthmonitor =
            mapper::mutate(ctx, &id, |monitor| Ok(map::apply_monitor(monitor, candidate))).await?;
        Ok(())
    }

    async fn commit_delete(&self, ctx: &HandlerContext, candidate: &HealthMonitor) -> Result<(), SyncError> {
        let id = candidate_id(candidate)?;
        typed::delete::<LoadbalancerHealthmonitor>(ctx.client(), &id).await?;
        info!("Deleted health monitor {}", id);
        Ok(())
    }

    async fn exists(&self, ctx: &HandlerContext, candidate: &HealthMonitor) -> Result<bool, SyncError> {
        let id = candidate_id(candidate)?;
        Ok(typed::find::<LoadbalancerHealthmonitor>(ctx.client(), &id).await?.is_some())
    }
}
