//! Resource handlers
//!
//! A single generic [`ResourceHandler`] runs the admission/commit protocol for
//! every resource type. What differs per type (which fields are required,
//! which parents and references must exist, how the candidate maps onto the
//! backend) lives in a [`ResourcePolicy`]:
//! - `network`: networks, subnets, ports, routers, floating IPs
//! - `security`: security groups and rules
//! - `lbaas`: pools, members, health monitors, listeners
//!
//! Two surfaces share the same pipeline. The dispatcher-compatible pair
//! (`can_*` then `created`/`updated`/`deleted`) reports admission as a status
//! and the commit as a [`CommitReport`]. [`ResourceHandler::apply`] runs both
//! phases under one lease and returns a single [`SyncOutcome`].

pub mod lbaas;
pub mod network;
pub mod security;


use crate::backoff::{Cancellation, RetryPolicy};
use crate::config::Config;
use crate::identifier;
use crate::lease::{Lease, LeaseTable};
use crate::metrics::SyncMetrics;
use crate::state::{ProtocolRun, ProtocolState};
use crate::sync_error::SyncError;
use crate::validator::{require_unchanged, Validator};
use async_trait::async_trait;
use axum::http::StatusCode;
use sdn_client::SdnClientTrait;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tenant_resources::Candidate;
use tracing::{debug, error, info, warn};

/// Shared by every handler: the backend connection and protocol settings
pub struct HandlerContext {
    client: Arc<dyn SdnClientTrait>,
    pub domain: String,
    pub parent_wait: RetryPolicy,
    pub commit_retry: RetryPolicy,
    pub lease_wait: Duration,
    pub leases: LeaseTable,
    pub cancel: Cancellation,
    pub metrics: Arc<SyncMetrics>,
}

impl HandlerContext {
    pub fn new(client: Arc<dyn SdnClientTrait>, config: &Config, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            client,
            domain: config.domain.clone(),
            parent_wait: config.parent_wait.clone(),
            commit_retry: config.commit_retry.clone(),
            lease_wait: config.lease_wait,
            leases: LeaseTable::new(),
            cancel: Cancellation::new(),
            metrics,
        }
    }

    pub fn client(&self) -> &dyn SdnClientTrait {
        self.client.as_ref()
    }

    pub fn validator(&self) -> Validator<'_> {
        Validator::new(self.client(), &self.domain, &self.parent_wait, &self.cancel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle event, as submitted to [`ResourceHandler::apply`]
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "kebab-case")]
pub enum Operation<C> {
    Create { candidate: C },
    Update { delta: C, original: C },
    Delete { candidate: C },
}

impl<C> Operation<C> {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create { .. } => OperationKind::Create,
            Operation::Update { .. } => OperationKind::Update,
            Operation::Delete { .. } => OperationKind::Delete,
        }
    }

    fn into_parts(self) -> (C, Option<C>) {
        match self {
            Operation::Create { candidate } | Operation::Delete { candidate } => (candidate, None),
            Operation::Update { delta, original } => (delta, Some(original)),
        }
    }
}

fn serialize_status<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(status.as_u16())
}

/// Terminal result of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub state: ProtocolState,
    #[serde(serialize_with = "serialize_status")]
    pub status: StatusCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SyncOutcome {
    fn verified() -> Self {
        Self {
            state: ProtocolState::Verified,
            status: StatusCode::OK,
            reason: None,
        }
    }

    fn failed(state: ProtocolState, err: &SyncError) -> Self {
        Self {
            state,
            status: err.status(),
            reason: Some(err.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == ProtocolState::Verified
    }
}

/// Result of a commit call on the two-phase surface
pub type CommitReport = SyncOutcome;

/// Per-type validation and mapping
#[async_trait]
pub trait ResourcePolicy: Send + Sync + 'static {
    type Candidate: Candidate;

    /// Canonicalizes every identifier field present. Runs before any backend call.
    fn normalize(&self, candidate: &mut Self::Candidate) -> Result<(), SyncError>;

    /// Identifiers leased besides the resource's own, such as the aggregate
    /// an embedded resource is stored in
    fn parent_keys(&self, _candidate: &Self::Candidate) -> Vec<String> {
        Vec::new()
    }

    async fn validate_create(&self, ctx: &HandlerContext, candidate: &Self::Candidate) -> Result<(), SyncError>;

    async fn validate_update(
        &self,
        ctx: &HandlerContext,
        delta: &Self::Candidate,
        original: &Self::Candidate,
    ) -> Result<(), SyncError>;

    async fn validate_delete(&self, ctx: &HandlerContext, candidate: &Self::Candidate) -> Result<(), SyncError>;

    async fn commit_create(&self, ctx: &HandlerContext, candidate: &Self::Candidate) -> Result<(), SyncError>;

    /// Applies the updated resource state (the original merged with the delta)
    async fn commit_update(&self, ctx: &HandlerContext, candidate: &Self::Candidate) -> Result<(), SyncError>;

    async fn commit_delete(&self, ctx: &HandlerContext, candidate: &Self::Candidate) -> Result<(), SyncError>;

    /// Whether the resource is currently present in the backend
    async fn exists(&self, ctx: &HandlerContext, candidate: &Self::Candidate) -> Result<bool, SyncError>;

    /// Read-back after a commit
    async fn verify(
        &self,
        ctx: &HandlerContext,
        kind: OperationKind,
        candidate: &Self::Candidate,
    ) -> Result<bool, SyncError> {
        let present = self.exists(ctx, candidate).await?;
        Ok(match kind {
            OperationKind::Delete => !present,
            OperationKind::Create | OperationKind::Update => present,
        })
    }
}

/// Normalized id of a candidate
pub fn candidate_id<C: Candidate>(candidate: &C) -> Result<String, SyncError> {
    identifier::require_uuid("id", candidate.id())
}

/// Id of the resource an update targets
pub fn target_id<C: Candidate>(delta: &C, original: &C) -> Result<String, SyncError> {
    identifier::require_uuid("id", delta.id().or(original.id()))
}

struct Prepared<C> {
    id: String,
    candidate: C,
    original: Option<C>,
}

impl<C: Candidate> Prepared<C> {
    fn merged(&self) -> C {
        match &self.original {
            Some(original) => original.merge(&self.candidate),
            None => self.candidate.clone(),
        }
    }
}

/// Runs the protocol for one resource type
pub struct ResourceHandler<P: ResourcePolicy> {
    ctx: Arc<HandlerContext>,
    policy: P,
}

impl<P: ResourcePolicy> ResourceHandler<P> {
    pub fn new(ctx: Arc<HandlerContext>, policy: P) -> Self {
        Self { ctx, policy }
    }

    /// Path segment naming the resource type
    pub fn resource(&self) -> &'static str {
        <P::Candidate as Candidate>::RESOURCE
    }

    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.ctx
    }

    pub async fn can_create(&self, candidate: &P::Candidate) -> StatusCode {
        self.admission(OperationKind::Create, candidate.clone(), None).await
    }

    pub async fn can_update(&self, delta: &P::Candidate, original: &P::Candidate) -> StatusCode {
        self.admission(OperationKind::Update, delta.clone(), Some(original.clone()))
            .await
    }

    pub async fn can_delete(&self, candidate: &P::Candidate) -> StatusCode {
        self.admission(OperationKind::Delete, candidate.clone(), None).await
    }

    pub async fn created(&self, candidate: &P::Candidate) -> CommitReport {
        self.commit_call(OperationKind::Create, candidate.clone()).await
    }

    pub async fn updated(&self, candidate: &P::Candidate) -> CommitReport {
        self.commit_call(OperationKind::Update, candidate.clone()).await
    }

    pub async fn deleted(&self, candidate: &P::Candidate) -> CommitReport {
        self.commit_call(OperationKind::Delete, candidate.clone()).await
    }

    /// Validates and commits under one lease.
    pub async fn apply(&self, operation: Operation<P::Candidate>) -> SyncOutcome {
        let kind = operation.kind();
        let (candidate, original) = operation.into_parts();
        let label = label(&candidate, original.as_ref());
        let mut run = ProtocolRun::new(self.resource(), label.clone());
        run.advance(ProtocolState::Validating);

        let admitted = async {
            let prepared = self.prepare(candidate, original)?;
            let lease = self.lease(&prepared).await?;
            self.validate(kind, &prepared).await?;
            Ok::<_, SyncError>((prepared, lease))
        }
        .await;
        self.record_admission(kind, &label, admitted.as_ref().map(|_| ()));

        match admitted {
            Ok((prepared, _lease)) => {
                run.advance(ProtocolState::Accepted);
                self.commit(kind, &mut run, &prepared).await
            }
            Err(e) => SyncOutcome::failed(run.advance(ProtocolState::Rejected), &e),
        }
    }

    fn prepare(&self, mut candidate: P::Candidate, original: Option<P::Candidate>) -> Result<Prepared<P::Candidate>, SyncError> {
        self.policy.normalize(&mut candidate)?;
        let original = match original {
            Some(mut original) => {
                self.policy.normalize(&mut original)?;
                require_unchanged(
                    "id",
                    &candidate.id().map(str::to_string),
                    &original.id().map(str::to_string),
                )?;
                Some(original)
            }
            None => None,
        };
        let raw_id = candidate.id().or_else(|| original.as_ref().and_then(|o| o.id()));
        let id = identifier::require_uuid("id", raw_id)?;
        Ok(Prepared {
            id,
            candidate,
            original,
        })
    }

    async fn lease(&self, prepared: &Prepared<P::Candidate>) -> Result<Lease, SyncError> {
        let mut keys = vec![prepared.id.clone()];
        keys.extend(self.policy.parent_keys(&prepared.merged()));
        self.ctx.leases.acquire(keys, self.ctx.lease_wait).await
    }

    async fn validate(&self, kind: OperationKind, prepared: &Prepared<P::Candidate>) -> Result<(), SyncError> {
        match kind {
            OperationKind::Create => self.policy.validate_create(&self.ctx, &prepared.candidate).await,
            OperationKind::Update => {
                let original = prepared.original.clone().unwrap_or_default();
                self.policy
                    .validate_update(&self.ctx, &prepared.candidate, &original)
                    .await
            }
            OperationKind::Delete => self.policy.validate_delete(&self.ctx, &prepared.candidate).await,
        }
    }

    async fn admission(
        &self,
        kind: OperationKind,
        candidate: P::Candidate,
        original: Option<P::Candidate>,
    ) -> StatusCode {
        let label = label(&candidate, original.as_ref());
        let result = async {
            let prepared = self.prepare(candidate, original)?;
            let _lease = self.lease(&prepared).await?;
            self.validate(kind, &prepared).await
        }
        .await;
        self.record_admission(kind, &label, result.as_ref().map(|_| ()))
    }

    fn record_admission(&self, kind: OperationKind, label: &str, result: Result<(), &SyncError>) -> StatusCode {
        let status = match result {
            Ok(()) => {
                debug!("Accepted {} of {} {}", kind, self.resource(), label);
                StatusCode::OK
            }
            Err(e) => {
                info!(
                    "Rejected {} of {} {} with {}: {}",
                    kind,
                    self.resource(),
                    label,
                    e.status().as_u16(),
                    e
                );
                e.status()
            }
        };
        self.ctx
            .metrics
            .admission(self.resource(), kind.as_str(), status.as_u16());
        status
    }

    async fn commit_call(&self, kind: OperationKind, candidate: P::Candidate) -> CommitReport {
        let label = label(&candidate, None);
        let mut run = ProtocolRun::accepted(self.resource(), label.clone());
        let prepared = match self.prepare(candidate, None) {
            Ok(prepared) => prepared,
            Err(e) => {
                error!("Cannot {} {} {}: {}", kind, self.resource(), label, e);
                run.advance(ProtocolState::Committing);
                return self.conclude(kind, &mut run, Err(e));
            }
        };
        match self.lease(&prepared).await {
            Ok(_lease) => self.commit(kind, &mut run, &prepared).await,
            Err(e) => {
                warn!("Cannot {} {} {}: {}", kind, self.resource(), label, e);
                run.advance(ProtocolState::Committing);
                self.conclude(kind, &mut run, Err(e))
            }
        }
    }

    async fn commit(&self, kind: OperationKind, run: &mut ProtocolRun, prepared: &Prepared<P::Candidate>) -> SyncOutcome {
        run.advance(ProtocolState::Committing);
        let merged = prepared.merged();
        let committed = match kind {
            OperationKind::Create => self.policy.commit_create(&self.ctx, &merged).await,
            OperationKind::Update => self.policy.commit_update(&self.ctx, &merged).await,
            OperationKind::Delete => self.policy.commit_delete(&self.ctx, &merged).await,
        };
        if let Err(e) = committed {
            error!("Failed to {} {} {}: {}", kind, self.resource(), prepared.id, e);
            return self.conclude(kind, run, Err(e));
        }

        let verified = match self.policy.verify(&self.ctx, kind, &merged).await {
            Ok(true) => {
                info!("Committed {} of {} {} (verified)", kind, self.resource(), prepared.id);
                Ok(())
            }
            Ok(false) => {
                warn!(
                    "Committed {} of {} {} but the read-back does not reflect it",
                    kind,
                    self.resource(),
                    prepared.id
                );
                Err(SyncError::CommitFailure(format!(
                    "{} {} not confirmed by read-back after {}",
                    self.resource(),
                    prepared.id,
                    kind
                )))
            }
            Err(e) => {
                warn!("Could not verify {} of {} {}: {}", kind, self.resource(), prepared.id, e);
                Err(e)
            }
        };
        self.conclude(kind, run, verified)
    }

    fn conclude(&self, kind: OperationKind, run: &mut ProtocolRun, result: Result<(), SyncError>) -> SyncOutcome {
        let outcome = match result {
            Ok(()) => {
                run.advance(ProtocolState::Verified);
                SyncOutcome::verified()
            }
            Err(e) => SyncOutcome::failed(run.advance(ProtocolState::Unverified), &e),
        };
        self.ctx
            .metrics
            .commit(self.resource(), kind.as_str(), outcome.state.as_str());
        outcome
    }
}

fn label<C: Candidate>(candidate: &C, original: Option<&C>) -> String {
    candidate
        .id()
        .or_else(|| original.and_then(|o| o.id()))
        .unwrap_or("-")
        .to_string()
}

pub type NetworkHandler = ResourceHandler<network::NetworkPolicy>;
pub type SubnetHandler = ResourceHandler<network::SubnetPolicy>;
pub type PortHandler = ResourceHandler<network::PortPolicy>;
pub type RouterHandler = ResourceHandler<network::RouterPolicy>;
pub type FloatingIpHandler = ResourceHandler<network::FloatingIpPolicy>;
pub type SecurityGroupHandler = ResourceHandler<security::SecurityGroupPolicy>;
pub type SecurityRuleHandler = ResourceHandler<security::SecurityRulePolicy>;
pub type PoolHandler = ResourceHandler<lbaas::PoolPolicy>;
pub type MemberHandler = ResourceHandler<lbaas::MemberPolicy>;
pub type HealthMonitorHandler = ResourceHandler<lbaas::HealthMonitorPolicy>;
pub type ListenerHandler = ResourceHandler<lbaas::ListenerPolicy>;
