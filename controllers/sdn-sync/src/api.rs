//! Dispatcher-facing HTTP surface
//!
//! Every resource type is served under `/v1/{resource}/{action}`. Admission
//! actions answer with the decision as the HTTP status; commit actions and
//! `apply` always answer 200 with the outcome in the body.

use crate::handlers::{
    lbaas, network, security, HandlerContext, Operation, ResourceHandler, ResourcePolicy,
};
use crate::metrics::SyncMetrics;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct AdmissionResponse {
    pub status: u16,
}

/// Body of `can-update`
#[derive(Debug, Deserialize)]
pub struct UpdateRequest<C> {
    pub delta: C,
    pub original: C,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn json_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CanCreate,
    Created,
    CanUpdate,
    Updated,
    CanDelete,
    Deleted,
    Apply,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "can-create" => Ok(Action::CanCreate),
            "created" => Ok(Action::Created),
            "can-update" => Ok(Action::CanUpdate),
            "updated" => Ok(Action::Updated),
            "can-delete" => Ok(Action::CanDelete),
            "deleted" => Ok(Action::Deleted),
            "apply" => Ok(Action::Apply),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, format!("invalid request body: {}", e)))
}

fn admission(status: StatusCode) -> Response {
    (
        status,
        Json(AdmissionResponse {
            status: status.as_u16(),
        }),
    )
        .into_response()
}

/// Type-erased entry point into one resource handler
#[async_trait]
pub trait Dispatch: Send + Sync {
    fn resource(&self) -> &'static str;

    async fn dispatch(&self, action: Action, body: &[u8]) -> Result<Response, ApiError>;
}

#[async_trait]
impl<P: ResourcePolicy> Dispatch for ResourceHandler<P> {
    fn resource(&self) -> &'static str {
        ResourceHandler::resource(self)
    }

    async fn dispatch(&self, action: Action, body: &[u8]) -> Result<Response, ApiError> {
        let response = match action {
            Action::CanCreate => admission(self.can_create(&decode(body)?).await),
            Action::CanUpdate => {
                let request: UpdateRequest<P::Candidate> = decode(body)?;
                admission(self.can_update(&request.delta, &request.original).await)
            }
            Action::CanDelete => admission(self.can_delete(&decode(body)?).await),
            Action::Created => Json(self.created(&decode(body)?).await).into_response(),
            Action::Updated => Json(self.updated(&decode(body)?).await).into_response(),
            Action::Deleted => Json(self.deleted(&decode(body)?).await).into_response(),
            Action::Apply => {
                let operation: Operation<P::Candidate> = decode(body)?;
                Json(self.apply(operation).await).into_response()
            }
        };
        Ok(response)
    }
}

#[derive(Clone)]
pub struct ApiState {
    handlers: Arc<HashMap<&'static str, Arc<dyn Dispatch>>>,
    metrics: Arc<SyncMetrics>,
}

impl ApiState {
    /// Registers a handler for every resource type over `ctx`
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        let handlers: Vec<Arc<dyn Dispatch>> = vec![
            Arc::new(ResourceHandler::new(ctx.clone(), network::NetworkPolicy)),
            Arc::new(ResourceHandler::new(ctx.clone(), network::SubnetPolicy)),
            Arc::new(ResourceHandler::new(ctx.clone(), network::PortPolicy)),
            Arc::new(ResourceHandler::new(ctx.clone(), network::RouterPolicy)),
            Arc::new(ResourceHandler::new(ctx.clone(), network::FloatingIpPolicy)),
            Arc::new(ResourceHandler::new(ctx.clone(), security::SecurityGroupPolicy)),
            Arc::new(ResourceHandler::new(ctx.clone(), security::SecurityRulePolicy)),
            Arc::new(ResourceHandler::new(ctx.clone(), lbaas::PoolPolicy)),
            Arc::new(ResourceHandler::new(ctx.clone(), lbaas::MemberPolicy)),
            Arc::new(ResourceHandler::new(ctx.clone(), lbaas::HealthMonitorPolicy)),
            Arc::new(ResourceHandler::new(ctx.clone(), lbaas::ListenerPolicy)),
        ];
        Self {
            handlers: Arc::new(handlers.into_iter().map(|h| (h.resource(), h)).collect()),
            metrics: ctx.metrics.clone(),
        }
    }

    pub fn resources(&self) -> Vec<&'static str> {
        let mut resources: Vec<_> = self.handlers.keys().copied().collect();
        resources.sort_unstable();
        resources
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/v1/{resource}/{action}", post(dispatch))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<ApiState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            (headers, body).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn dispatch(
    State(state): State<ApiState>,
    Path((resource, action)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let handler = state
        .handlers
        .get(resource.as_str())
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, format!("unknown resource '{}'", resource)))?;
    let action = action
        .parse::<Action>()
        .map_err(|e| json_error(StatusCode::NOT_FOUND, e))?;
    debug!("Dispatching {:?} on {}", action, resource);
    handler.dispatch(action, &body).await
}
