//! Main controller implementation.
//!
//! Connects to the SDN controller, builds one handler per resource type and
//! serves the dispatcher-facing API until interrupted.

use crate::api::{self, ApiState};
use crate::config::Config;
use crate::error::ControllerError;
use crate::handlers::HandlerContext;
use crate::metrics::SyncMetrics;
use sdn_client::{SdnClient, SdnClientTrait};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Main controller for tenant networking sync.
pub struct Controller {
    ctx: Arc<HandlerContext>,
    state: ApiState,
    listen_addr: SocketAddr,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing SDN sync controller");

        let client = SdnClient::new(config.sdn_url.clone(), config.sdn_token.clone())?;

        // Validate token and connectivity before proceeding
        info!("Validating SDN controller token and connectivity...");
        client.validate_token().await.map_err(|e| {
            error!("Failed to validate SDN controller token: {}", e);
            error!("Please ensure:");
            error!("  1. SDN_API_TOKEN environment variable is set correctly");
            error!("  2. The SDN controller is reachable at {}", config.sdn_url);
            ControllerError::Sdn(e)
        })?;
        info!("SDN controller token validated at {}", client.base_url());

        let metrics = Arc::new(SyncMetrics::new()?);
        let ctx = Arc::new(HandlerContext::new(Arc::new(client), &config, metrics));
        let state = ApiState::new(ctx.clone());
        info!("Serving resources: {}", state.resources().join(", "));

        Ok(Self {
            ctx,
            state,
            listen_addr: config.listen_addr,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        let listener = TcpListener::bind(self.listen_addr).await?;
        info!("SDN sync controller listening on {}", listener.local_addr()?);

        let cancel = self.ctx.cancel.clone();
        axum::serve(listener, api::router(self.state))
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for shutdown signal: {}", e);
                    std::future::pending::<()>().await;
                }
                info!("Shutdown requested, cancelling pending waits");
                cancel.cancel();
            })
            .await?;

        info!("SDN sync controller stopped");
        Ok(())
    }
}
