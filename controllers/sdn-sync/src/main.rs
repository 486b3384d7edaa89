//! SDN Sync Controller
//!
//! Validates tenant networking changes (networks, subnets, ports, routers,
//! security groups, load balancer objects, floating IPs) against the SDN
//! controller's object graph before they are committed, then writes them
//! through and reads them back.
//!
//! The dispatcher calls `can-*` to ask whether a change is admissible and the
//! matching commit call once it has persisted the change on its side, or
//! `apply` to run both phases in one request.

mod api;
mod backoff;
mod config;
mod controller;
mod error;
mod handlers;
mod identifier;
mod ipam;
mod lease;
mod mapper;
mod metrics;
mod state;
mod sync_error;
mod validator;

#[cfg(test)]
mod test_utils;

use crate::config::Config;
use crate::controller::Controller;
use crate::error::ControllerError;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting SDN Sync Controller");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  SDN controller URL: {}", config.sdn_url);
    info!("  Domain: {}", config.domain);
    info!("  Listen address: {}", config.listen_addr);
    info!(
        "  Parent wait: {} attempts from {:?} up to {:?}",
        config.parent_wait.max_attempts, config.parent_wait.initial, config.parent_wait.max
    );
    info!("  Commit retries: {}", config.commit_retry.max_attempts);
    info!("  Lease wait: {:?}", config.lease_wait);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
