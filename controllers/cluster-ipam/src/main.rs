//! VmCluster IPAM Controller
//!
//! Reconciles VmCluster resources:
//! - creates one InClusterIPPool per configured IP family
//! - claims the control-plane endpoint address and publishes it in status
//! - holds a finalizer until the parent Cluster, claims and pools are gone

mod backoff;
mod config;
mod controller;
mod error;
mod metrics;
mod reconcile_helpers;
mod reconciler;
mod store;
mod watcher;

#[cfg(test)]
mod test_utils;

use crate::config::{ControllerConfig, LogFormat};
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    let config = ControllerConfig::from_env()?;
    init_tracing(config.log_format);

    // Install ring before any TLS client is built
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        info!("rustls crypto provider already installed");
    }

    info!("Starting VmCluster IPAM Controller");
    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Control-plane endpoint port: {}", config.endpoint_port);
    info!("  Reconcile timeout: {:?}", config.reconcile_timeout);
    info!("  Requeue interval: {:?}", config.requeue_interval);
    info!("  Metrics address: {}", config.metrics_addr);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
