//! Main controller implementation.
//!
//! Builds the Kubernetes-backed reconciler, then runs the VmCluster watcher
//! and the probe server side by side until either stops.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::{self, Metrics};
use crate::reconciler::{Reconciler, ReconcilerSettings};
use crate::store::KubeClusterStore;
use crate::watcher::{WatchedApis, watch_vm_clusters};
use ipam_client::KubeIpamClient;
use kube::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::info;

/// VmCluster IPAM controller.
#[derive(Debug)]
pub struct Controller {
    vm_cluster_watcher: JoinHandle<Result<(), ControllerError>>,
    probe_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing VmCluster IPAM controller");

        let client = Client::try_default().await?;
        let metrics = Metrics::new()?;
        let ready = Arc::new(AtomicBool::new(false));

        let reconciler = Arc::new(Reconciler::new(
            KubeIpamClient::new(client.clone()),
            KubeClusterStore::new(client.clone()),
            ReconcilerSettings::from(&config),
            metrics.clone(),
        ));
        let apis = WatchedApis::new(client, config.namespace.as_deref());

        let probe_server = tokio::spawn(metrics::serve(config.metrics_addr, metrics, ready.clone()));
        let vm_cluster_watcher = tokio::spawn(watch_vm_clusters(apis, reconciler));
        ready.store(true, Ordering::Relaxed);

        Ok(Self {
            vm_cluster_watcher,
            probe_server,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("VmCluster IPAM controller running");

        tokio::select! {
            result = &mut self.vm_cluster_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("VmCluster watcher panicked: {}", e)))??;
            }
            result = &mut self.probe_server => {
                result.map_err(|e| ControllerError::Metrics(format!("Probe server panicked: {}", e)))??;
            }
        }

        self.probe_server.abort();
        info!("VmCluster IPAM controller stopped");
        Ok(())
    }
}
