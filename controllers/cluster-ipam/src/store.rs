//! Cluster record store.
//!
//! Everything the reconciler writes on the VmCluster itself (finalizer,
//! status) and everything it reads or writes on the parent Cluster goes
//! through `ClusterStoreTrait`, so reconciliation can be tested without an
//! API server.

use crate::error::ControllerError;
use crate::reconcile_helpers::{VMCLUSTER_FINALIZER, status_patch};
use crds::{Cluster, VmCluster, VmClusterStatus};
use kube::api::{DeleteParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info};

/// What the reconciler needs to know about the parent Cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentCluster {
    pub name: String,
    pub paused: bool,
    pub deleting: bool,
}

impl ParentCluster {
    pub fn from_cluster(cluster: &Cluster) -> Self {
        Self {
            name: cluster.name_any(),
            paused: cluster.spec.paused,
            deleting: cluster.metadata.deletion_timestamp.is_some(),
        }
    }
}

#[async_trait::async_trait]
pub trait ClusterStoreTrait: Send + Sync {
    /// Add the controller finalizer; no-op when already present.
    async fn add_finalizer(&self, cluster: &VmCluster) -> Result<(), ControllerError>;
    /// Remove the controller finalizer; no-op when absent or the object is gone.
    async fn remove_finalizer(&self, cluster: &VmCluster) -> Result<(), ControllerError>;
    async fn patch_status(&self, cluster: &VmCluster, status: &VmClusterStatus) -> Result<(), ControllerError>;
    /// Look up the parent Cluster; `None` once it is gone.
    async fn get_parent(&self, namespace: &str, name: &str) -> Result<Option<ParentCluster>, ControllerError>;
    /// Request deletion of the parent Cluster; absent parents are not an error.
    async fn delete_parent(&self, namespace: &str, name: &str) -> Result<(), ControllerError>;
}

/// `ClusterStoreTrait` backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeClusterStore {
    client: Client,
}

impl std::fmt::Debug for KubeClusterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterStore").finish_non_exhaustive()
    }
}

impl KubeClusterStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn vm_clusters(&self, cluster: &VmCluster) -> Api<VmCluster> {
        Api::namespaced(self.client.clone(), &cluster.namespace().unwrap_or_else(|| "default".to_string()))
    }

    async fn patch_finalizers(&self, cluster: &VmCluster, finalizers: Vec<String>) -> Result<(), kube::Error> {
        // resourceVersion turns the merge patch into a compare-and-swap
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": cluster.metadata.resource_version,
            }
        });
        self.vm_clusters(cluster)
            .patch(&cluster.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

#[async_trait::async_trait]
impl ClusterStoreTrait for KubeClusterStore {
    async fn add_finalizer(&self, cluster: &VmCluster) -> Result<(), ControllerError> {
        let mut finalizers = cluster.finalizers().to_vec();
        if finalizers.iter().any(|f| f == VMCLUSTER_FINALIZER) {
            return Ok(());
        }
        finalizers.push(VMCLUSTER_FINALIZER.to_string());
        self.patch_finalizers(cluster, finalizers).await?;
        Ok(())
    }

    async fn remove_finalizer(&self, cluster: &VmCluster) -> Result<(), ControllerError> {
        let finalizers: Vec<String> = cluster
            .finalizers()
            .iter()
            .filter(|f| f.as_str() != VMCLUSTER_FINALIZER)
            .cloned()
            .collect();
        if finalizers.len() == cluster.finalizers().len() {
            return Ok(());
        }
        match self.patch_finalizers(cluster, finalizers).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!("VmCluster {} already gone while removing finalizer", cluster.name_any());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn patch_status(&self, cluster: &VmCluster, status: &VmClusterStatus) -> Result<(), ControllerError> {
        let patch = status_patch(status)?;
        self.vm_clusters(cluster)
            .patch_status(&cluster.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn get_parent(&self, namespace: &str, name: &str) -> Result<Option<ParentCluster>, ControllerError> {
        let api: Api<Cluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?.as_ref().map(ParentCluster::from_cluster))
    }

    async fn delete_parent(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        let api: Api<Cluster> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::background()).await {
            Ok(_) => {
                info!("Requested deletion of parent Cluster {}/{}", namespace, name);
                Ok(())
            }
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
