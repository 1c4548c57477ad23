//! Finalizer-gated teardown.
//!
//! Order: parent Cluster gone, then claims and pools deleted and confirmed
//! gone, then the finalizer released. Each wait ends the invocation with a
//! requeue; nothing blocks.

use super::{Outcome, Reconciler};
use crate::error::ControllerError;
use crate::reconcile_helpers::{has_finalizer, parent_cluster_name};
use crds::VmCluster;
use ipam_client::{ClusterIdentity, IpamError};
use tracing::{debug, info};

impl Reconciler {
    pub(crate) async fn reconcile_delete(
        &self,
        cluster: &VmCluster,
        owner: &ClusterIdentity,
    ) -> Result<Outcome, ControllerError> {
        if !has_finalizer(cluster) {
            debug!("VmCluster {} is being deleted and holds no finalizer", owner.key());
            return Ok(Outcome::Done);
        }
        let requeue = Outcome::RequeueAfter(self.settings.requeue_interval);

        if let Some(parent_name) = parent_cluster_name(cluster) {
            if let Some(parent) = self.store.get_parent(&owner.namespace, parent_name).await? {
                if parent.deleting {
                    debug!("Waiting for parent Cluster {} of VmCluster {} to go away", parent.name, owner.key());
                } else {
                    self.store.delete_parent(&owner.namespace, parent_name).await?;
                    info!("Deleting parent Cluster {} of VmCluster {}", parent.name, owner.key());
                }
                return Ok(requeue);
            }
        }

        let claims = self.ipam.list_claims(owner).await?;
        let pools = self.ipam.list_pools(owner).await?;
        if !claims.is_empty() || !pools.is_empty() {
            // Claims first so no address is left pointing at a deleted pool
            for claim in &claims {
                ignore_not_found(self.ipam.delete_claim(&claim.namespace, &claim.name).await)?;
            }
            for pool in &pools {
                ignore_not_found(self.ipam.delete_pool(&pool.namespace, &pool.name).await)?;
            }
            info!(
                "Deleting {} claim(s) and {} pool(s) of VmCluster {}",
                claims.len(),
                pools.len(),
                owner.key()
            );
            return Ok(requeue);
        }

        self.store.remove_finalizer(cluster).await?;
        self.metrics.finalizers_removed.inc();
        info!("Removed finalizer from VmCluster {}", owner.key());
        Ok(Outcome::Done)
    }
}

fn ignore_not_found(result: Result<(), IpamError>) -> Result<(), IpamError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
