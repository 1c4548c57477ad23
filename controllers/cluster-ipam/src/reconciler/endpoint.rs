//! Control-plane endpoint address allocation.

use super::Reconciler;
use crate::error::ControllerError;
use ipam_client::{Claim, ClusterIdentity};
use tracing::{debug, info, warn};

impl Reconciler {
    /// Ensure the cluster's endpoint claim exists against `pool_name`.
    ///
    /// The returned claim carries an address only once the provider has
    /// fulfilled it; an unresolved claim is not an error.
    pub(crate) async fn ensure_endpoint_address(
        &self,
        owner: &ClusterIdentity,
        pool_name: &str,
    ) -> Result<Claim, ControllerError> {
        match self.ipam.get_claim(owner).await {
            Ok(claim) => {
                if claim.pool_name != pool_name {
                    warn!(
                        "Endpoint claim {} of VmCluster {} references pool {}, expected {}",
                        claim.name,
                        owner.key(),
                        claim.pool_name,
                        pool_name
                    );
                }
                return Ok(claim);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        match self.ipam.create_claim(owner, pool_name).await {
            Ok(claim) => {
                self.metrics.claims_created.inc();
                info!("Created endpoint claim {} from pool {} for VmCluster {}", claim.name, pool_name, owner.key());
                Ok(claim)
            }
            Err(e) if e.is_already_exists() => {
                debug!("Endpoint claim for VmCluster {} created concurrently, re-reading", owner.key());
                Ok(self.ipam.get_claim(owner).await?)
            }
            Err(e) => Err(e.into()),
        }
    }
}
