//! Address pool allocation.

use super::Reconciler;
use crate::error::ControllerError;
use crds::{IPConfigSpec, IpFamily};
use ipam_client::{ClusterIdentity, Pool, PoolRequest, validate_ip_config};
use tracing::{debug, info, warn};

impl Reconciler {
    /// Ensure the pool for `family` exists, creating it from `config` if needed.
    ///
    /// An existing pool is returned as is, without comparing it to `config`.
    /// Only a pool that is about to be created is validated.
    pub(crate) async fn ensure_pool(
        &self,
        owner: &ClusterIdentity,
        family: IpFamily,
        config: &IPConfigSpec,
    ) -> Result<Pool, ControllerError> {
        match self.ipam.get_pool(owner, family).await {
            Ok(pool) => {
                debug!("Pool {} for VmCluster {} already exists", pool.name, owner.key());
                return Ok(pool);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        validate_ip_config(family, config).map_err(|e| ControllerError::Validation(e.to_string()))?;

        let request = PoolRequest {
            family,
            addresses: config.addresses.clone(),
            gateway: config.gateway.clone(),
            prefix: config.prefix,
        };
        match self.ipam.create_pool(owner, &request).await {
            Ok(pool) => {
                self.metrics.pools_created.inc();
                info!("Created {} pool {} for VmCluster {}", family, pool.name, owner.key());
                Ok(pool)
            }
            Err(e) if e.is_already_exists() => {
                // Lost a race with another invocation; use the winner's pool
                warn!("{} pool for VmCluster {} created concurrently, re-reading", family, owner.key());
                Ok(self.ipam.get_pool(owner, family).await?)
            }
            Err(e) => Err(e.into()),
        }
    }
}
