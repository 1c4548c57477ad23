//! VmCluster reconciliation.
//!
//! A VmCluster moves through phases derived from its persisted status, so a
//! restarted controller picks up where the previous invocation stopped:
//!
//! - `Initializing`: finalizer not yet added
//! - `PoolsPending`: fewer pool references than configured families
//! - `EndpointPending`: every pool recorded, endpoint address not resolved
//! - `Ready`: endpoint recorded; stays here until deletion
//! - `Deleting`: deletion requested; dependents torn down in order
//!
//! Submodules:
//! - `pool`: one address pool per configured family
//! - `endpoint`: the control-plane endpoint claim
//! - `delete`: finalizer-gated teardown

mod delete;
mod endpoint;
mod pool;

#[cfg(test)]
mod delete_test;

use crate::backoff::BackoffState;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconcile_helpers::{cluster_key, endpoint_host, has_finalizer, parent_cluster_name};
use crate::store::ClusterStoreTrait;
use chrono::Utc;
use crds::{
    ApiEndpoint, Condition, ENDPOINT_PENDING_REASON, INVALID_IP_CONFIG_REASON, IPAM_READY_CONDITION,
    OWNERSHIP_CONFLICT_REASON, POOLS_PENDING_REASON, PROVIDER_ERROR_REASON, READY_CONDITION, RECONCILE_TIMEOUT_REASON,
    VmCluster, VmClusterStatus, set_condition,
};
use ipam_client::{ClusterIdentity, IpamClientTrait, IpamError, pool_name};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Where a VmCluster is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterPhase {
    /// Finalizer not added yet
    Initializing,
    /// Some configured family has no pool recorded
    PoolsPending,
    /// Pools recorded, endpoint address not resolved
    EndpointPending,
    /// Endpoint recorded
    Ready,
    /// Deletion timestamp set
    Deleting,
}

impl ClusterPhase {
    /// Phase implied by the persisted state of `cluster`.
    pub fn of(cluster: &VmCluster) -> Self {
        let status = cluster.status.as_ref();
        if cluster.metadata.deletion_timestamp.is_some() {
            ClusterPhase::Deleting
        } else if status.is_some_and(|s| s.ready) {
            ClusterPhase::Ready
        } else if !has_finalizer(cluster) {
            ClusterPhase::Initializing
        } else if status.map_or(0, |s| s.in_cluster_ip_pool_ref.len()) < cluster.spec.configured_families().len() {
            ClusterPhase::PoolsPending
        } else {
            ClusterPhase::EndpointPending
        }
    }
}

/// What the caller should do after a successful invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Converged for now; wait for the next change
    Done,
    /// Waiting on something external; check again after the delay
    RequeueAfter(Duration),
}

/// Settings the reconciler takes from `ControllerConfig`.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Port written into the control-plane endpoint
    pub endpoint_port: i32,
    /// Delay before re-checking something external
    pub requeue_interval: Duration,
    /// Deadline for a single invocation
    pub reconcile_timeout: Duration,
}

impl From<&ControllerConfig> for ReconcilerSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            endpoint_port: config.endpoint_port,
            requeue_interval: config.requeue_interval,
            reconcile_timeout: config.reconcile_timeout,
        }
    }
}

/// Reconciles VmCluster resources.
pub struct Reconciler {
    pub(crate) ipam: Box<dyn IpamClientTrait>,
    pub(crate) store: Box<dyn ClusterStoreTrait>,
    pub(crate) settings: ReconcilerSettings,
    pub(crate) metrics: Metrics,
    /// Backoff tracking per VmCluster (namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        ipam: impl IpamClientTrait + 'static,
        store: impl ClusterStoreTrait + 'static,
        settings: ReconcilerSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            ipam: Box::new(ipam),
            store: Box::new(store),
            settings,
            metrics,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run one reconciliation of `cluster`, recording metrics and backoff.
    pub async fn reconcile(&self, cluster: &VmCluster) -> Result<Outcome, ControllerError> {
        self.metrics.reconciliations.inc();
        let timer = self.metrics.reconcile_duration.start_timer();
        let result = self.reconcile_vm_cluster(cluster).await;
        timer.observe_duration();

        match &result {
            Ok(_) => self.reset_error(&cluster_key(cluster)),
            Err(e) => self.metrics.record_error(e.is_permanent()),
        }
        result
    }

    /// Reconcile a VmCluster within the configured deadline.
    ///
    /// Everything persisted before the deadline is kept and the next
    /// invocation resumes from it.
    pub async fn reconcile_vm_cluster(&self, cluster: &VmCluster) -> Result<Outcome, ControllerError> {
        let deadline = Instant::now() + self.settings.reconcile_timeout;
        let owner = ClusterIdentity::from_cluster(cluster)?;
        let phase = ClusterPhase::of(cluster);
        debug!("Reconciling VmCluster {} in phase {:?}", owner.key(), phase);

        if phase == ClusterPhase::Deleting {
            return self.within(deadline, self.reconcile_delete(cluster, &owner)).await;
        }

        if let Some(outcome) = self.within(deadline, self.admit(cluster, &owner)).await? {
            return Ok(outcome);
        }

        let mut status = cluster.status.clone().unwrap_or_default();
        let mut persisted = status.clone();

        if !cluster.spec.has_ip_config() {
            return self
                .within(
                    deadline,
                    self.reconcile_static_endpoint(cluster, &owner, &mut status, &mut persisted),
                )
                .await;
        }

        let result = self
            .within(deadline, self.reconcile_ipam(cluster, &owner, &mut status, &mut persisted))
            .await;
        if let Err(e) = &result {
            self.record_failure(cluster, &owner, &mut status, &mut persisted, e).await;
        }
        result
    }

    /// Await `work`, giving up at `deadline`.
    async fn within<T>(
        &self,
        deadline: Instant,
        work: impl Future<Output = Result<T, ControllerError>>,
    ) -> Result<T, ControllerError> {
        tokio::time::timeout_at(deadline, work)
            .await
            .unwrap_or(Err(ControllerError::Timeout(self.settings.reconcile_timeout)))
    }

    /// Parent linkage, pause and finalizer. Returns an outcome when the
    /// forward path should stop here.
    async fn admit(&self, cluster: &VmCluster, owner: &ClusterIdentity) -> Result<Option<Outcome>, ControllerError> {
        let Some(parent_name) = parent_cluster_name(cluster) else {
            info!("Waiting for Cluster controller to set owner reference on VmCluster {}", owner.key());
            return Ok(Some(Outcome::RequeueAfter(self.settings.requeue_interval)));
        };

        if cluster.is_paused() {
            info!("VmCluster {} is paused, skipping reconciliation", owner.key());
            return Ok(Some(Outcome::Done));
        }

        match self.store.get_parent(&owner.namespace, parent_name).await? {
            Some(parent) if parent.paused => {
                info!("Parent Cluster {} of VmCluster {} is paused, skipping reconciliation", parent.name, owner.key());
                return Ok(Some(Outcome::Done));
            }
            Some(_) => {}
            None => {
                info!("Parent Cluster {} of VmCluster {} not found yet", parent_name, owner.key());
                return Ok(Some(Outcome::RequeueAfter(self.settings.requeue_interval)));
            }
        }

        if !has_finalizer(cluster) {
            self.store.add_finalizer(cluster).await?;
            info!("Added finalizer to VmCluster {}", owner.key());
        }
        Ok(None)
    }

    /// Pools for every configured family, then the endpoint address.
    async fn reconcile_ipam(
        &self,
        cluster: &VmCluster,
        owner: &ClusterIdentity,
        status: &mut VmClusterStatus,
        persisted: &mut VmClusterStatus,
    ) -> Result<Outcome, ControllerError> {
        if status.ready {
            debug!("VmCluster {} already ready", owner.key());
            return Ok(Outcome::Done);
        }

        let families = cluster.spec.configured_families();
        status.in_cluster_ip_pool_ref.truncate(families.len());

        for (slot, (family, config)) in families.iter().enumerate() {
            let expected = pool_name(owner, *family);
            if status.pool_ref(slot).is_some_and(|r| r.name == expected) {
                continue;
            }

            let pool = self.ensure_pool(owner, *family, config).await?;
            if status.set_pool_ref(slot, &pool.name) {
                set_condition(
                    &mut status.conditions,
                    Condition::new_false(
                        IPAM_READY_CONDITION,
                        POOLS_PENDING_REASON,
                        format!("{} of {} address pools recorded", slot + 1, families.len()),
                    ),
                    Utc::now(),
                );
                self.persist_status(cluster, status, persisted).await?;
                debug!("Recorded pool {} in slot {} of VmCluster {}", pool.name, slot, owner.key());
            }
        }

        let Some(endpoint_family) = cluster.spec.endpoint_family() else {
            return Ok(Outcome::Done);
        };
        let claim = self.ensure_endpoint_address(owner, &pool_name(owner, endpoint_family)).await?;

        clear_failure(status);
        status.observed_generation = cluster.metadata.generation;
        let now = Utc::now();

        match claim.address {
            None => {
                let message = format!("Waiting for address claim {} to be fulfilled", claim.name);
                set_condition(
                    &mut status.conditions,
                    Condition::new_false(IPAM_READY_CONDITION, ENDPOINT_PENDING_REASON, message.clone()),
                    now,
                );
                set_condition(
                    &mut status.conditions,
                    Condition::new_false(READY_CONDITION, ENDPOINT_PENDING_REASON, message),
                    now,
                );
                self.persist_status(cluster, status, persisted).await?;
                debug!("Endpoint claim {} of VmCluster {} not resolved yet", claim.name, owner.key());
                Ok(Outcome::RequeueAfter(self.settings.requeue_interval))
            }
            Some(address) => {
                let host = endpoint_host(&address.address).to_string();
                status.control_plane_endpoint = Some(ApiEndpoint {
                    host: host.clone(),
                    port: self.settings.endpoint_port,
                });
                status.ready = true;
                set_condition(&mut status.conditions, Condition::new_true(IPAM_READY_CONDITION), now);
                set_condition(&mut status.conditions, Condition::new_true(READY_CONDITION), now);
                self.persist_status(cluster, status, persisted).await?;
                info!(
                    "VmCluster {} ready with control-plane endpoint {}:{}",
                    owner.key(),
                    host,
                    self.settings.endpoint_port
                );
                Ok(Outcome::Done)
            }
        }
    }

    /// Without address configuration, readiness follows a user-supplied endpoint.
    async fn reconcile_static_endpoint(
        &self,
        cluster: &VmCluster,
        owner: &ClusterIdentity,
        status: &mut VmClusterStatus,
        persisted: &mut VmClusterStatus,
    ) -> Result<Outcome, ControllerError> {
        if status.ready {
            return Ok(Outcome::Done);
        }
        let Some(endpoint) = cluster.spec.control_plane_endpoint.as_ref().filter(|e| !e.is_zero()) else {
            debug!("VmCluster {} has no address configuration and no endpoint", owner.key());
            return Ok(Outcome::Done);
        };

        status.control_plane_endpoint = Some(endpoint.clone());
        status.ready = true;
        status.observed_generation = cluster.metadata.generation;
        set_condition(&mut status.conditions, Condition::new_true(READY_CONDITION), Utc::now());
        self.persist_status(cluster, status, persisted).await?;
        info!("VmCluster {} ready with user-supplied endpoint {}:{}", owner.key(), endpoint.host, endpoint.port);
        Ok(Outcome::Done)
    }

    /// Write `status` when it differs from what was last written.
    pub(crate) async fn persist_status(
        &self,
        cluster: &VmCluster,
        status: &VmClusterStatus,
        persisted: &mut VmClusterStatus,
    ) -> Result<(), ControllerError> {
        if status == persisted {
            return Ok(());
        }
        self.store.patch_status(cluster, status).await?;
        *persisted = status.clone();
        Ok(())
    }

    /// Surface a failed invocation on the VmCluster status. Best effort.
    async fn record_failure(
        &self,
        cluster: &VmCluster,
        owner: &ClusterIdentity,
        status: &mut VmClusterStatus,
        persisted: &mut VmClusterStatus,
        error: &ControllerError,
    ) {
        let reason = match error {
            ControllerError::Validation(_) | ControllerError::Ipam(IpamError::Validation(_)) => {
                INVALID_IP_CONFIG_REASON
            }
            ControllerError::Ipam(IpamError::OwnershipConflict(_)) => OWNERSHIP_CONFLICT_REASON,
            ControllerError::Timeout(_) => RECONCILE_TIMEOUT_REASON,
            _ => PROVIDER_ERROR_REASON,
        };
        if error.is_permanent() {
            status.failure_reason = Some(reason.to_string());
            status.failure_message = Some(error.to_string());
        }
        set_condition(
            &mut status.conditions,
            Condition::new_false(IPAM_READY_CONDITION, reason, error.to_string()),
            Utc::now(),
        );

        if let Err(e) = self.persist_status(cluster, status, persisted).await {
            warn!("Failed to record failure on VmCluster {}: {}", owner.key(), e);
        }
    }

    /// Delay before retrying `key` after a failure
    pub fn next_backoff(&self, key: &str) -> Duration {
        match self.backoff_states.lock() {
            Ok(mut states) => states.entry(key.to_string()).or_default().record_failure(),
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                Duration::from_secs(60)
            }
        }
    }

    /// Consecutive failures recorded for `key`
    pub fn error_count(&self, key: &str) -> u32 {
        self.backoff_states
            .lock()
            .ok()
            .and_then(|states| states.get(key).map(BackoffState::error_count))
            .unwrap_or(0)
    }

    /// Reset backoff for a resource (on successful reconciliation)
    pub fn reset_error(&self, key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(key);
        }
    }
}

fn clear_failure(status: &mut VmClusterStatus) {
    status.failure_reason = None;
    status.failure_message = None;
}
