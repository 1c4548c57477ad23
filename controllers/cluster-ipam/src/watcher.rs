//! Kubernetes resource watchers.
//!
//! Drives VmCluster reconciliation with `kube_runtime::Controller`. Changes to
//! the claims and pools a VmCluster owns, and to the parent Cluster naming it
//! as infrastructure, re-trigger the owning VmCluster.

use crate::error::ControllerError;
use crate::reconcile_helpers::cluster_key;
use crate::reconciler::{Outcome, Reconciler};
use crds::{Cluster, IPAddressClaim, InClusterIPPool, VmCluster};
use futures::StreamExt;
use kube::{Api, Client, Resource};
use kube_runtime::{
    Controller,
    controller::{Action, Config as ControllerConfig},
    reflector::ObjectRef,
    watcher,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// APIs for every kind the VmCluster controller watches.
#[derive(Clone)]
pub struct WatchedApis {
    pub vm_clusters: Api<VmCluster>,
    pub claims: Api<IPAddressClaim>,
    pub pools: Api<InClusterIPPool>,
    pub clusters: Api<Cluster>,
}

impl std::fmt::Debug for WatchedApis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchedApis").finish_non_exhaustive()
    }
}

impl WatchedApis {
    /// Watch a single namespace, or every namespace when `namespace` is `None`
    pub fn new(client: Client, namespace: Option<&str>) -> Self {
        match namespace {
            Some(ns) => Self {
                vm_clusters: Api::namespaced(client.clone(), ns),
                claims: Api::namespaced(client.clone(), ns),
                pools: Api::namespaced(client.clone(), ns),
                clusters: Api::namespaced(client, ns),
            },
            None => Self {
                vm_clusters: Api::all(client.clone()),
                claims: Api::all(client.clone()),
                pools: Api::all(client.clone()),
                clusters: Api::all(client),
            },
        }
    }
}

/// Watch VmClusters until a shutdown signal arrives.
pub async fn watch_vm_clusters(apis: WatchedApis, reconciler: Arc<Reconciler>) -> Result<(), ControllerError> {
    info!("Starting VmCluster watcher");

    // Short debounce: a create is followed by our own finalizer and status writes
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(1))
        .concurrency(4);

    Controller::new(apis.vm_clusters, watcher::Config::default())
        .owns(apis.claims, watcher::Config::default())
        .owns(apis.pools, watcher::Config::default())
        .watches(apis.clusters, watcher::Config::default(), infrastructure_ref)
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled VmCluster {}", obj),
                Err(e) => warn!("VmCluster controller error: {}", e),
            }
        })
        .await;

    info!("VmCluster watcher stopped");
    Ok(())
}

async fn reconcile(cluster: Arc<VmCluster>, reconciler: Arc<Reconciler>) -> Result<Action, ControllerError> {
    Ok(action_for(reconciler.reconcile(&cluster).await?))
}

fn action_for(outcome: Outcome) -> Action {
    match outcome {
        Outcome::Done => Action::await_change(),
        Outcome::RequeueAfter(delay) => Action::requeue(delay),
    }
}

/// Permanent errors wait for the object to change; the rest back off per object.
fn error_policy(cluster: Arc<VmCluster>, error: &ControllerError, reconciler: Arc<Reconciler>) -> Action {
    let key = cluster_key(&cluster);
    if error.is_permanent() {
        warn!("VmCluster {} needs a spec change before it can progress: {}", key, error);
        return Action::await_change();
    }
    let delay = reconciler.next_backoff(&key);
    error!(
        "Reconciliation of VmCluster {} failed (attempt {}), retrying in {:?}: {}",
        key,
        reconciler.error_count(&key),
        delay,
        error
    );
    Action::requeue(delay)
}

/// The VmCluster a parent Cluster names as its infrastructure.
fn infrastructure_ref(cluster: Cluster) -> Option<ObjectRef<VmCluster>> {
    let reference = cluster.spec.infrastructure_ref?;
    if reference.kind.as_deref() != Some(VmCluster::kind(&()).as_ref()) {
        return None;
    }
    let name = reference.name?;
    let namespace = reference.namespace.or(cluster.metadata.namespace)?;
    Some(ObjectRef::new(&name).within(&namespace))
}
