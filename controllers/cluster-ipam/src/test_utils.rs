//! Test utilities for unit testing the reconciler
//!
//! Builders for VmCluster fixtures and an in-memory `ClusterStoreTrait`.

use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconcile_helpers::cluster_key;
use crate::reconciler::{Reconciler, ReconcilerSettings};
use crate::store::{ClusterStoreTrait, ParentCluster};
use crds::{IPConfigSpec, IpFamily, VmCluster, VmClusterSpec, VmClusterStatus};
use ipam_client::{
    Claim, ClusterIdentity, IpamClientTrait, IpamError, MockIpamClient, Pool, PoolRequest, ResolvedAddress,
    claim_name, pool_name,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_REQUEUE: Duration = Duration::from_secs(10);

pub fn ipv4_config() -> IPConfigSpec {
    IPConfigSpec {
        addresses: vec!["10.0.0.2-10.0.0.10".to_string()],
        gateway: "10.0.0.1".to_string(),
        prefix: 24,
    }
}

pub fn ipv6_config() -> IPConfigSpec {
    IPConfigSpec {
        addresses: vec!["2001:db8::10-2001:db8::20".to_string()],
        gateway: "2001:db8::1".to_string(),
        prefix: 64,
    }
}

/// IPv4-only VmCluster owned by a parent Cluster of the same name
pub fn create_test_vm_cluster(name: &str, namespace: &str) -> VmCluster {
    VmCluster {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(uuid::Uuid::new_v4().to_string()),
            generation: Some(1),
            owner_references: Some(vec![OwnerReference {
                api_version: "cluster.x-k8s.io/v1beta1".to_string(),
                kind: "Cluster".to_string(),
                name: name.to_string(),
                uid: uuid::Uuid::new_v4().to_string(),
                controller: Some(true),
                ..Default::default()
            }]),
            ..Default::default()
        },
        spec: VmClusterSpec {
            ipv4_config: Some(ipv4_config()),
            ..Default::default()
        },
        status: None,
    }
}

pub fn create_dual_stack_vm_cluster(name: &str, namespace: &str) -> VmCluster {
    let mut cluster = create_test_vm_cluster(name, namespace);
    cluster.spec.ipv6_config = Some(ipv6_config());
    cluster
}

pub fn mark_deleting(cluster: &mut VmCluster) {
    cluster.metadata.deletion_timestamp =
        Some(serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).unwrap());
}

pub fn test_owner(cluster: &VmCluster) -> ClusterIdentity {
    ClusterIdentity::from_cluster(cluster).unwrap()
}

pub fn resolved(address: &str) -> ResolvedAddress {
    ResolvedAddress {
        address: address.to_string(),
        prefix: 24,
        gateway: Some("10.0.0.1".to_string()),
    }
}

pub fn test_settings() -> ReconcilerSettings {
    ReconcilerSettings {
        endpoint_port: 6443,
        requeue_interval: TEST_REQUEUE,
        reconcile_timeout: Duration::from_secs(5),
    }
}

pub fn create_test_reconciler(ipam: MockIpamClient, store: MockClusterStore) -> Reconciler {
    Reconciler::new(ipam, store, test_settings(), Metrics::new().unwrap())
}

/// Reconciler over any provider, with explicit settings
pub fn create_test_reconciler_with(
    ipam: impl IpamClientTrait + 'static,
    store: MockClusterStore,
    settings: ReconcilerSettings,
) -> Reconciler {
    Reconciler::new(ipam, store, settings, Metrics::new().unwrap())
}

/// Provider where another writer creates the pool or claim between our
/// lookup and our create: the first lookup of each kind misses, and the
/// object appears in `inner` at that moment.
#[derive(Debug, Clone)]
pub struct RacingIpamClient {
    inner: MockIpamClient,
    pool_raced: Arc<AtomicBool>,
    claim_raced: Arc<AtomicBool>,
}

impl RacingIpamClient {
    pub fn new(inner: MockIpamClient) -> Self {
        Self {
            inner,
            pool_raced: Arc::new(AtomicBool::new(false)),
            claim_raced: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait::async_trait]
impl IpamClientTrait for RacingIpamClient {
    async fn get_pool(&self, owner: &ClusterIdentity, family: IpFamily) -> Result<Pool, IpamError> {
        if !self.pool_raced.swap(true, Ordering::SeqCst) {
            let config = match family {
                IpFamily::V4 => ipv4_config(),
                IpFamily::V6 => ipv6_config(),
            };
            self.inner.add_pool(Pool {
                name: pool_name(owner, family),
                namespace: owner.namespace.clone(),
                family: Some(family),
                addresses: config.addresses,
                gateway: Some(config.gateway),
                prefix: config.prefix,
            });
            return Err(IpamError::NotFound(pool_name(owner, family)));
        }
        self.inner.get_pool(owner, family).await
    }

    async fn create_pool(&self, owner: &ClusterIdentity, request: &PoolRequest) -> Result<Pool, IpamError> {
        self.inner.create_pool(owner, request).await
    }

    async fn list_pools(&self, owner: &ClusterIdentity) -> Result<Vec<Pool>, IpamError> {
        self.inner.list_pools(owner).await
    }

    async fn delete_pool(&self, namespace: &str, name: &str) -> Result<(), IpamError> {
        self.inner.delete_pool(namespace, name).await
    }

    async fn get_claim(&self, owner: &ClusterIdentity) -> Result<Claim, IpamError> {
        if !self.claim_raced.swap(true, Ordering::SeqCst) {
            self.inner.add_claim(Claim {
                name: claim_name(owner),
                namespace: owner.namespace.clone(),
                pool_name: pool_name(owner, IpFamily::V4),
                address: None,
            });
            return Err(IpamError::NotFound(claim_name(owner)));
        }
        self.inner.get_claim(owner).await
    }

    async fn create_claim(&self, owner: &ClusterIdentity, pool_name: &str) -> Result<Claim, IpamError> {
        self.inner.create_claim(owner, pool_name).await
    }

    async fn list_claims(&self, owner: &ClusterIdentity) -> Result<Vec<Claim>, IpamError> {
        self.inner.list_claims(owner).await
    }

    async fn delete_claim(&self, namespace: &str, name: &str) -> Result<(), IpamError> {
        self.inner.delete_claim(namespace, name).await
    }
}

/// Provider whose claim creation hangs for `delay` while `slow` is set.
#[derive(Debug, Clone)]
pub struct SlowIpamClient {
    inner: MockIpamClient,
    delay: Duration,
    slow: Arc<AtomicBool>,
}

impl SlowIpamClient {
    pub fn new(inner: MockIpamClient, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            slow: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_slow(&self, slow: bool) {
        self.slow.store(slow, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl IpamClientTrait for SlowIpamClient {
    async fn get_pool(&self, owner: &ClusterIdentity, family: IpFamily) -> Result<Pool, IpamError> {
        self.inner.get_pool(owner, family).await
    }

    async fn create_pool(&self, owner: &ClusterIdentity, request: &PoolRequest) -> Result<Pool, IpamError> {
        self.inner.create_pool(owner, request).await
    }

    async fn list_pools(&self, owner: &ClusterIdentity) -> Result<Vec<Pool>, IpamError> {
        self.inner.list_pools(owner).await
    }

    async fn delete_pool(&self, namespace: &str, name: &str) -> Result<(), IpamError> {
        self.inner.delete_pool(namespace, name).await
    }

    async fn get_claim(&self, owner: &ClusterIdentity) -> Result<Claim, IpamError> {
        self.inner.get_claim(owner).await
    }

    async fn create_claim(&self, owner: &ClusterIdentity, pool_name: &str) -> Result<Claim, IpamError> {
        if self.slow.load(Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.create_claim(owner, pool_name).await
    }

    async fn list_claims(&self, owner: &ClusterIdentity) -> Result<Vec<Claim>, IpamError> {
        self.inner.list_claims(owner).await
    }

    async fn delete_claim(&self, namespace: &str, name: &str) -> Result<(), IpamError> {
        self.inner.delete_claim(namespace, name).await
    }
}

#[derive(Debug, Default)]
struct StoreState {
    // keyed by namespace/name
    finalizers: HashMap<String, Vec<String>>,
    statuses: HashMap<String, VmClusterStatus>,
    status_writes: Vec<VmClusterStatus>,
    parents: HashMap<String, ParentCluster>,
    parent_delete_requests: Vec<String>,
    fail_status_writes: bool,
}

/// In-memory cluster store.
///
/// `delete_parent` only marks the parent as deleting; tests remove it with
/// `remove_parent` to simulate the API server finishing the deletion.
#[derive(Debug, Clone, Default)]
pub struct MockClusterStore {
    state: Arc<Mutex<StoreState>>,
}

impl MockClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a live, unpaused parent Cluster `namespace/name`
    pub fn with_parent(namespace: &str, name: &str) -> Self {
        let store = Self::new();
        store.set_parent(
            namespace,
            ParentCluster {
                name: name.to_string(),
                paused: false,
                deleting: false,
            },
        );
        store
    }

    pub fn set_parent(&self, namespace: &str, parent: ParentCluster) {
        let key = format!("{}/{}", namespace, parent.name);
        self.state.lock().unwrap().parents.insert(key, parent);
    }

    pub fn remove_parent(&self, namespace: &str, name: &str) {
        self.state.lock().unwrap().parents.remove(&format!("{}/{}", namespace, name));
    }

    pub fn parent(&self, namespace: &str, name: &str) -> Option<ParentCluster> {
        self.state.lock().unwrap().parents.get(&format!("{}/{}", namespace, name)).cloned()
    }

    pub fn parent_delete_requests(&self) -> Vec<String> {
        self.state.lock().unwrap().parent_delete_requests.clone()
    }

    /// Every status written, in order
    pub fn status_writes(&self) -> Vec<VmClusterStatus> {
        self.state.lock().unwrap().status_writes.clone()
    }

    pub fn fail_status_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_status_writes = fail;
    }

    /// `cluster` as a fresh read would return it: stored finalizers and status applied
    pub fn refresh(&self, cluster: &VmCluster) -> VmCluster {
        let state = self.state.lock().unwrap();
        let key = cluster_key(cluster);
        let mut refreshed = cluster.clone();
        if let Some(finalizers) = state.finalizers.get(&key) {
            refreshed.metadata.finalizers = Some(finalizers.clone());
        }
        if let Some(status) = state.statuses.get(&key) {
            refreshed.status = Some(status.clone());
        }
        refreshed
    }
}

#[async_trait::async_trait]
impl ClusterStoreTrait for MockClusterStore {
    async fn add_finalizer(&self, cluster: &VmCluster) -> Result<(), ControllerError> {
        let mut state = self.state.lock().unwrap();
        let finalizers = state
            .finalizers
            .entry(cluster_key(cluster))
            .or_insert_with(|| cluster.metadata.finalizers.clone().unwrap_or_default());
        if !finalizers.iter().any(|f| f == crate::reconcile_helpers::VMCLUSTER_FINALIZER) {
            finalizers.push(crate::reconcile_helpers::VMCLUSTER_FINALIZER.to_string());
        }
        Ok(())
    }

    async fn remove_finalizer(&self, cluster: &VmCluster) -> Result<(), ControllerError> {
        let mut state = self.state.lock().unwrap();
        let finalizers = state
            .finalizers
            .entry(cluster_key(cluster))
            .or_insert_with(|| cluster.metadata.finalizers.clone().unwrap_or_default());
        finalizers.retain(|f| f != crate::reconcile_helpers::VMCLUSTER_FINALIZER);
        Ok(())
    }

    async fn patch_status(&self, cluster: &VmCluster, status: &VmClusterStatus) -> Result<(), ControllerError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_status_writes {
            return Err(ControllerError::Store("status write rejected".to_string()));
        }
        state.statuses.insert(cluster_key(cluster), status.clone());
        state.status_writes.push(status.clone());
        Ok(())
    }

    async fn get_parent(&self, namespace: &str, name: &str) -> Result<Option<ParentCluster>, ControllerError> {
        Ok(self.parent(namespace, name))
    }

    async fn delete_parent(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        let mut state = self.state.lock().unwrap();
        let key = format!("{}/{}", namespace, name);
        state.parent_delete_requests.push(key.clone());
        if let Some(parent) = state.parents.get_mut(&key) {
            parent.deleting = true;
        }
        Ok(())
    }
}

/// Drive `cluster` to Ready: reconcile, resolve its claim to `address`, reconcile again.
///
/// Returns the cluster as stored afterwards.
pub async fn converge(
    reconciler: &Reconciler,
    ipam: &MockIpamClient,
    store: &MockClusterStore,
    cluster: &VmCluster,
    address: &str,
) -> VmCluster {
    reconciler.reconcile_vm_cluster(cluster).await.unwrap();
    let owner = test_owner(cluster);
    ipam.resolve_claim(&owner.namespace, &ipam_client::claim_name(&owner), resolved(address));
    reconciler.reconcile_vm_cluster(&store.refresh(cluster)).await.unwrap();
    store.refresh(cluster)
}
