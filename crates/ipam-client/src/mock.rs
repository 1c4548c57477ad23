//! Mock IPAM client for unit testing
//!
//! Stores pools and claims in memory, records every call in order, and can be
//! told to fail a specific operation or to hold objects after deletion so
//! callers can observe deletion that has been requested but not completed.

use crate::error::IpamError;
use crate::ipam_trait::IpamClientTrait;
use crate::models::*;
use crds::IpFamily;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    GetPool,
    CreatePool,
    ListPools,
    DeletePool,
    GetClaim,
    CreateClaim,
    ListClaims,
    DeleteClaim,
}

#[derive(Debug, Default)]
struct MockState {
    // (namespace, name) -> object
    pools: BTreeMap<(String, String), Pool>,
    claims: BTreeMap<(String, String), Claim>,
    // objects whose deletion was requested but is being held
    terminating: Vec<(String, String)>,
    hold_deletes: bool,
    failures: HashMap<MockOperation, String>,
    calls: Vec<String>,
}

/// Mock IPAM client for testing
#[derive(Debug, Clone, Default)]
pub struct MockIpamClient {
    state: Arc<Mutex<MockState>>,
}

impl MockIpamClient {
    /// Create a new, empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pool to the mock store (for test setup)
    pub fn add_pool(&self, pool: Pool) {
        let key = (pool.namespace.clone(), pool.name.clone());
        self.state.lock().unwrap().pools.insert(key, pool);
    }

    /// Add a claim to the mock store (for test setup)
    pub fn add_claim(&self, claim: Claim) {
        let key = (claim.namespace.clone(), claim.name.clone());
        self.state.lock().unwrap().claims.insert(key, claim);
    }

    /// Simulate the provider satisfying a claim
    pub fn resolve_claim(&self, namespace: &str, name: &str, address: ResolvedAddress) {
        let mut state = self.state.lock().unwrap();
        if let Some(claim) = state.claims.get_mut(&(namespace.to_string(), name.to_string())) {
            claim.address = Some(address);
        }
    }

    /// Make the next call of `op` fail with an API error
    pub fn fail_next(&self, op: MockOperation, message: &str) {
        self.state.lock().unwrap().failures.insert(op, message.to_string());
    }

    /// While set, deletes are recorded but objects stay visible
    pub fn hold_deletes(&self, hold: bool) {
        let mut state = self.state.lock().unwrap();
        state.hold_deletes = hold;
        if !hold {
            let terminating = std::mem::take(&mut state.terminating);
            for key in terminating {
                state.pools.remove(&key);
                state.claims.remove(&key);
            }
        }
    }

    pub fn pool(&self, namespace: &str, name: &str) -> Option<Pool> {
        self.state.lock().unwrap().pools.get(&(namespace.to_string(), name.to_string())).cloned()
    }

    pub fn claim(&self, namespace: &str, name: &str) -> Option<Claim> {
        self.state.lock().unwrap().claims.get(&(namespace.to_string(), name.to_string())).cloned()
    }

    pub fn pool_count(&self) -> usize {
        self.state.lock().unwrap().pools.len()
    }

    pub fn claim_count(&self) -> usize {
        self.state.lock().unwrap().claims.len()
    }

    /// Every call made so far, as `operation:name`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of recorded calls whose operation matches `prefix`
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, op: MockOperation, call: String) -> Result<(), IpamError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        match state.failures.remove(&op) {
            Some(message) => Err(IpamError::Api(message)),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl IpamClientTrait for MockIpamClient {
    async fn get_pool(&self, owner: &ClusterIdentity, family: IpFamily) -> Result<Pool, IpamError> {
        let name = pool_name(owner, family);
        self.record(MockOperation::GetPool, format!("get_pool:{}", name))?;
        self.pool(&owner.namespace, &name)
            .ok_or_else(|| IpamError::NotFound(format!("InClusterIPPool {}/{}", owner.namespace, name)))
    }

    async fn create_pool(&self, owner: &ClusterIdentity, request: &PoolRequest) -> Result<Pool, IpamError> {
        let name = pool_name(owner, request.family);
        self.record(MockOperation::CreatePool, format!("create_pool:{}", name))?;
        let mut state = self.state.lock().unwrap();
        let key = (owner.namespace.clone(), name.clone());
        if state.pools.contains_key(&key) {
            return Err(IpamError::AlreadyExists(format!("InClusterIPPool {}/{}", owner.namespace, name)));
        }
        let pool = Pool {
            name,
            namespace: owner.namespace.clone(),
            family: Some(request.family),
            addresses: request.addresses.clone(),
            gateway: Some(request.gateway.clone()),
            prefix: request.prefix,
        };
        state.pools.insert(key, pool.clone());
        Ok(pool)
    }

    async fn list_pools(&self, owner: &ClusterIdentity) -> Result<Vec<Pool>, IpamError> {
        self.record(MockOperation::ListPools, format!("list_pools:{}", owner.name))?;
        let state = self.state.lock().unwrap();
        Ok(IpFamily::ALL
            .iter()
            .filter_map(|f| state.pools.get(&(owner.namespace.clone(), pool_name(owner, *f))).cloned())
            .collect())
    }

    async fn delete_pool(&self, namespace: &str, name: &str) -> Result<(), IpamError> {
        self.record(MockOperation::DeletePool, format!("delete_pool:{}", name))?;
        let mut state = self.state.lock().unwrap();
        let key = (namespace.to_string(), name.to_string());
        if !state.pools.contains_key(&key) {
            return Err(IpamError::NotFound(format!("InClusterIPPool {}/{}", namespace, name)));
        }
        if state.hold_deletes {
            state.terminating.push(key);
        } else {
            state.pools.remove(&key);
        }
        Ok(())
    }

    async fn get_claim(&self, owner: &ClusterIdentity) -> Result<Claim, IpamError> {
        let name = claim_name(owner);
        self.record(MockOperation::GetClaim, format!("get_claim:{}", name))?;
        self.claim(&owner.namespace, &name)
            .ok_or_else(|| IpamError::NotFound(format!("IPAddressClaim {}/{}", owner.namespace, name)))
    }

    async fn create_claim(&self, owner: &ClusterIdentity, pool_name: &str) -> Result<Claim, IpamError> {
        let name = claim_name(owner);
        self.record(MockOperation::CreateClaim, format!("create_claim:{}", name))?;
        let mut state = self.state.lock().unwrap();
        let key = (owner.namespace.clone(), name.clone());
        if state.claims.contains_key(&key) {
            return Err(IpamError::AlreadyExists(format!("IPAddressClaim {}/{}", owner.namespace, name)));
        }
        let claim = Claim {
            name,
            namespace: owner.namespace.clone(),
            pool_name: pool_name.to_string(),
            address: None,
        };
        state.claims.insert(key, claim.clone());
        Ok(claim)
    }

    async fn list_claims(&self, owner: &ClusterIdentity) -> Result<Vec<Claim>, IpamError> {
        self.record(MockOperation::ListClaims, format!("list_claims:{}", owner.name))?;
        let state = self.state.lock().unwrap();
        Ok(state
            .claims
            .get(&(owner.namespace.clone(), claim_name(owner)))
            .cloned()
            .into_iter()
            .collect())
    }

    async fn delete_claim(&self, namespace: &str, name: &str) -> Result<(), IpamError> {
        self.record(MockOperation::DeleteClaim, format!("delete_claim:{}", name))?;
        let mut state = self.state.lock().unwrap();
        let key = (namespace.to_string(), name.to_string());
        if !state.claims.contains_key(&key) {
            return Err(IpamError::NotFound(format!("IPAddressClaim {}/{}", namespace, name)));
        }
        if state.hold_deletes {
            state.terminating.push(key);
        } else {
            state.claims.remove(&key);
        }
        Ok(())
    }
}
