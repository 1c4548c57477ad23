//! IpamClient trait for mocking
//!
//! Abstracts the pool and claim provider so the reconciler can be unit tested
//! against an in-memory implementation.

use crate::error::IpamError;
use crate::models::*;
use crds::IpFamily;

/// Address pool and address claim provider operations.
///
/// Lookups return `IpamError::NotFound` when the object does not exist.
/// Creates return `IpamError::AlreadyExists` when the deterministic name is
/// taken. All async methods must be `Send` to work with Tokio's work-stealing
/// runtime.
#[async_trait::async_trait]
pub trait IpamClientTrait: Send + Sync {
    // Pools
    async fn get_pool(&self, owner: &ClusterIdentity, family: IpFamily) -> Result<Pool, IpamError>;
    async fn create_pool(&self, owner: &ClusterIdentity, request: &PoolRequest) -> Result<Pool, IpamError>;
    async fn list_pools(&self, owner: &ClusterIdentity) -> Result<Vec<Pool>, IpamError>;
    async fn delete_pool(&self, namespace: &str, name: &str) -> Result<(), IpamError>;

    // Claims
    async fn get_claim(&self, owner: &ClusterIdentity) -> Result<Claim, IpamError>;
    async fn create_claim(&self, owner: &ClusterIdentity, pool_name: &str) -> Result<Claim, IpamError>;
    async fn list_claims(&self, owner: &ClusterIdentity) -> Result<Vec<Claim>, IpamError>;
    async fn delete_claim(&self, namespace: &str, name: &str) -> Result<(), IpamError>;
}
