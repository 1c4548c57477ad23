//! Kubernetes-backed IPAM client
//!
//! Talks to the in-cluster IPAM provider through its CRDs:
//! `InClusterIPPool` for pools, `IPAddressClaim` for claims and `IPAddress`
//! for resolved claims.

use crate::error::IpamError;
use crate::ipam_trait::IpamClientTrait;
use crate::models::*;
use crds::{
    IPAddress, IPAddressClaim, IPAddressClaimSpec, InClusterIPPool, InClusterIPPoolSpec, IpFamily,
    TypedLocalObjectReference, IN_CLUSTER_IP_POOL_KIND, IPAM_API_GROUP, IP_FAMILY_LABEL,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client};
use tracing::{debug, info};

/// IPAM client backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeIpamClient {
    client: Client,
}

impl std::fmt::Debug for KubeIpamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeIpamClient").finish_non_exhaustive()
    }
}

impl KubeIpamClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pools(&self, namespace: &str) -> Api<InClusterIPPool> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn claims(&self, namespace: &str) -> Api<IPAddressClaim> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn addresses(&self, namespace: &str) -> Api<IPAddress> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Rejects objects that carry our deterministic name but another owner.
    fn check_owner(owner: &ClusterIdentity, meta: &ObjectMeta, what: &str) -> Result<(), IpamError> {
        if owner.owns(meta) {
            Ok(())
        } else {
            Err(IpamError::OwnershipConflict(format!(
                "{} {}/{} is not owned by VmCluster {}",
                what,
                owner.namespace,
                meta.name.as_deref().unwrap_or("<unknown>"),
                owner.key()
            )))
        }
    }

    fn to_pool(pool: InClusterIPPool, default_namespace: &str) -> Pool {
        let family = pool
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(IP_FAMILY_LABEL))
            .and_then(|f| match f.as_str() {
                "v4" => Some(IpFamily::V4),
                "v6" => Some(IpFamily::V6),
                _ => None,
            });
        Pool {
            name: pool.metadata.name.unwrap_or_default(),
            namespace: pool.metadata.namespace.unwrap_or_else(|| default_namespace.to_string()),
            family,
            addresses: pool.spec.addresses,
            gateway: pool.spec.gateway,
            prefix: pool.spec.prefix,
        }
    }

    /// Reads the IPAddress linked from a claim, if the provider created one.
    async fn resolve(&self, claim: &IPAddressClaim, namespace: &str) -> Result<Option<ResolvedAddress>, IpamError> {
        let Some(address_ref) = claim.status.as_ref().and_then(|s| s.address_ref.as_ref()) else {
            return Ok(None);
        };
        if address_ref.name.is_empty() {
            return Ok(None);
        }

        match self.addresses(namespace).get(&address_ref.name).await {
            Ok(address) if !address.spec.address.is_empty() => Ok(Some(ResolvedAddress {
                address: address.spec.address,
                prefix: address.spec.prefix,
                gateway: address.spec.gateway,
            })),
            Ok(_) => Ok(None),
            Err(e) => match IpamError::from(e) {
                IpamError::NotFound(_) => {
                    debug!("IPAddress {}/{} referenced by claim not found yet", namespace, address_ref.name);
                    Ok(None)
                }
                other => Err(other),
            },
        }
    }

    async fn to_claim(&self, claim: IPAddressClaim, default_namespace: &str) -> Result<Claim, IpamError> {
        let namespace = claim.metadata.namespace.clone().unwrap_or_else(|| default_namespace.to_string());
        let address = self.resolve(&claim, &namespace).await?;
        Ok(Claim {
            name: claim.metadata.name.unwrap_or_default(),
            namespace,
            pool_name: claim.spec.pool_ref.name,
            address,
        })
    }
}

#[async_trait::async_trait]
impl IpamClientTrait for KubeIpamClient {
    async fn get_pool(&self, owner: &ClusterIdentity, family: IpFamily) -> Result<Pool, IpamError> {
        let name = pool_name(owner, family);
        let pool = self.pools(&owner.namespace).get(&name).await?;
        Self::check_owner(owner, &pool.metadata, IN_CLUSTER_IP_POOL_KIND)?;
        Ok(Self::to_pool(pool, &owner.namespace))
    }

    async fn create_pool(&self, owner: &ClusterIdentity, request: &PoolRequest) -> Result<Pool, IpamError> {
        let name = pool_name(owner, request.family);
        let pool = InClusterIPPool {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(owner.namespace.clone()),
                labels: Some(owner.labels(Some(request.family))),
                owner_references: Some(vec![owner.owner_reference()]),
                ..Default::default()
            },
            spec: InClusterIPPoolSpec {
                addresses: request.addresses.clone(),
                prefix: request.prefix,
                gateway: Some(request.gateway.clone()),
            },
            status: None,
        };

        let created = self.pools(&owner.namespace).create(&PostParams::default(), &pool).await?;
        info!("Created InClusterIPPool {}/{}", owner.namespace, name);
        Ok(Self::to_pool(created, &owner.namespace))
    }

    async fn list_pools(&self, owner: &ClusterIdentity) -> Result<Vec<Pool>, IpamError> {
        let lp = ListParams::default().labels(&owner.label_selector());
        let pools = self.pools(&owner.namespace).list(&lp).await?;
        Ok(pools
            .items
            .into_iter()
            .filter(|p| owner.owns(&p.metadata))
            .map(|p| Self::to_pool(p, &owner.namespace))
            .collect())
    }

    async fn delete_pool(&self, namespace: &str, name: &str) -> Result<(), IpamError> {
        self.pools(namespace).delete(name, &DeleteParams::default()).await?;
        info!("Requested deletion of InClusterIPPool {}/{}", namespace, name);
        Ok(())
    }

    async fn get_claim(&self, owner: &ClusterIdentity) -> Result<Claim, IpamError> {
        let name = claim_name(owner);
        let claim = self.claims(&owner.namespace).get(&name).await?;
        Self::check_owner(owner, &claim.metadata, "IPAddressClaim")?;
        self.to_claim(claim, &owner.namespace).await
    }

    async fn create_claim(&self, owner: &ClusterIdentity, pool_name: &str) -> Result<Claim, IpamError> {
        let name = claim_name(owner);
        let claim = IPAddressClaim {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(owner.namespace.clone()),
                labels: Some(owner.labels(None)),
                owner_references: Some(vec![owner.owner_reference()]),
                ..Default::default()
            },
            spec: IPAddressClaimSpec {
                pool_ref: TypedLocalObjectReference {
                    api_group: Some(IPAM_API_GROUP.to_string()),
                    kind: IN_CLUSTER_IP_POOL_KIND.to_string(),
                    name: pool_name.to_string(),
                },
            },
            status: None,
        };

        let created = self.claims(&owner.namespace).create(&PostParams::default(), &claim).await?;
        info!("Created IPAddressClaim {}/{} on pool {}", owner.namespace, name, pool_name);
        self.to_claim(created, &owner.namespace).await
    }

    async fn list_claims(&self, owner: &ClusterIdentity) -> Result<Vec<Claim>, IpamError> {
        let lp = ListParams::default().labels(&owner.label_selector());
        let claims = self.claims(&owner.namespace).list(&lp).await?;
        let mut owned = Vec::new();
        for claim in claims.items.into_iter().filter(|c| owner.owns(&c.metadata)) {
            owned.push(self.to_claim(claim, &owner.namespace).await?);
        }
        Ok(owned)
    }

    async fn delete_claim(&self, namespace: &str, name: &str) -> Result<(), IpamError> {
        self.claims(namespace).delete(name, &DeleteParams::default()).await?;
        info!("Requested deletion of IPAddressClaim {}/{}", namespace, name);
        Ok(())
    }
}
