//! IPAM domain models
//!
//! Provider-neutral views of pools and claims, the owning-cluster identity,
//! and the deterministic names that make creation idempotent.

use crds::{IpFamily, VmCluster, CLUSTER_NAME_LABEL, IP_FAMILY_LABEL};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use std::collections::BTreeMap;

use crate::error::IpamError;

/// Stable identity of the owning VmCluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterIdentity {
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl ClusterIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: uid.into(),
        }
    }

    /// Identity of a VmCluster read from the API server.
    ///
    /// Fails when name or uid are missing, which only happens for objects that
    /// were never persisted.
    pub fn from_cluster(cluster: &VmCluster) -> Result<Self, IpamError> {
        let name = cluster
            .metadata
            .name
            .clone()
            .ok_or_else(|| IpamError::Validation("VmCluster missing name".to_string()))?;
        let uid = cluster
            .metadata
            .uid
            .clone()
            .ok_or_else(|| IpamError::Validation(format!("VmCluster {} missing uid", name)))?;
        let namespace = cluster.metadata.namespace.clone().unwrap_or_else(|| "default".to_string());
        Ok(Self { namespace, name, uid })
    }

    /// Controller owner reference pointing at this cluster.
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: VmCluster::api_version(&()).into_owned(),
            kind: VmCluster::kind(&()).into_owned(),
            name: self.name.clone(),
            uid: self.uid.clone(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    /// True when `meta` carries an owner reference to this cluster.
    pub fn owns(&self, meta: &ObjectMeta) -> bool {
        meta.owner_references
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|r| r.uid == self.uid)
    }

    /// Labels stamped on every object created for this cluster.
    pub fn labels(&self, family: Option<IpFamily>) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(CLUSTER_NAME_LABEL.to_string(), self.name.clone());
        if let Some(family) = family {
            labels.insert(IP_FAMILY_LABEL.to_string(), family.to_string());
        }
        labels
    }

    /// Label selector matching objects created for this cluster.
    pub fn label_selector(&self) -> String {
        format!("{}={}", CLUSTER_NAME_LABEL, self.name)
    }

    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Deterministic pool name for a cluster and family.
pub fn pool_name(owner: &ClusterIdentity, family: IpFamily) -> String {
    format!("{}-{}-icip", owner.name, family)
}

/// Deterministic name of the cluster's single endpoint claim.
pub fn claim_name(owner: &ClusterIdentity) -> String {
    owner.name.clone()
}

/// Attributes of a pool to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRequest {
    pub family: IpFamily,
    pub addresses: Vec<String>,
    pub gateway: String,
    pub prefix: u8,
}

/// An address pool as seen by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub name: String,
    pub namespace: String,
    pub family: Option<IpFamily>,
    pub addresses: Vec<String>,
    pub gateway: Option<String>,
    pub prefix: u8,
}

/// Concrete address handed out by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub address: String,
    pub prefix: u8,
    pub gateway: Option<String>,
}

/// A single-address claim. `address` is `None` until the provider resolves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub name: String,
    pub namespace: String,
    pub pool_name: String,
    pub address: Option<ResolvedAddress>,
}
