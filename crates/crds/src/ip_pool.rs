//! InClusterIPPool CRD
//!
//! Address pool of the in-cluster IPAM provider. One is created per
//! (VmCluster, family); the provider hands out addresses from it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const IPAM_API_GROUP: &str = "ipam.cluster.x-k8s.io";
pub const IN_CLUSTER_IP_POOL_KIND: &str = "InClusterIPPool";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "ipam.cluster.x-k8s.io",
    version = "v1alpha2",
    kind = "InClusterIPPool",
    namespaced,
    status = "InClusterIPPoolStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct InClusterIPPoolSpec {
    /// Address ranges: CIDRs, `start-end` ranges or single addresses
    pub addresses: Vec<String>,

    /// Network prefix length of handed-out addresses
    pub prefix: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct InClusterIPPoolStatus {
    /// Address usage, maintained by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_addresses: Option<IPAddressUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct IPAddressUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}
