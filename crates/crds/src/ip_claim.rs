//! IPAddressClaim and IPAddress CRDs
//!
//! A claim requests one address from a pool. The provider satisfies it
//! asynchronously by creating an `IPAddress` and linking it from the
//! claim's status.

use crate::references::{LocalObjectReference, TypedLocalObjectReference};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "ipam.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "IPAddressClaim",
    namespaced,
    status = "IPAddressClaimStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct IPAddressClaimSpec {
    /// Pool the address is claimed from
    pub pool_ref: TypedLocalObjectReference,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct IPAddressClaimStatus {
    /// Set by the provider once an IPAddress was allocated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_ref: Option<LocalObjectReference>,
}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "ipam.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "IPAddress",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IPAddressSpec {
    /// Claim this address satisfies
    pub claim_ref: LocalObjectReference,

    /// Pool the address was taken from
    pub pool_ref: TypedLocalObjectReference,

    /// Allocated address, without prefix
    pub address: String,

    pub prefix: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}
