//! Parent Cluster CRD
//!
//! The higher-level `cluster.x-k8s.io` Cluster that references a VmCluster as
//! its infrastructure. This controller never writes it except to request its
//! deletion, so only the fields read here are modelled; unknown fields are
//! ignored on deserialization.

use crate::references::ObjectReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind name used in owner references pointing at the parent.
pub const PARENT_CLUSTER_KIND: &str = "Cluster";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(group = "cluster.x-k8s.io", version = "v1beta1", kind = "Cluster", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub paused: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_ref: Option<ObjectReference>,
}
