//! Helper functions shared by the reconciliation paths.

use crds::{PARENT_CLUSTER_KIND, VmCluster, VmClusterStatus};
use kube::ResourceExt;

/// Finalizer holding a VmCluster until its pools and claim are released.
pub const VMCLUSTER_FINALIZER: &str = "vmcluster.infrastructure.microscaler.io";

const PARENT_API_GROUP: &str = "cluster.x-k8s.io";

/// Status fields that are cleared by writing an explicit null.
///
/// A merge patch leaves omitted keys untouched, and these serialize to
/// nothing when empty.
const CLEARABLE_STATUS_FIELDS: [&str; 3] = ["failureReason", "failureMessage", "inClusterIpPoolRef"];

pub fn cluster_key(cluster: &VmCluster) -> String {
    format!(
        "{}/{}",
        cluster.namespace().unwrap_or_else(|| "default".to_string()),
        cluster.name_any()
    )
}

pub fn has_finalizer(cluster: &VmCluster) -> bool {
    cluster.finalizers().iter().any(|f| f == VMCLUSTER_FINALIZER)
}

/// Name of the parent Cluster from the VmCluster's owner references.
pub fn parent_cluster_name(cluster: &VmCluster) -> Option<&str> {
    cluster
        .owner_references()
        .iter()
        .find(|r| {
            r.kind == PARENT_CLUSTER_KIND
                && r.api_version.split('/').next() == Some(PARENT_API_GROUP)
        })
        .map(|r| r.name.as_str())
}

/// Host part of an address reported by the provider (drops any `/prefix`).
pub fn endpoint_host(address: &str) -> &str {
    address.split('/').next().unwrap_or(address)
}

/// Merge patch body writing `status` in full.
pub fn status_patch(status: &VmClusterStatus) -> Result<serde_json::Value, serde_json::Error> {
    let mut value = serde_json::to_value(status)?;
    if let Some(fields) = value.as_object_mut() {
        for key in CLEARABLE_STATUS_FIELDS {
            fields.entry(key).or_insert(serde_json::Value::Null);
        }
    }
    Ok(serde_json::json!({ "status": value }))
}

#[cfg(test)]
#[path = "reconcile_helpers_test.rs"]
mod tests;
