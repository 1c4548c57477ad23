//! VmCluster CRD Definitions
//!
//! Kubernetes resource types used by the cluster IPAM controller:
//! - `VmCluster`: the infrastructure cluster record this controller owns
//! - `Cluster`: the parent cluster record (foreign kind, only the fields we read)
//! - `InClusterIPPool`, `IPAddressClaim`, `IPAddress`: the consumed IPAM provider kinds

pub mod cluster;
pub mod conditions;
pub mod family;
pub mod ip_claim;
pub mod ip_pool;
pub mod references;
pub mod vm_cluster;

pub use cluster::*;
pub use conditions::*;
pub use family::*;
pub use ip_claim::*;
pub use ip_pool::*;
pub use references::*;
pub use vm_cluster::*;

/// Label carrying the owning cluster's name on every resource we create.
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Annotation that pauses reconciliation of a single object.
pub const PAUSED_ANNOTATION: &str = "cluster.x-k8s.io/paused";
