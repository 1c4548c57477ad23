//! Prints the CRD manifest for the VmCluster kind.
//!
//! The IPAM provider and parent Cluster kinds are installed by their own
//! projects and are not emitted.

use crds::VmCluster;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&VmCluster::crd())?);
    Ok(())
}
