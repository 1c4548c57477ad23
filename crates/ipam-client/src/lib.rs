//! In-cluster IPAM client
//!
//! Client library for the address-pool and address-claim provider consumed by
//! the VmCluster controller. Pools (`InClusterIPPool`) and claims
//! (`IPAddressClaim`) are Kubernetes objects owned by a VmCluster; the
//! provider resolves claims into `IPAddress` objects on its own schedule.
//!
//! # Example
//!
//! ```no_run
//! use ipam_client::{ClusterIdentity, IpamClientTrait, KubeIpamClient, PoolRequest};
//! use crds::IpFamily;
//!
//! # async fn example(owner: ClusterIdentity) -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeIpamClient::new(kube::Client::try_default().await?);
//!
//! let request = PoolRequest {
//!     family: IpFamily::V4,
//!     addresses: vec!["10.0.0.2-10.0.0.10".to_string()],
//!     gateway: "10.0.0.1".to_string(),
//!     prefix: 24,
//! };
//! let pool = client.create_pool(&owner, &request).await?;
//! let claim = client.create_claim(&owner, &pool.name).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod ipam_trait;
pub mod validation;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::KubeIpamClient;
pub use error::IpamError;
pub use ipam_trait::IpamClientTrait;
pub use models::*;
pub use validation::validate_ip_config;
#[cfg(feature = "test-util")]
pub use mock::{MockIpamClient, MockOperation};
