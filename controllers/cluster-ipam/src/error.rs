//! Controller-specific error types.
//!
//! This module defines the errors surfaced by the VmCluster controller. The
//! split that matters at runtime is permanent vs. transient: permanent errors
//! wait for a spec change, transient ones are retried with backoff.

use ipam_client::IpamError;
use kube::Error as KubeError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the VmCluster controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// IPAM provider error
    #[error("IPAM error: {0}")]
    Ipam(#[from] IpamError),

    /// Status or patch serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cluster spec rejected; needs a spec change
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid configuration (startup or object metadata)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Cluster record store rejected an operation
    #[error("Store error: {0}")]
    Store(String),

    /// Reconciliation exceeded its deadline
    #[error("Reconciliation timed out after {0:?}")]
    Timeout(Duration),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registry or probe server failure
    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl ControllerError {
    /// True for errors that retrying cannot fix without a spec change.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ControllerError::Validation(_)
                | ControllerError::Ipam(IpamError::Validation(_) | IpamError::OwnershipConflict(_))
        )
    }
}

impl From<prometheus::Error> for ControllerError {
    fn from(err: prometheus::Error) -> Self {
        ControllerError::Metrics(err.to_string())
    }
}
