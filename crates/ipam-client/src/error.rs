//! IPAM client errors

use thiserror::Error;

/// Errors that can occur when talking to the IPAM provider
#[derive(Debug, Error)]
pub enum IpamError {
    /// Object does not exist. A control-flow signal for callers, not a failure.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Create raced with an existing object of the same name
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// An object with our deterministic name exists but belongs to someone else
    #[error("Ownership conflict: {0}")]
    OwnershipConflict(String),

    /// IP configuration rejected before reaching the provider
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(kube::Error),

    /// Provider error without an underlying kube error
    #[error("IPAM API error: {0}")]
    Api(String),
}

impl IpamError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, IpamError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, IpamError::AlreadyExists(_))
    }
}

impl From<kube::Error> for IpamError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => IpamError::NotFound(ae.message.clone()),
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => IpamError::AlreadyExists(ae.message.clone()),
            other => IpamError::Kube(other),
        }
    }
}
