//! Controller configuration.
//!
//! Read once from the environment at startup. Every numeric setting has a
//! default; a value that does not parse is a startup error.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::time::Duration;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace to watch; all namespaces when unset
    pub namespace: Option<String>,
    /// Port written into the control-plane endpoint
    pub endpoint_port: i32,
    /// Deadline for a single reconciliation
    pub reconcile_timeout: Duration,
    /// Re-check interval while waiting on the provider or on dependents
    pub requeue_interval: Duration,
    /// Listen address for probes and metrics
    pub metrics_addr: SocketAddr,
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            endpoint_port: 6443,
            reconcile_timeout: Duration::from_secs(30),
            requeue_interval: Duration::from_secs(10),
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_format: LogFormat::Text,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let defaults = Self::default();

        let endpoint_port = match lookup("CONTROL_PLANE_ENDPOINT_PORT") {
            Some(v) => {
                let port: i32 = parse(&v, "CONTROL_PLANE_ENDPOINT_PORT")?;
                if !(1..=65535).contains(&port) {
                    return Err(ControllerError::InvalidConfig(format!(
                        "CONTROL_PLANE_ENDPOINT_PORT {} out of range",
                        port
                    )));
                }
                port
            }
            None => defaults.endpoint_port,
        };

        let reconcile_timeout = match lookup("RECONCILE_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse(&v, "RECONCILE_TIMEOUT_SECS")?),
            None => defaults.reconcile_timeout,
        };

        let requeue_interval = match lookup("CLAIM_REQUEUE_SECS") {
            Some(v) => Duration::from_secs(parse(&v, "CLAIM_REQUEUE_SECS")?),
            None => defaults.requeue_interval,
        };

        let metrics_addr = match lookup("METRICS_ADDR") {
            Some(v) => parse(&v, "METRICS_ADDR")?,
            None => defaults.metrics_addr,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ControllerError::InvalidConfig(format!(
                    "LOG_FORMAT must be 'text' or 'json', got '{}'",
                    other
                )));
            }
        };

        Ok(Self {
            namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty()),
            endpoint_port,
            reconcile_timeout,
            requeue_interval,
            metrics_addr,
            log_format,
        })
    }
}

fn parse<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ControllerError> {
    value
        .trim()
        .parse()
        .map_err(|_| ControllerError::InvalidConfig(format!("{} has invalid value '{}'", key, value)))
}
