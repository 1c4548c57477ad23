//! VmCluster CRD
//!
//! The infrastructure cluster record for a VM-backed Kubernetes cluster.
//! The controller owns its status: pool references per IP family, the
//! control-plane endpoint resolved from an address claim, and readiness.

use crate::conditions::Condition;
use crate::family::IpFamily;
use crate::references::LocalObjectReference;
use crate::PAUSED_ANNOTATION;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "infrastructure.microscaler.io",
    version = "v1alpha1",
    kind = "VmCluster",
    namespaced,
    status = "VmClusterStatus",
    shortname = "vmc",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".status.controlPlaneEndpoint.host"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VmClusterSpec {
    /// Endpoint requested by the user. Used as is when neither address
    /// configuration is set; otherwise the host comes from the address claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,

    /// IPv4 address configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_config: Option<IPConfigSpec>,

    /// IPv6 address configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_config: Option<IPConfigSpec>,

    /// DNS servers handed to the nodes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_servers: Vec<String>,

    /// Template used when cloning node VMs
    #[serde(default)]
    pub node_clone_spec: NodeCloneSpec,

    /// Suspends forward reconciliation while true
    #[serde(default)]
    pub paused: bool,
}

/// Address configuration for one IP family.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IPConfigSpec {
    /// Address ranges: CIDRs, `start-end` ranges or single addresses
    pub addresses: Vec<String>,

    /// Gateway address
    pub gateway: String,

    /// Network prefix length
    #[schemars(range(max = 128))]
    pub prefix: u8,
}

/// Host and port of the cluster API server.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: i32,
}

impl ApiEndpoint {
    pub fn is_zero(&self) -> bool {
        self.host.is_empty() && self.port == 0
    }
}

/// VM clone template. Carried for the machine controllers; not interpreted here.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeCloneSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_node: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VmClusterStatus {
    /// True once every configured pool exists and the endpoint address resolved
    #[serde(default)]
    pub ready: bool,

    /// One pool reference per configured family, in [v4, v6] order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub in_cluster_ip_pool_ref: Vec<LocalObjectReference>,

    /// Control-plane endpoint; host comes from the resolved address claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,

    /// Machine-readable reason for a persistent failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Human-readable detail for a persistent failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl VmClusterSpec {
    /// Configured families with their config, in slot order.
    pub fn configured_families(&self) -> Vec<(IpFamily, &IPConfigSpec)> {
        IpFamily::ALL
            .into_iter()
            .filter_map(|family| self.ip_config(family).map(|config| (family, config)))
            .collect()
    }

    pub fn ip_config(&self, family: IpFamily) -> Option<&IPConfigSpec> {
        match family {
            IpFamily::V4 => self.ipv4_config.as_ref(),
            IpFamily::V6 => self.ipv6_config.as_ref(),
        }
    }

    pub fn has_ip_config(&self) -> bool {
        self.ipv4_config.is_some() || self.ipv6_config.is_some()
    }

    /// Family used for the control-plane endpoint: IPv4 if configured, else IPv6.
    pub fn endpoint_family(&self) -> Option<IpFamily> {
        self.configured_families().first().map(|(family, _)| *family)
    }
}

impl VmCluster {
    /// Paused through the spec flag or the pause annotation.
    pub fn is_paused(&self) -> bool {
        self.spec.paused
            || self
                .metadata
                .annotations
                .as_ref()
                .is_some_and(|a| a.contains_key(PAUSED_ANNOTATION))
    }
}

impl VmClusterStatus {
    pub fn pool_ref(&self, slot: usize) -> Option<&LocalObjectReference> {
        self.in_cluster_ip_pool_ref.get(slot)
    }

    /// Records `name` in `slot`. Slots fill in order, so a slot past the end
    /// of the populated prefix is rejected.
    ///
    /// Returns true when the status changed.
    pub fn set_pool_ref(&mut self, slot: usize, name: &str) -> bool {
        let len = self.in_cluster_ip_pool_ref.len();
        match self.in_cluster_ip_pool_ref.get_mut(slot) {
            Some(existing) if existing.name == name => false,
            Some(existing) => {
                existing.name = name.to_string();
                true
            }
            None if slot == len => {
                self.in_cluster_ip_pool_ref.push(LocalObjectReference::new(name));
                true
            }
            None => false,
        }
    }

    /// Endpoint host, when an address has been resolved.
    pub fn endpoint_host(&self) -> Option<&str> {
        self.control_plane_endpoint
            .as_ref()
            .map(|e| e.host.as_str())
            .filter(|h| !h.is_empty())
    }
}
