//! Status conditions
//!
//! Cluster API style conditions. `lastTransitionTime` only moves when the
//! condition's status flips, so repeated reconciliations of a converged
//! object produce identical status patches.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Pools exist for every configured family and the endpoint address resolved.
pub const IPAM_READY_CONDITION: &str = "IPAMReady";

/// Summary readiness of the VmCluster.
pub const READY_CONDITION: &str = "Ready";

/// Reason recorded when an IP config fails validation.
pub const INVALID_IP_CONFIG_REASON: &str = "InvalidIPConfig";

/// Reason recorded while pools are being created.
pub const POOLS_PENDING_REASON: &str = "WaitingForPools";

/// Reason recorded while the endpoint claim is unresolved.
pub const ENDPOINT_PENDING_REASON: &str = "WaitingForEndpointAddress";

/// Reason recorded when a resource with our deterministic name belongs to someone else.
pub const OWNERSHIP_CONFLICT_REASON: &str = "OwnershipConflict";

/// Reason recorded when the IPAM provider failed transiently.
pub const PROVIDER_ERROR_REASON: &str = "IPAMProviderError";

/// Reason recorded when an invocation ran past its deadline.
pub const RECONCILE_TIMEOUT_REASON: &str = "ReconcileTimeout";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,

    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    pub fn new_true(type_: &str) -> Self {
        Self {
            type_: type_.to_string(),
            status: ConditionStatus::True,
            reason: None,
            message: None,
            last_transition_time: None,
        }
    }

    pub fn new_false(type_: &str, reason: &str, message: impl Into<String>) -> Self {
        Self {
            type_: type_.to_string(),
            status: ConditionStatus::False,
            reason: Some(reason.to_string()),
            message: Some(message.into()),
            last_transition_time: None,
        }
    }
}

/// Inserts or replaces the condition with the same type.
///
/// The transition time is kept from the existing condition when the status
/// did not change, and stamped with `now` otherwise.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition, now: DateTime<Utc>) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            condition.last_transition_time = if existing.status == condition.status {
                existing.last_transition_time.or(Some(now))
            } else {
                Some(now)
            };
            *existing = condition;
        }
        None => {
            condition.last_transition_time = Some(now);
            conditions.push(condition);
        }
    }
}

pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    find_condition(conditions, type_).is_some_and(|c| c.status == ConditionStatus::True)
}
