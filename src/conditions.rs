//! # Conditions
//!
//! Typed status conditions for `RemoteCluster` resources and the
//! replace-by-type merge used when persisting probe results.
//!
//! Two condition types are tracked:
//! - `Ready` - the remote cluster responded to the liveness probe with `ok`
//! - `Offline` - the remote cluster could not be reached at all
//!
//! Exactly one condition per type is kept in a status. Merging a new
//! condition replaces status/reason/message for its type, refreshes
//! `lastProbeTime` on every probe, and refreshes `lastTransitionTime` only
//! when the status value actually changed.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const CONDITION_TRUE: &str = "True";
pub const CONDITION_FALSE: &str = "False";

pub const REASON_CLUSTER_READY: &str = "ClusterReady";
pub const REASON_CLUSTER_NOT_READY: &str = "ClusterNotReady";
pub const REASON_CLUSTER_REACHABLE: &str = "ClusterReachable";
pub const REASON_CLUSTER_NOT_REACHABLE: &str = "ClusterNotReachable";

/// Type of a cluster condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ClusterConditionType {
    Ready,
    Offline,
}

/// A single observed health signal for a remote cluster
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    /// Type of condition (Ready or Offline)
    #[serde(rename = "type")]
    pub type_: ClusterConditionType,
    /// Status of condition (True or False)
    pub status: String,
    /// Last time the condition was checked
    #[serde(default)]
    pub last_probe_time: Option<String>,
    /// Last time the condition status changed
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Machine-readable reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

/// Build a condition with probe/transition timestamps set to now.
pub fn new_condition(
    type_: ClusterConditionType,
    status: &str,
    reason: &str,
    message: &str,
) -> ClusterCondition {
    let now = chrono::Utc::now().to_rfc3339();
    ClusterCondition {
        type_,
        status: status.to_string(),
        last_probe_time: Some(now.clone()),
        last_transition_time: Some(now),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
    }
}

pub fn cluster_ready_condition() -> ClusterCondition {
    new_condition(
        ClusterConditionType::Ready,
        CONDITION_TRUE,
        REASON_CLUSTER_READY,
        "/healthz responded with ok",
    )
}

pub fn cluster_not_ready_condition() -> ClusterCondition {
    new_condition(
        ClusterConditionType::Ready,
        CONDITION_FALSE,
        REASON_CLUSTER_NOT_READY,
        "/healthz responded without ok",
    )
}

pub fn cluster_offline_condition() -> ClusterCondition {
    new_condition(
        ClusterConditionType::Offline,
        CONDITION_TRUE,
        REASON_CLUSTER_NOT_REACHABLE,
        "cluster is not reachable",
    )
}

pub fn cluster_reachable_condition() -> ClusterCondition {
    new_condition(
        ClusterConditionType::Offline,
        CONDITION_FALSE,
        REASON_CLUSTER_REACHABLE,
        "cluster is reachable",
    )
}

/// Merge a freshly probed condition into an existing condition list.
///
/// Replaces the entry with the same type, leaving every other type in
/// place. `lastProbeTime` is always taken from the new condition;
/// `lastTransitionTime` is carried over from the existing entry when the
/// status did not change.
pub fn set_condition(conditions: &mut Vec<ClusterCondition>, mut new: ClusterCondition) {
    for existing in conditions.iter_mut() {
        if existing.type_ == new.type_ {
            if existing.status == new.status {
                new.last_transition_time = existing.last_transition_time.clone();
            }
            *existing = new;
            return;
        }
    }
    conditions.push(new);
}

/// Merge several probed conditions at once, in order.
pub fn set_conditions(
    conditions: &mut Vec<ClusterCondition>,
    new: impl IntoIterator<Item = ClusterCondition>,
) {
    for condition in new {
        set_condition(conditions, condition);
    }
}

/// Find the condition of the given type, if present.
pub fn find_condition(
    conditions: &[ClusterCondition],
    type_: ClusterConditionType,
) -> Option<&ClusterCondition> {
    conditions.iter().find(|c| c.type_ == type_)
}
