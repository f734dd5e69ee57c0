//! Pod snapshot model.
//!
//! A narrow, read-only projection of a pod: only the fields the provisioner
//! decides on. Adapters convert from the cluster's native representation.

use std::collections::BTreeMap;

use autopool_id::PodKey;
use serde::{Deserialize, Serialize};

use crate::Quantity;

/// Condition type the scheduler sets on every pod it has tried to place.
pub const POD_SCHEDULED: &str = "PodScheduled";

/// Reason the scheduler reports when no node satisfies the pod's constraints.
pub const REASON_UNSCHEDULABLE: &str = "Unschedulable";

/// Pod lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    /// Parse a phase string; anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Tri-state condition status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    /// Parse a status string; anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "True" => ConditionStatus::True,
            "False" => ConditionStatus::False,
            _ => ConditionStatus::Unknown,
        }
    }
}

/// A single pod status condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodCondition {
    /// Condition type, e.g. `PodScheduled`.
    pub condition_type: String,

    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PodCondition {
    /// The condition the scheduler sets when it cannot place a pod.
    pub fn unschedulable(message: impl Into<String>) -> Self {
        Self {
            condition_type: POD_SCHEDULED.to_string(),
            status: ConditionStatus::False,
            reason: Some(REASON_UNSCHEDULABLE.to_string()),
            message: Some(message.into()),
        }
    }

    /// The condition the scheduler sets once a pod is bound.
    pub fn scheduled() -> Self {
        Self {
            condition_type: POD_SCHEDULED.to_string(),
            status: ConditionStatus::True,
            reason: None,
            message: None,
        }
    }
}

/// Resource requests declared by one container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRequests {
    pub name: String,

    #[serde(default)]
    pub requests: BTreeMap<String, Quantity>,
}

/// Point-in-time view of a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSnapshot {
    pub key: PodKey,

    /// Store-assigned identity of this incarnation of the pod, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    pub phase: PodPhase,

    #[serde(default)]
    pub conditions: Vec<PodCondition>,

    #[serde(default)]
    pub containers: Vec<ContainerRequests>,

    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
}

impl PodSnapshot {
    /// The scheduler's placement condition, if it has reported one.
    pub fn scheduling_condition(&self) -> Option<&PodCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == POD_SCHEDULED)
    }

    /// Sum of a resource across all containers that request it.
    ///
    /// Unparseable quantities count as zero.
    pub fn total_request(&self, resource_type: &str) -> f64 {
        self.containers
            .iter()
            .filter_map(|c| c.requests.get(resource_type))
            .filter_map(Quantity::value)
            .filter(|v| *v > 0.0)
            .sum()
    }
}
