//! Eligibility predicate.
//!
//! Decides, from a snapshot alone, whether a pod should trigger a
//! provisioning attempt. Four independent checks, all required.

use crate::pod::{ConditionStatus, PodPhase, PodSnapshot, REASON_UNSCHEDULABLE};

/// Node selector key identifying the accelerator family this provisioner
/// targets. Pods without it are never provisioned for.
pub const ACCELERATOR_FAMILY_SELECTOR: &str = "cloud.example.com/accelerator-family";

/// Which pods this provisioner instance reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodCriteria {
    /// Resource that must be requested with a positive quantity.
    pub resource_type: String,

    /// Node selector key that must be present.
    pub selector_key: &'static str,
}

impl PodCriteria {
    /// Criteria for `resource_type` with the fixed accelerator selector key.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            selector_key: ACCELERATOR_FAMILY_SELECTOR,
        }
    }
}

/// Why a pod was not acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoreReason {
    /// The pod no longer exists.
    NotFound,
    NotPending,
    /// The scheduler has not reported the pod as unschedulable.
    Schedulable,
    ResourceNotRequested,
    MissingNodeSelector,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IgnoreReason::NotFound => "not_found",
            IgnoreReason::NotPending => "not_pending",
            IgnoreReason::Schedulable => "schedulable",
            IgnoreReason::ResourceNotRequested => "resource_not_requested",
            IgnoreReason::MissingNodeSelector => "missing_node_selector",
        };
        f.write_str(s)
    }
}

/// Result of evaluating a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible(IgnoreReason),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Phase is `Pending`.
pub fn is_pending(pod: &PodSnapshot) -> bool {
    pod.phase == PodPhase::Pending
}

/// The scheduler reports that no node satisfies the pod's constraints.
pub fn is_unschedulable(pod: &PodSnapshot) -> bool {
    pod.scheduling_condition().is_some_and(|c| {
        c.status == ConditionStatus::False && c.reason.as_deref() == Some(REASON_UNSCHEDULABLE)
    })
}

/// Some container requests a positive quantity of `resource_type`.
pub fn does_request_resource(pod: &PodSnapshot, resource_type: &str) -> bool {
    pod.containers.iter().any(|c| {
        c.requests
            .get(resource_type)
            .is_some_and(|q| q.is_positive())
    })
}

/// The node selector contains `key`, whatever its value.
pub fn has_node_selector_key(pod: &PodSnapshot, key: &str) -> bool {
    pod.node_selector.contains_key(key)
}

/// Evaluate all checks, reporting the first that fails.
pub fn evaluate(pod: &PodSnapshot, criteria: &PodCriteria) -> Eligibility {
    if !is_pending(pod) {
        return Eligibility::Ineligible(IgnoreReason::NotPending);
    }
    if !is_unschedulable(pod) {
        return Eligibility::Ineligible(IgnoreReason::Schedulable);
    }
    if !does_request_resource(pod, &criteria.resource_type) {
        return Eligibility::Ineligible(IgnoreReason::ResourceNotRequested);
    }
    if !has_node_selector_key(pod, criteria.selector_key) {
        return Eligibility::Ineligible(IgnoreReason::MissingNodeSelector);
    }
    Eligibility::Eligible
}

/// True if the pod should trigger a provisioning attempt.
pub fn is_eligible(pod: &PodSnapshot, criteria: &PodCriteria) -> bool {
    evaluate(pod, criteria).is_eligible()
}
