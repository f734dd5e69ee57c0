//! Event severities and reasons.

use serde::{Deserialize, Serialize};

use crate::EventError;

/// Severity of a notification.
///
/// Mirrors the two event types Kubernetes accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Informational.
    Normal,
    /// Something an operator should look at.
    Warning,
}

impl EventType {
    /// The canonical string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Normal => "Normal",
            EventType::Warning => "Warning",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Normal" => Ok(EventType::Normal),
            "Warning" => Ok(EventType::Warning),
            other => Err(EventError::UnknownEventType(other.to_string())),
        }
    }
}

/// Why a notification was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventReason {
    /// Provisioning is about to be requested for an unschedulable pod.
    EnsuringNodePool,

    /// The provider accepted or completed the request.
    NodePoolEnsured,

    /// The provider rejected the request with a non-duplicate error.
    FailedEnsuringNodePool,

    /// The provider is already handling an equivalent request.
    DuplicateNodePoolRequest,
}

impl EventReason {
    /// All reasons, in trail order.
    pub const ALL: [EventReason; 4] = [
        EventReason::EnsuringNodePool,
        EventReason::NodePoolEnsured,
        EventReason::FailedEnsuringNodePool,
        EventReason::DuplicateNodePoolRequest,
    ];

    /// The canonical string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventReason::EnsuringNodePool => "EnsuringNodePool",
            EventReason::NodePoolEnsured => "NodePoolEnsured",
            EventReason::FailedEnsuringNodePool => "FailedEnsuringNodePool",
            EventReason::DuplicateNodePoolRequest => "DuplicateNodePoolRequest",
        }
    }

    /// The severity this reason is always emitted with.
    pub fn event_type(&self) -> EventType {
        match self {
            EventReason::FailedEnsuringNodePool => EventType::Warning,
            _ => EventType::Normal,
        }
    }
}

impl std::fmt::Display for EventReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventReason {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventReason::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| EventError::UnknownReason(s.to_string()))
    }
}
