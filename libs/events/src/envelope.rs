//! Notification envelope - what a notifier receives.

use autopool_id::PodKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EventReason, EventType};

/// A single outcome notification attached to a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// The pod this notification is about.
    pub subject: PodKey,

    /// UID of the pod incarnation, when the store reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_uid: Option<String>,

    /// Severity.
    pub event_type: EventType,

    /// Machine-readable reason.
    pub reason: EventReason,

    /// Human-readable message.
    pub message: String,

    /// When the notification was created.
    pub occurred_at: DateTime<Utc>,
}

impl Notification {
    /// Create a notification with the reason's default severity.
    pub fn new(subject: PodKey, reason: EventReason, message: impl Into<String>) -> Self {
        Self {
            subject,
            subject_uid: None,
            event_type: reason.event_type(),
            reason,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }

    /// Provisioning is starting for `subject`.
    pub fn ensuring(subject: PodKey) -> Self {
        let message = format!(
            "Ensuring Node Pool, triggered by Pod {}/{}.",
            subject.namespace(),
            subject.name()
        );
        Self::new(subject, EventReason::EnsuringNodePool, message)
    }

    /// The provider reported success.
    pub fn ensured(subject: PodKey) -> Self {
        Self::new(subject, EventReason::NodePoolEnsured, "Node Pool Ensured.")
    }

    /// The provider failed; `error` is included verbatim.
    pub fn failed(subject: PodKey, error: &dyn std::fmt::Display) -> Self {
        let message = format!("Failed to ensure existence of Node Pool: {error}");
        Self::new(subject, EventReason::FailedEnsuringNodePool, message)
    }

    /// The provider is already handling this pod.
    pub fn duplicate(subject: PodKey) -> Self {
        Self::new(
            subject,
            EventReason::DuplicateNodePoolRequest,
            "Node Pool request already in progress or completed.",
        )
    }

    /// Attach the pod's UID.
    pub fn with_subject_uid(mut self, uid: Option<String>) -> Self {
        self.subject_uid = uid;
        self
    }

    /// Returns true for warning-severity notifications.
    pub fn is_warning(&self) -> bool {
        self.event_type == EventType::Warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PodKey {
        PodKey::new("ml", "trainer-0").unwrap()
    }

    #[test]
    fn test_ensuring_message_names_pod() {
        let n = Notification::ensuring(key());
        assert_eq!(n.reason, EventReason::EnsuringNodePool);
        assert_eq!(n.event_type, EventType::Normal);
        assert_eq!(
            n.message,
            "Ensuring Node Pool, triggered by Pod ml/trainer-0."
        );
    }

    #[test]
    fn test_failed_is_warning_with_error_text() {
        let n = Notification::failed(key(), &"quota exceeded for TPU v5");
        assert!(n.is_warning());
        assert!(n.message.ends_with("quota exceeded for TPU v5"));
    }

    #[test]
    fn test_serialization_shape() {
        let n = Notification::ensured(key());
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["subject"], "ml/trainer-0");
        assert!(json.get("subject_uid").is_none());
        assert_eq!(json["event_type"], "Normal");
        assert_eq!(json["reason"], "NodePoolEnsured");

        let back: Notification = serde_json::from_value(json).unwrap();
        assert_eq!(back, n);
    }
}
