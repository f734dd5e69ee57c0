//! Kubernetes adapters: pod store and event notifier.

use std::collections::BTreeMap;

use async_trait::async_trait;
use autopool_events::{EventType, Notification};
use autopool_id::PodKey;
use autopool_reconcile::{
    ConditionStatus, ContainerRequests, Notifier, PodCondition, PodPhase, PodSnapshot, PodStore,
    Quantity, StoreError,
};
use k8s_openapi::api::core::v1::{ObjectReference, Pod};
use kube::api::Api;
use kube::runtime::events::{
    Event as KubeEvent, EventType as KubeEventType, Recorder, Reporter,
};
use kube::Client;
use tracing::warn;

use crate::truncate_utf8;

/// Event action recorded for every notification.
pub const EVENT_ACTION: &str = "EnsureNodePool";

/// Longest note the events API accepts.
pub const MAX_NOTE_BYTES: usize = 1024;

/// Key of a pod object.
pub fn pod_key(pod: &Pod) -> Result<PodKey, StoreError> {
    let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();
    let name = pod.metadata.name.as_deref().unwrap_or_default();
    PodKey::new(namespace, name).map_err(|e| StoreError::InvalidObject {
        key: format!("{namespace}/{name}"),
        reason: e.to_string(),
    })
}

/// Project a pod object onto the fields the reconciler decides on.
pub fn snapshot_from_pod(pod: &Pod) -> Result<PodSnapshot, StoreError> {
    let key = pod_key(pod)?;

    let status = pod.status.as_ref();
    let phase = status
        .and_then(|s| s.phase.as_deref())
        .map(PodPhase::parse)
        .unwrap_or(PodPhase::Unknown);

    let conditions = status
        .and_then(|s| s.conditions.as_ref())
        .map(|conds| {
            conds
                .iter()
                .map(|c| PodCondition {
                    condition_type: c.type_.clone(),
                    status: ConditionStatus::parse(&c.status),
                    reason: c.reason.clone(),
                    message: c.message.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    let spec = pod.spec.as_ref();
    let containers = spec
        .map(|s| {
            s.containers
                .iter()
                .map(|c| ContainerRequests {
                    name: c.name.clone(),
                    requests: c
                        .resources
                        .as_ref()
                        .and_then(|r| r.requests.as_ref())
                        .map(|reqs| {
                            reqs.iter()
                                .map(|(k, q)| (k.clone(), Quantity::new(q.0.clone())))
                                .collect()
                        })
                        .unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    let node_selector: BTreeMap<String, String> = spec
        .and_then(|s| s.node_selector.clone())
        .unwrap_or_default();

    Ok(PodSnapshot {
        key,
        uid: pod.metadata.uid.clone(),
        phase,
        conditions,
        containers,
        node_selector,
    })
}

/// Pod store backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubePodStore {
    client: Client,
}

impl KubePodStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodStore for KubePodStore {
    async fn get(&self, key: &PodKey) -> Result<Option<PodSnapshot>, StoreError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), key.namespace());
        let pod = api
            .get_opt(key.name())
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        pod.as_ref().map(snapshot_from_pod).transpose()
    }
}

/// Notifier that records notifications as Kubernetes events on the pod.
#[derive(Clone)]
pub struct KubeEventNotifier {
    client: Client,
    reporter: Reporter,
}

impl KubeEventNotifier {
    pub fn new(client: Client, controller: &str, instance: Option<String>) -> Self {
        Self {
            client,
            reporter: Reporter {
                controller: controller.to_string(),
                instance,
            },
        }
    }
}

#[async_trait]
impl Notifier for KubeEventNotifier {
    async fn emit(&self, notification: Notification) {
        let recorder = Recorder::new(
            self.client.clone(),
            self.reporter.clone(),
            object_reference(&notification),
        );

        if let Err(e) = recorder.publish(kube_event(&notification)).await {
            warn!(
                error = %e,
                namespace = %notification.subject.namespace(),
                name = %notification.subject.name(),
                reason = %notification.reason,
                "Failed to publish event"
            );
        }
    }
}

/// Reference to the pod a notification is about.
pub fn object_reference(notification: &Notification) -> ObjectReference {
    ObjectReference {
        api_version: Some("v1".to_string()),
        kind: Some("Pod".to_string()),
        namespace: Some(notification.subject.namespace().to_string()),
        name: Some(notification.subject.name().to_string()),
        uid: notification.subject_uid.clone(),
        ..Default::default()
    }
}

/// Kubernetes event for a notification.
pub fn kube_event(notification: &Notification) -> KubeEvent {
    KubeEvent {
        type_: match notification.event_type {
            EventType::Normal => KubeEventType::Normal,
            EventType::Warning => KubeEventType::Warning,
        },
        reason: notification.reason.as_str().to_string(),
        note: Some(truncate_utf8(&notification.message, MAX_NOTE_BYTES).to_string()),
        action: EVENT_ACTION.to_string(),
        secondary: None,
    }
}
