//! Test fakes for the autopool workspace.
//!
//! - [`PodBuilder`]: snapshots, defaulting to a pod that is eligible under
//!   [`RESOURCE_TYPE`]
//! - [`FakePodStore`]: in-memory store with failure injection
//! - [`RecordingNotifier`]: captures every notification
//! - [`RecordingBackend`]: counts node pool creations, optionally slow or failing

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use autopool_events::{EventReason, Notification};
use autopool_id::PodKey;
use autopool_reconcile::{
    ContainerRequests, NodePoolBackend, NodePoolRequest, Notifier, PodCondition, PodPhase,
    PodSnapshot, PodStore, ProviderError, Quantity, StoreError, ACCELERATOR_FAMILY_SELECTOR,
};

/// Resource type the default builder pod requests.
pub const RESOURCE_TYPE: &str = "example.com/accelerator";

/// Builds pod snapshots.
#[derive(Debug, Clone)]
pub struct PodBuilder {
    pod: PodSnapshot,
}

impl PodBuilder {
    /// Pending, unschedulable, requesting 4 of [`RESOURCE_TYPE`] with the
    /// accelerator family selector set to `v5`.
    pub fn eligible(namespace: &str, name: &str) -> Self {
        Self {
            pod: PodSnapshot {
                key: PodKey::new(namespace, name).expect("valid test pod key"),
                uid: Some(format!("uid-{namespace}-{name}")),
                phase: PodPhase::Pending,
                conditions: vec![PodCondition::unschedulable(
                    "0/3 nodes are available: 3 Insufficient example.com/accelerator.",
                )],
                containers: vec![ContainerRequests {
                    name: "main".to_string(),
                    requests: BTreeMap::from([(RESOURCE_TYPE.to_string(), Quantity::from(4))]),
                }],
                node_selector: BTreeMap::from([(
                    ACCELERATOR_FAMILY_SELECTOR.to_string(),
                    "v5".to_string(),
                )]),
            },
        }
    }

    pub fn phase(mut self, phase: PodPhase) -> Self {
        self.pod.phase = phase;
        self
    }

    /// Set the UID, e.g. to model a pod recreated under the same name.
    pub fn uid(mut self, uid: &str) -> Self {
        self.pod.uid = Some(uid.to_string());
        self
    }

    /// Mark the pod as placed by the scheduler.
    pub fn scheduled(mut self) -> Self {
        self.pod.conditions = vec![PodCondition::scheduled()];
        self
    }

    /// Set a request on the first container.
    pub fn request(mut self, resource: &str, quantity: &str) -> Self {
        if self.pod.containers.is_empty() {
            self.pod.containers.push(ContainerRequests {
                name: "main".to_string(),
                requests: BTreeMap::new(),
            });
        }
        self.pod.containers[0]
            .requests
            .insert(resource.to_string(), Quantity::from(quantity));
        self
    }

    pub fn no_containers(mut self) -> Self {
        self.pod.containers.clear();
        self
    }

    pub fn without_node_selector(mut self) -> Self {
        self.pod.node_selector.clear();
        self
    }

    pub fn build(self) -> PodSnapshot {
        self.pod
    }
}

/// In-memory pod store.
#[derive(Debug, Default)]
pub struct FakePodStore {
    pods: Mutex<HashMap<PodKey, PodSnapshot>>,
    failure: Mutex<Option<StoreError>>,
    gets: AtomicUsize,
}

impl FakePodStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store containing `pods`.
    pub fn with_pods(pods: impl IntoIterator<Item = PodSnapshot>) -> Self {
        let store = Self::new();
        for pod in pods {
            store.insert(pod);
        }
        store
    }

    pub fn insert(&self, pod: PodSnapshot) {
        self.pods
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pod.key.clone(), pod);
    }

    pub fn remove(&self, key: &PodKey) {
        self.pods
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Make every `get` fail with `error` until cleared with `None`.
    pub fn set_failure(&self, error: Option<StoreError>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Number of `get` calls so far.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PodStore for FakePodStore {
    async fn get(&self, key: &PodKey) -> Result<Option<PodSnapshot>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(err);
        }
        Ok(self
            .pods
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }
}

/// Notifier that keeps everything it is given.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications, in emission order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reasons, in emission order.
    pub fn reasons(&self) -> Vec<EventReason> {
        self.notifications().iter().map(|n| n.reason).collect()
    }

    pub fn count(&self, reason: EventReason) -> usize {
        self.notifications()
            .iter()
            .filter(|n| n.reason == reason)
            .count()
    }

    pub fn warnings(&self) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(Notification::is_warning)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications().is_empty()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn emit(&self, notification: Notification) {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

/// Backend that records requests instead of calling a cloud.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    requests: Mutex<Vec<NodePoolRequest>>,
    failure: Mutex<Option<ProviderError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose calls take `delay` before completing.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Backend that fails every call with `error`.
    pub fn failing(error: ProviderError) -> Self {
        let backend = Self::default();
        backend.set_failure(Some(error));
        backend
    }

    pub fn set_failure(&self, error: Option<ProviderError>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// Calls made, including failed and abandoned ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests that completed successfully.
    pub fn created(&self) -> Vec<NodePoolRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NodePoolBackend for RecordingBackend {
    async fn create_node_pool(&self, request: &NodePoolRequest) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(err);
        }
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        Ok(())
    }
}
