//! Duplicate-suppressing provider.
//!
//! Wraps a [`NodePoolBackend`] with a keyed registry so at most one node pool
//! is requested per pod, however many times and however concurrently the
//! reconciler asks.
//!
//! Registry entries:
//! - absent: no request outstanding; the next call goes to the backend
//! - `InFlight`: a call is talking to the backend; others get a duplicate
//! - `Created`: the backend succeeded; later calls get a duplicate
//!
//! A failed or abandoned backend call removes its entry so redelivery can
//! try again. Completed entries are dropped when the reconciler releases the
//! pod, and are replaced when a pod with the same key but a different UID
//! asks again.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use autopool_id::PodKey;
use tracing::{debug, info, instrument, warn};

use crate::provider::{NodePoolBackend, NodePoolProvider, NodePoolRequest, ProviderError};
use crate::PodSnapshot;

/// Registry state for one pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    InFlight,
    Created,
}

#[derive(Debug)]
struct Entry {
    state: PoolState,
    uid: Option<String>,
}

impl Entry {
    /// A completed entry left behind by an earlier pod with the same key.
    fn is_stale_for(&self, uid: Option<&str>) -> bool {
        self.state == PoolState::Created
            && matches!((self.uid.as_deref(), uid), (Some(old), Some(new)) if old != new)
    }
}

/// Provider that deduplicates requests per pod key.
pub struct DedupProvider<B> {
    backend: B,
    resource_type: String,
    registry: Mutex<HashMap<PodKey, Entry>>,
}

impl<B: NodePoolBackend> DedupProvider<B> {
    /// Create a provider over `backend` for pods requesting `resource_type`.
    pub fn new(backend: B, resource_type: impl Into<String>) -> Self {
        Self {
            backend,
            resource_type: resource_type.into(),
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current registry state for a pod.
    pub fn state(&self, key: &PodKey) -> Option<PoolState> {
        self.lock().get(key).map(|e| e.state)
    }

    /// Number of pods with an outstanding or completed request.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop a completed entry so the pod can be provisioned for again.
    ///
    /// In-flight entries are left alone. Returns true if an entry was removed.
    pub fn forget(&self, key: &PodKey) -> bool {
        let mut registry = self.lock();
        if registry.get(key).is_some_and(|e| e.state == PoolState::Created) {
            registry.remove(key);
            true
        } else {
            false
        }
    }

    /// Atomically claim the pod's key, or report who holds it.
    fn claim(&self, pod: &PodSnapshot) -> Result<InFlight<'_, B>, PoolState> {
        let mut registry = self.lock();
        if let Some(entry) = registry.get(&pod.key) {
            if !entry.is_stale_for(pod.uid.as_deref()) {
                return Err(entry.state);
            }
            debug!(pod = %pod.key, "Pod was recreated, dropping completed entry");
        }
        registry.insert(
            pod.key.clone(),
            Entry {
                state: PoolState::InFlight,
                uid: pod.uid.clone(),
            },
        );
        Ok(InFlight {
            provider: self,
            key: pod.key.clone(),
            settled: false,
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PodKey, Entry>> {
        // Entries are plain values; a panic elsewhere cannot leave one half-written.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the in-flight marker for one key; releases it unless settled.
struct InFlight<'a, B: NodePoolBackend> {
    provider: &'a DedupProvider<B>,
    key: PodKey,
    settled: bool,
}

impl<B: NodePoolBackend> InFlight<'_, B> {
    fn settle(mut self) {
        if let Some(entry) = self.provider.lock().get_mut(&self.key) {
            entry.state = PoolState::Created;
        }
        self.settled = true;
    }
}

impl<B: NodePoolBackend> Drop for InFlight<'_, B> {
    fn drop(&mut self) {
        if !self.settled {
            self.provider.lock().remove(&self.key);
        }
    }
}

#[async_trait]
impl<B: NodePoolBackend> NodePoolProvider for DedupProvider<B> {
    #[instrument(skip(self, pod), fields(pod = %pod.key))]
    async fn ensure_node_pool_for_pod(&self, pod: &PodSnapshot) -> Result<(), ProviderError> {
        let request = NodePoolRequest::for_pod(pod, &self.resource_type)?;

        let claim = match self.claim(pod) {
            Ok(claim) => claim,
            Err(state) => {
                debug!(state = ?state, pool = %request.name, "Node pool already requested");
                return Err(ProviderError::DuplicateRequest(pod.key.clone()));
            }
        };

        info!(
            pool = %request.name,
            accelerator_family = %request.accelerator_family,
            resource_count = request.resource_count,
            "Creating node pool"
        );

        match self.backend.create_node_pool(&request).await {
            Ok(()) => {
                claim.settle();
                info!(pool = %request.name, "Node pool created");
                Ok(())
            }
            Err(e) if e.is_duplicate() => {
                // The cloud already has this pool, e.g. created before a restart.
                claim.settle();
                info!(pool = %request.name, "Node pool already exists");
                Err(e)
            }
            Err(e) => {
                warn!(pool = %request.name, error = %e, "Node pool creation failed");
                drop(claim);
                Err(e)
            }
        }
    }

    fn release(&self, key: &PodKey) {
        if self.forget(key) {
            debug!(pod = %key, "Released completed node pool entry");
        }
    }
}
