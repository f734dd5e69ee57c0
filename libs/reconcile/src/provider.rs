//! Capacity provider contract.
//!
//! The reconciler only sees [`NodePoolProvider`]. Implementations must be
//! idempotent per pod identity and report a repeat request as
//! [`ProviderError::DuplicateRequest`]. [`DedupProvider`](crate::DedupProvider)
//! adds that guarantee on top of any [`NodePoolBackend`].

use async_trait::async_trait;
use autopool_id::{NodePoolName, PodKey};
use serde::Serialize;
use thiserror::Error;

use crate::eligibility::ACCELERATOR_FAMILY_SELECTOR;
use crate::PodSnapshot;

/// Provider failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// A node pool for this pod is already being created or exists.
    #[error("duplicate request: node pool for pod {0} already requested")]
    DuplicateRequest(PodKey),

    /// The cloud project is out of quota for the requested capacity.
    #[error("quota exceeded: {0}")]
    Quota(String),

    /// The provider's credentials were rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Network or server-side failure worth retrying.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// The pod cannot be translated into a node pool request.
    #[error("invalid node pool request: {0}")]
    InvalidRequest(String),

    /// Any other backend failure.
    #[error("provider backend error: {0}")]
    Backend(String),
}

impl ProviderError {
    /// True for the one error kind the reconciler treats as success.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ProviderError::DuplicateRequest(_))
    }
}

/// Ensures capacity exists for a pod.
#[async_trait]
pub trait NodePoolProvider: Send + Sync {
    /// Create (or confirm creation of) a node pool able to run `pod`.
    async fn ensure_node_pool_for_pod(&self, pod: &PodSnapshot) -> Result<(), ProviderError>;

    /// The pod is gone or past scheduling; drop anything remembered about it.
    fn release(&self, _key: &PodKey) {}
}

/// What a backend is asked to create.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePoolRequest {
    /// Deterministic pool name derived from the pod key.
    pub name: NodePoolName,

    /// The pod that triggered the request.
    pub pod: PodKey,

    /// Accelerator family from the pod's node selector.
    pub accelerator_family: String,

    /// Resource the pod requested.
    pub resource_type: String,

    /// Total quantity of `resource_type` across the pod's containers,
    /// rounded up.
    pub resource_count: u64,
}

impl NodePoolRequest {
    /// Build the request for `pod`.
    pub fn for_pod(pod: &PodSnapshot, resource_type: &str) -> Result<Self, ProviderError> {
        let accelerator_family = pod
            .node_selector
            .get(ACCELERATOR_FAMILY_SELECTOR)
            .cloned()
            .ok_or_else(|| {
                ProviderError::InvalidRequest(format!(
                    "pod {} has no {} node selector",
                    pod.key, ACCELERATOR_FAMILY_SELECTOR
                ))
            })?;

        let total = pod.total_request(resource_type);
        if total <= 0.0 {
            return Err(ProviderError::InvalidRequest(format!(
                "pod {} requests no {}",
                pod.key, resource_type
            )));
        }

        Ok(Self {
            name: NodePoolName::for_pod(&pod.key),
            pod: pod.key.clone(),
            accelerator_family,
            resource_type: resource_type.to_string(),
            resource_count: total.ceil() as u64,
        })
    }
}

/// Cloud-facing side of a provider: creates one node pool per call.
///
/// Backends need not deduplicate; wrap them in a
/// [`DedupProvider`](crate::DedupProvider).
#[async_trait]
pub trait NodePoolBackend: Send + Sync {
    async fn create_node_pool(&self, request: &NodePoolRequest) -> Result<(), ProviderError>;
}
