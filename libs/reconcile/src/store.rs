//! Cluster state store contract.

use async_trait::async_trait;
use autopool_id::PodKey;
use thiserror::Error;

use crate::PodSnapshot;

/// Errors other than "not found" returned by a store.
///
/// All of them are treated as transient by the reconciler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or returned a server error.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The stored object could not be converted into a snapshot.
    #[error("invalid pod object {key}: {reason}")]
    InvalidObject { key: String, reason: String },
}

/// Read access to current pod state.
#[async_trait]
pub trait PodStore: Send + Sync {
    /// Fetch the current snapshot, or `None` if the pod no longer exists.
    async fn get(&self, key: &PodKey) -> Result<Option<PodSnapshot>, StoreError>;
}
