//! Reconciliation core for the autopool provisioner.
//!
//! Observes pods the scheduler could not place and asks a capacity provider
//! to create a node pool for them. Key pieces:
//!
//! - **Eligibility**: which pods should trigger provisioning.
//! - **Contracts**: [`PodStore`], [`NodePoolProvider`], [`Notifier`], all
//!   injected as trait objects.
//! - **Reconciler**: fetch, evaluate, ensure, record.
//! - **Dedup provider**: the keyed registry that makes provisioning
//!   exactly-once-effective under replayed notifications.
//!
//! # Invariants
//!
//! - The reconciler is stateless; every call re-fetches the pod
//! - At most one node pool is requested per pod key
//! - Provider failures never panic the loop; they are reported and returned
//! - Nothing side-effecting runs after cancellation is observed

mod backoff;
mod dedup;
pub mod eligibility;
mod notifier;
mod pod;
mod provider;
mod quantity;
mod reconciler;
mod store;

pub use backoff::{RequeueBackoff, DEFAULT_REQUEUE_BASE, DEFAULT_REQUEUE_MAX};
pub use dedup::{DedupProvider, PoolState};
pub use eligibility::{
    evaluate, is_eligible, Eligibility, IgnoreReason, PodCriteria, ACCELERATOR_FAMILY_SELECTOR,
};
pub use notifier::Notifier;
pub use pod::{
    ConditionStatus, ContainerRequests, PodCondition, PodPhase, PodSnapshot, POD_SCHEDULED,
    REASON_UNSCHEDULABLE,
};
pub use provider::{NodePoolBackend, NodePoolProvider, NodePoolRequest, ProviderError};
pub use quantity::Quantity;
pub use reconciler::{requeue_signal, Outcome, ReconcileContext, ReconcileError, Reconciler};
pub use store::{PodStore, StoreError};
