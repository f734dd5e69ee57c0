//! Reconciliation core.
//!
//! One call handles one notification for one pod:
//!
//! ```text
//! Start -> Fetched -> Ignored
//!                  -> Ensuring -> Ensured | DuplicateSuppressed | Failed
//! ```
//!
//! Nothing is remembered between calls. Replays and overlapping calls for the
//! same pod are safe because the pod is re-fetched every time and the provider
//! owns deduplication.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use autopool_events::Notification;
use autopool_id::PodKey;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::eligibility::{evaluate, Eligibility, IgnoreReason, PodCriteria};
use crate::notifier::Notifier;
use crate::provider::{NodePoolProvider, ProviderError};
use crate::store::{PodStore, StoreError};
use crate::PodSnapshot;

/// Terminal state of a successful reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do.
    Ignored(IgnoreReason),

    /// The provider created or confirmed a node pool.
    Ensured,

    /// The provider was already handling this pod.
    DuplicateSuppressed,
}

/// Failed reconciliation. Every variant asks the caller to redeliver.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("getting pod: {0}")]
    Fetch(#[source] StoreError),

    #[error("ensuring node pool: {0}")]
    Provisioning(#[source] ProviderError),

    #[error("reconciliation cancelled")]
    Cancelled,

    #[error("reconciliation deadline exceeded")]
    DeadlineExceeded,
}

impl ReconcileError {
    /// Whether the delivery layer should redeliver. Always true; no failure
    /// here is known to be permanent.
    pub fn requeue(&self) -> bool {
        true
    }
}

/// Split a reconciliation result into the `(requeue, error)` pair the
/// delivery layer acts on.
pub fn requeue_signal(
    result: Result<Outcome, ReconcileError>,
) -> (bool, Option<ReconcileError>) {
    match result {
        Ok(_) => (false, None),
        Err(e) => (e.requeue(), Some(e)),
    }
}

/// Cancellation and deadline handed down by the caller.
#[derive(Debug, Clone, Default)]
pub struct ReconcileContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl ReconcileContext {
    /// Context cancelled by `cancel`, without a deadline.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Add an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Add a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Fail if the signal has already fired.
    fn check(&self) -> Result<(), ReconcileError> {
        if self.cancel.is_cancelled() {
            return Err(ReconcileError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ReconcileError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` unless the signal fires first; `fut` is dropped if it does.
    async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ReconcileError> {
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ReconcileError::Cancelled),
            _ = deadline => Err(ReconcileError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

/// The reconciler.
pub struct Reconciler {
    store: Arc<dyn PodStore>,
    provider: Arc<dyn NodePoolProvider>,
    notifier: Arc<dyn Notifier>,
    criteria: PodCriteria,
    notify_duplicates: bool,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(
        store: Arc<dyn PodStore>,
        provider: Arc<dyn NodePoolProvider>,
        notifier: Arc<dyn Notifier>,
        criteria: PodCriteria,
    ) -> Self {
        Self {
            store,
            provider,
            notifier,
            criteria,
            notify_duplicates: false,
        }
    }

    /// Also emit an informational notification when a request is suppressed
    /// as a duplicate. Off by default: a pod stays pending until its pool is
    /// up, and every update in between would add one.
    pub fn with_duplicate_notifications(mut self, enabled: bool) -> Self {
        self.notify_duplicates = enabled;
        self
    }

    /// Reconcile one pod.
    #[instrument(skip(self, key, ctx), fields(namespace = %key.namespace(), name = %key.name()))]
    pub async fn reconcile(
        &self,
        key: &PodKey,
        ctx: &ReconcileContext,
    ) -> Result<Outcome, ReconcileError> {
        ctx.check()?;
        debug!("Reconciling pod");

        let pod = match ctx.run(self.store.get(key)).await? {
            Ok(Some(pod)) => pod,
            Ok(None) => {
                debug!("Pod no longer exists");
                self.provider.release(key);
                return Ok(Outcome::Ignored(IgnoreReason::NotFound));
            }
            Err(e) => {
                warn!(error = %e, "Failed to get pod");
                return Err(ReconcileError::Fetch(e));
            }
        };

        if let Eligibility::Ineligible(reason) = evaluate(&pod, &self.criteria) {
            debug!(reason = %reason, "Ignoring pod");
            if reason == IgnoreReason::NotPending {
                // Pods never return to Pending.
                self.provider.release(key);
            }
            return Ok(Outcome::Ignored(reason));
        }

        info!("Ensuring node pool for unschedulable pod");
        ctx.run(self.notify(&pod, Notification::ensuring(key.clone())))
            .await?;

        match ctx.run(self.provider.ensure_node_pool_for_pod(&pod)).await? {
            Ok(()) => {
                self.notify_outcome(ctx, &pod, Notification::ensured(key.clone()))
                    .await;
                Ok(Outcome::Ensured)
            }
            Err(e) if e.is_duplicate() => {
                info!("Ignoring duplicate request to create node pool");
                if self.notify_duplicates {
                    self.notify_outcome(ctx, &pod, Notification::duplicate(key.clone()))
                        .await;
                }
                Ok(Outcome::DuplicateSuppressed)
            }
            Err(e) => {
                warn!(error = %e, "Failed to ensure node pool");
                self.notify_outcome(ctx, &pod, Notification::failed(key.clone(), &e))
                    .await;
                Err(ReconcileError::Provisioning(e))
            }
        }
    }

    async fn notify(&self, pod: &PodSnapshot, notification: Notification) {
        self.notifier
            .emit(notification.with_subject_uid(pod.uid.clone()))
            .await;
    }

    /// Report a provider result. The result stands if the signal fires first;
    /// only its notification is dropped.
    async fn notify_outcome(
        &self,
        ctx: &ReconcileContext,
        pod: &PodSnapshot,
        notification: Notification,
    ) {
        let reason = notification.reason;
        if let Err(e) = ctx.run(self.notify(pod, notification)).await {
            warn!(reason = %reason, error = %e, "Notification abandoned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requeue_signal() {
        assert!(matches!(
            requeue_signal(Ok(Outcome::Ensured)),
            (false, None)
        ));
        assert!(matches!(
            requeue_signal(Ok(Outcome::Ignored(IgnoreReason::NotFound))),
            (false, None)
        ));
        assert!(matches!(
            requeue_signal(Err(ReconcileError::Cancelled)),
            (true, Some(ReconcileError::Cancelled))
        ));
    }

    #[test]
    fn test_error_messages_carry_cause() {
        let err = ReconcileError::Provisioning(ProviderError::Quota("TPU v5 in us-central2".into()));
        assert_eq!(
            err.to_string(),
            "ensuring node pool: quota exceeded: TPU v5 in us-central2"
        );
    }

    #[tokio::test]
    async fn test_context_check() {
        let token = CancellationToken::new();
        let ctx = ReconcileContext::new(token.clone());
        assert!(ctx.check().is_ok());

        token.cancel();
        assert!(matches!(ctx.check(), Err(ReconcileError::Cancelled)));

        let expired = ReconcileContext::default().with_deadline(Instant::now());
        assert!(matches!(
            expired.check(),
            Err(ReconcileError::DeadlineExceeded)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out_pending_future() {
        let ctx = ReconcileContext::default().with_timeout(Duration::from_secs(1));
        let result = ctx.run(std::future::pending::<()>()).await;
        assert!(matches!(result, Err(ReconcileError::DeadlineExceeded)));
    }
}
