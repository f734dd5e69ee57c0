//! Watch loop.
//!
//! Drives the reconciler from a kube-runtime `Controller` over pending pods.
//! The trigger object only supplies the key; the reconciler re-fetches the pod.

use std::sync::Arc;
use std::time::Duration;

use autopool_reconcile::{
    Outcome, ReconcileContext, ReconcileError, Reconciler, RequeueBackoff, StoreError,
};
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cluster::pod_key;

/// Only pending pods can become eligible.
pub const PENDING_FIELD_SELECTOR: &str = "status.phase=Pending";

/// Shared state handed to every reconciliation.
pub struct Context {
    pub reconciler: Reconciler,
    pub backoff: RequeueBackoff,
    pub reconcile_timeout: Duration,
    pub shutdown: CancellationToken,
}

impl Context {
    pub fn new(
        reconciler: Reconciler,
        backoff: RequeueBackoff,
        reconcile_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            reconciler,
            backoff,
            reconcile_timeout,
            shutdown,
        }
    }
}

/// Reconcile one pod notification.
pub async fn reconcile(pod: Arc<Pod>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let key = pod_key(&pod).map_err(ReconcileError::Fetch)?;

    let reconcile_ctx =
        ReconcileContext::new(ctx.shutdown.child_token()).with_timeout(ctx.reconcile_timeout);

    let outcome = ctx.reconciler.reconcile(&key, &reconcile_ctx).await?;
    ctx.backoff.reset(&key);

    match outcome {
        Outcome::Ignored(reason) => debug!(pod = %key, reason = %reason, "Pod ignored"),
        Outcome::Ensured => info!(pod = %key, "Node pool ensured"),
        Outcome::DuplicateSuppressed => debug!(pod = %key, "Duplicate request suppressed"),
    }

    Ok(Action::await_change())
}

/// Requeue failed reconciliations with per-pod exponential backoff.
pub fn error_policy(pod: Arc<Pod>, error: &ReconcileError, ctx: Arc<Context>) -> Action {
    if let ReconcileError::Fetch(StoreError::InvalidObject { .. }) = error {
        warn!(error = %error, "Skipping malformed pod");
        return Action::await_change();
    }

    match pod_key(&pod) {
        Ok(key) => {
            let delay = ctx.backoff.record_failure(&key);
            warn!(
                pod = %key,
                error = %error,
                failures = ctx.backoff.failures(&key),
                delay_secs = delay.as_secs(),
                "Reconciliation failed, requeueing"
            );
            Action::requeue(delay)
        }
        Err(_) => Action::await_change(),
    }
}

/// Run the controller until `ctx.shutdown` fires.
pub async fn run(client: Client, ctx: Arc<Context>) {
    let pods: Api<Pod> = Api::all(client);
    let watch = watcher::Config::default().fields(PENDING_FIELD_SELECTOR);
    let shutdown = ctx.shutdown.clone();

    info!(field_selector = PENDING_FIELD_SELECTOR, "Starting pod controller");

    let controller = Controller::new(pods, watch)
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!(pod = %object, "Reconciled"),
                Err(e) => debug!(error = %e, "Reconcile loop error"),
            }
        });

    tokio::select! {
        _ = controller => warn!("Pod controller stream ended"),
        _ = shutdown.cancelled() => info!("Pod controller shutting down"),
    }
}

/// Wait for the controller task. Returns false if it panicked.
pub async fn join(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Controller task panicked");
            false
        }
    }
}
