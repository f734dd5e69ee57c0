//! autopool controller
//!
//! Watches pending pods and asks a node pool backend for capacity whenever
//! one is unschedulable for want of the configured accelerator resource.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use autopool_controller::backend::{HttpBackend, LoggingBackend};
use autopool_controller::cluster::{KubeEventNotifier, KubePodStore};
use autopool_controller::config::{BackendKind, Config};
use autopool_controller::controller::{self, Context};
use autopool_reconcile::{
    DedupProvider, NodePoolProvider, PodCriteria, Reconciler, RequeueBackoff,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        resource_type = %config.resource_type,
        backend = ?config.backend,
        controller_name = %config.controller_name,
        "Starting autopool controller"
    );

    let client = kube::Client::try_default()
        .await
        .context("connecting to Kubernetes")?;

    let provider: Arc<dyn NodePoolProvider> = match config.backend {
        BackendKind::Log => Arc::new(DedupProvider::new(LoggingBackend, &config.resource_type)),
        BackendKind::Http => {
            let url = config
                .backend_url
                .as_deref()
                .context("AUTOPOOL_BACKEND_URL is required for the http backend")?;
            let backend = HttpBackend::new(url, config.backend_timeout)?;
            info!(endpoint = %backend.endpoint(), "Using HTTP node pool backend");
            Arc::new(DedupProvider::new(backend, &config.resource_type))
        }
    };

    let reconciler = Reconciler::new(
        Arc::new(KubePodStore::new(client.clone())),
        provider,
        Arc::new(KubeEventNotifier::new(
            client.clone(),
            &config.controller_name,
            config.instance.clone(),
        )),
        PodCriteria::new(config.resource_type.clone()),
    )
    .with_duplicate_notifications(config.notify_duplicates);

    let shutdown = CancellationToken::new();
    let ctx = Arc::new(Context::new(
        reconciler,
        RequeueBackoff::new(config.requeue_base, config.requeue_max),
        config.reconcile_timeout,
        shutdown.clone(),
    ));

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("Received shutdown signal");
            shutdown.cancel();
        }
    });

    let clean = controller::join(tokio::spawn(controller::run(client, ctx))).await;
    shutdown.cancel();

    if !clean {
        anyhow::bail!("controller task panicked");
    }

    info!("Controller shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
