//! Configuration for the controller.

use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Which node pool backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Log requests without creating anything.
    Log,
    /// POST requests to an HTTP endpoint.
    Http,
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "log" => Ok(BackendKind::Log),
            "http" => Ok(BackendKind::Http),
            other => bail!("unknown backend '{other}', expected 'log' or 'http'"),
        }
    }
}

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resource a pod must request to be provisioned for.
    pub resource_type: String,

    pub backend: BackendKind,

    /// Base URL of the HTTP backend.
    pub backend_url: Option<String>,

    pub backend_timeout: Duration,

    /// Deadline handed to each reconciliation.
    pub reconcile_timeout: Duration,

    pub requeue_base: Duration,
    pub requeue_max: Duration,

    /// Reporter name on emitted events.
    pub controller_name: String,

    /// Reporter instance on emitted events.
    pub instance: Option<String>,

    /// Emit an event when a request is suppressed as a duplicate.
    pub notify_duplicates: bool,

    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resource_type = lookup("AUTOPOOL_RESOURCE_TYPE")
            .unwrap_or_else(|| "example.com/accelerator".to_string());
        if resource_type.trim().is_empty() {
            bail!("AUTOPOOL_RESOURCE_TYPE must not be empty");
        }

        let backend: BackendKind = lookup("AUTOPOOL_BACKEND")
            .unwrap_or_else(|| "log".to_string())
            .parse()
            .context("AUTOPOOL_BACKEND")?;

        let backend_url = lookup("AUTOPOOL_BACKEND_URL").filter(|u| !u.is_empty());
        if backend == BackendKind::Http && backend_url.is_none() {
            bail!("AUTOPOOL_BACKEND_URL is required when AUTOPOOL_BACKEND=http");
        }

        let backend_timeout = secs(&lookup, "AUTOPOOL_BACKEND_TIMEOUT_SECS", 30)?;
        let reconcile_timeout = secs(&lookup, "AUTOPOOL_RECONCILE_TIMEOUT_SECS", 60)?;
        let requeue_base = secs(&lookup, "AUTOPOOL_REQUEUE_BASE_SECS", 5)?;
        let requeue_max = secs(&lookup, "AUTOPOOL_REQUEUE_MAX_SECS", 300)?;

        let controller_name = lookup("AUTOPOOL_CONTROLLER_NAME")
            .unwrap_or_else(|| "autopool-controller".to_string());

        let instance = lookup("AUTOPOOL_INSTANCE").or_else(|| lookup("HOSTNAME"));

        let notify_duplicates = lookup("AUTOPOOL_NOTIFY_DUPLICATES")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let log_level = lookup("AUTOPOOL_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            resource_type,
            backend,
            backend_url,
            backend_timeout,
            reconcile_timeout,
            requeue_base,
            requeue_max,
            controller_name,
            instance,
            notify_duplicates,
            log_level,
        })
    }
}

fn secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(Duration::from_secs(default));
    };
    let value: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a whole number of seconds, got '{raw}'"))?;
    if value == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_secs(value))
}
