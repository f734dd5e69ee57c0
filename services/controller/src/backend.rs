//! Node pool backends.
//!
//! - [`LoggingBackend`]: dry run, logs what would be created
//! - [`HttpBackend`]: hands requests to a node pool service over HTTP
//!
//! Both are wrapped in a `DedupProvider` by the caller.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use autopool_id::PodKey;
use autopool_reconcile::{NodePoolBackend, NodePoolRequest, ProviderError};
use reqwest::StatusCode;
use tracing::{debug, error, info};

use crate::truncate_utf8;

/// Response body bytes kept in error messages.
pub const MAX_ERROR_BODY_BYTES: usize = 512;

/// Backend that only logs requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingBackend;

#[async_trait]
impl NodePoolBackend for LoggingBackend {
    async fn create_node_pool(&self, request: &NodePoolRequest) -> Result<(), ProviderError> {
        info!(
            pool = %request.name,
            pod = %request.pod,
            accelerator_family = %request.accelerator_family,
            resource_type = %request.resource_type,
            resource_count = request.resource_count,
            "[DRY RUN] Would create node pool"
        );
        Ok(())
    }
}

/// Backend that POSTs requests to `{base_url}/v1/node-pools`.
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBackend {
    /// Create a backend for the service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/node-pools", base_url.trim_end_matches('/')),
        })
    }

    /// The URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl NodePoolBackend for HttpBackend {
    async fn create_node_pool(&self, request: &NodePoolRequest) -> Result<(), ProviderError> {
        debug!(url = %self.endpoint, pool = %request.name, "Requesting node pool");

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(pool = %request.name, status = %status, "Node pool accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!(
            status = %status,
            body = %truncate_utf8(&body, MAX_ERROR_BODY_BYTES),
            pool = %request.name,
            "Node pool request rejected"
        );
        Err(classify_status(status, &request.pod, &body))
    }
}

/// Map a non-success response onto the provider error taxonomy.
pub fn classify_status(status: StatusCode, pod: &PodKey, body: &str) -> ProviderError {
    let detail = if body.is_empty() {
        status.to_string()
    } else if body.len() > MAX_ERROR_BODY_BYTES {
        format!("{status}: {}...", truncate_utf8(body, MAX_ERROR_BODY_BYTES))
    } else {
        format!("{status}: {body}")
    };

    match status {
        StatusCode::CONFLICT => ProviderError::DuplicateRequest(pod.clone()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized(detail),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::Quota(detail),
        s if s.is_server_error() => ProviderError::Transient(detail),
        _ => ProviderError::Backend(detail),
    }
}
