//! autopool controller library
//!
//! Provisions accelerator node pools for pods the scheduler cannot place.
//! The decision logic lives in `autopool-reconcile`; this crate wires it to
//! a cluster and a node pool backend.
//!
//! ## Modules
//!
//! - `config`: environment configuration
//! - `cluster`: Kubernetes pod store and event notifier
//! - `backend`: dry-run and HTTP node pool backends
//! - `controller`: kube-runtime watch loop with requeue backoff

pub mod backend;
pub mod cluster;
pub mod config;
pub mod controller;

/// Longest prefix of `s` that fits in `max` bytes without splitting a character.
pub(crate) fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
