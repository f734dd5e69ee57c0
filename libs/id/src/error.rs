//! Error types for key parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or validating keys.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The key string is empty.
    #[error("key cannot be empty")]
    Empty,

    /// The key is missing the `/` separator between namespace and name.
    #[error("key missing '/' separator: {0}")]
    MissingSeparator(String),

    /// One of the key components is empty.
    #[error("key has an empty {component}: {key}")]
    EmptyComponent {
        component: &'static str,
        key: String,
    },

    /// A component contains characters a Kubernetes object name cannot hold.
    #[error("invalid {component} '{value}': {reason}")]
    InvalidComponent {
        component: &'static str,
        value: String,
        reason: &'static str,
    },
}
