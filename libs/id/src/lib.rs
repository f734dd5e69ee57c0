//! # autopool-id
//!
//! Identity types for the autopool provisioner.
//!
//! ## Design Principles
//!
//! - A pod is identified by its namespace-qualified name, never by UID
//! - Keys have one canonical string form, `{namespace}/{name}`, with strict parsing
//! - Node pool names are derived from pod keys, so every process that sees
//!   the same pod computes the same pool name
//!
//! ## Formats
//!
//! - Pod key: `default/trainer-0`
//! - Node pool name: `np-3f1c9a0b7d2e4c6f8a1b2c3d`

mod error;
mod types;

pub use error::IdError;
pub use types::*;
