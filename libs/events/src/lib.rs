//! # autopool-events
//!
//! Notifications emitted by the provisioner about the pods it acts on.
//!
//! ## Design Principles
//!
//! - Every notification is attached to exactly one pod
//! - Reasons are a closed set with stable CamelCase names, so operators can
//!   filter on them (`kubectl get events --field-selector reason=...`)
//! - Messages are human-readable and may include provider error text
//!
//! ## Trail
//!
//! An eligible pod produces `EnsuringNodePool` followed by either
//! `NodePoolEnsured` or `FailedEnsuringNodePool`. A replayed notification
//! that the provider recognises as a duplicate may add
//! `DuplicateNodePoolRequest`.

mod envelope;
mod error;
mod types;

pub use envelope::*;
pub use error::EventError;
pub use types::*;
