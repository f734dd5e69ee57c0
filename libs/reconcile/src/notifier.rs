//! Outcome notifier contract.

use async_trait::async_trait;
use autopool_events::Notification;

/// Write-only sink for outcome notifications.
///
/// Fire-and-forget: implementations must handle their own failures, so a
/// sink outage never fails a reconciliation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn emit(&self, notification: Notification);
}
