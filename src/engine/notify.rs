// ==========================================
// Roofline Ops - notification collaborator
// ==========================================
// One-way notification contract. Delivery (push/email) lives outside this
// system; engines call notify_best_effort, which logs failures and swallows
// them so a broken notifier can never roll back a transition.
// ==========================================

use crate::domain::types::{NotifyPriority, Role};
use async_trait::async_trait;
use tracing::warn;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        roles: &[Role],
        message: &str,
        priority: NotifyPriority,
    ) -> anyhow::Result<()>;
}

/// Default notifier: writes notifications to the log. Stands in for the
/// external push/email collaborator.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        roles: &[Role],
        message: &str,
        priority: NotifyPriority,
    ) -> anyhow::Result<()> {
        tracing::info!(?roles, ?priority, "notify: {}", message);
        Ok(())
    }
}

/// Fire a notification without letting a failure propagate.
pub async fn notify_best_effort(
    notifier: &dyn Notifier,
    roles: &[Role],
    message: &str,
    priority: NotifyPriority,
) {
    if roles.is_empty() {
        return;
    }
    if let Err(e) = notifier.notify(roles, message, priority).await {
        warn!("notification failed (ignored): {}", e);
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::RecordingNotifier;
    use super::*;

    #[tokio::test]
    async fn test_best_effort_records_and_skips_empty_roles() {
        let notifier = RecordingNotifier::default();
        notify_best_effort(&notifier, &[Role::Dispatcher], "pickup ready", NotifyPriority::Normal)
            .await;
        notify_best_effort(&notifier, &[], "nobody to tell", NotifyPriority::Normal).await;
        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages.as_slice(), ["pickup ready"]);
    }

    #[tokio::test]
    async fn test_best_effort_swallows_failures() {
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        // must not panic or propagate
        notify_best_effort(&notifier, &[Role::Admin], "down", NotifyPriority::Urgent).await;
    }
}
