// ── Notifiers ──

use async_trait::async_trait;
use librecoach_api::{PersistentNotification, SupervisorClient};
use tracing::warn;

use crate::error::CoreError;
use crate::host::Notifier;

/// Posts persistent notifications through the Supervisor's core API proxy.
#[derive(Debug, Clone)]
pub struct SupervisorNotifier {
    client: SupervisorClient,
}

impl SupervisorNotifier {
    pub fn new(client: SupervisorClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for SupervisorNotifier {
    async fn notify(&self, notification: &PersistentNotification) -> Result<(), CoreError> {
        self.client
            .create_persistent_notification(notification)
            .await
            .map_err(|e| CoreError::Notification {
                message: e.to_string(),
            })
    }
}

/// Fallback used when no Supervisor is reachable: the notification only
/// reaches the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &PersistentNotification) -> Result<(), CoreError> {
        warn!(
            notification_id = %notification.notification_id,
            title = %notification.title,
            "{}",
            notification.message
        );
        Ok(())
    }
}
