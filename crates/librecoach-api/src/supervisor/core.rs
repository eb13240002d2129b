// Home Assistant core API, reached through the Supervisor proxy.

use tracing::debug;

use super::client::SupervisorClient;
use super::models::PersistentNotification;
use crate::error::Error;

impl SupervisorClient {
    /// Raise a persistent notification in the Home Assistant UI.
    ///
    /// `POST /core/api/services/persistent_notification/create`
    pub async fn create_persistent_notification(
        &self,
        notification: &PersistentNotification,
    ) -> Result<(), Error> {
        let url = self.endpoint(&[
            "core",
            "api",
            "services",
            "persistent_notification",
            "create",
        ])?;
        debug!(id = %notification.notification_id, "creating persistent notification");
        self.post_unenveloped(url, notification).await
    }
}
