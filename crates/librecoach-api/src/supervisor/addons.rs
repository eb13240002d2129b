// Supervisor add-on endpoints
//
// The two independent presence sources: per-add-on info and the installed
// listing.

use tracing::debug;

use super::client::SupervisorClient;
use super::models::{AddonInfo, AddonList};
use crate::error::Error;

impl SupervisorClient {
    /// Fetch a single add-on's info.
    ///
    /// `GET /addons/{slug}/info`
    ///
    /// Returns `Ok(None)` when the Supervisor does not know the slug at all
    /// (HTTP 400/404). A known-but-uninstalled store entry comes back as
    /// `Some` with an empty version; see [`AddonInfo::is_installed`].
    pub async fn addon_info(&self, slug: &str) -> Result<Option<AddonInfo>, Error> {
        let url = self.endpoint(&["addons", slug, "info"])?;
        debug!(slug, "fetching add-on info");
        let resp = self.get_raw(url).await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::BAD_REQUEST {
            debug!(slug, %status, "add-on unknown to the Supervisor");
            return Ok(None);
        }

        Self::unwrap_envelope(resp).await.map(Some)
    }

    /// List installed add-ons.
    ///
    /// `GET /addons`
    pub async fn list_addons(&self) -> Result<AddonList, Error> {
        let url = self.endpoint(&["addons"])?;
        debug!("listing add-ons");
        self.get(url).await
    }
}
