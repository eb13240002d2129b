//! Async client for the Supervisor control plane.
//!
//! The LibreCoach BLE bridge only needs a narrow slice of the Supervisor
//! REST surface:
//!
//! - **[`SupervisorClient::addon_info`]**: `GET /addons/{slug}/info`, used to
//!   tell an installed add-on (non-empty `version`) from a catalog entry.
//! - **[`SupervisorClient::list_addons`]**: `GET /addons`, the installed
//!   add-on listing.
//! - **[`SupervisorClient::create_persistent_notification`]**: proxied
//!   through `/core/api/services/...` to raise a user-visible notification.
//!
//! Authentication is a bearer token handed to the process by the host
//! (`SUPERVISOR_TOKEN`); see [`SupervisorCredentials`].

pub mod auth;
pub mod error;
pub mod supervisor;
pub mod transport;

pub use auth::SupervisorCredentials;
pub use error::Error;
pub use supervisor::SupervisorClient;
pub use supervisor::models::{AddonInfo, AddonList, AddonSummary, PersistentNotification};
pub use transport::TransportConfig;
