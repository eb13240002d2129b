// ── Host collaborators ──
//
// The controller never talks to the bridge process, the device registry,
// or the notification channel directly; it goes through these traits.
// Stock adapters live in `bridge`, `registry` and `notify`.

use async_trait::async_trait;
use librecoach_api::PersistentNotification;

use crate::error::CoreError;
use crate::store::BridgeConfig;

/// The opaque start/stop resource the controller drives.
///
/// `stop` must not return before the resource is really gone: a following
/// `start` would otherwise run two instances side by side.
#[async_trait]
pub trait ManagedResource: Send + Sync {
    async fn start(&mut self) -> Result<(), CoreError>;

    async fn stop(&mut self) -> Result<(), CoreError>;

    /// Human-readable name for logs.
    fn describe(&self) -> String {
        "bridge".into()
    }
}

/// Builds a fresh [`ManagedResource`] from the configuration current at
/// start time.
pub trait ResourceFactory: Send + Sync {
    fn create(&self, config: &BridgeConfig) -> Box<dyn ManagedResource>;
}

/// A device entry in the host registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredDevice {
    pub id: String,
    pub name: Option<String>,
    /// `(namespace, identifier)` pairs.
    pub identifiers: Vec<(String, String)>,
}

impl RegisteredDevice {
    /// `true` if any identifier lives in `domain`'s namespace.
    pub fn belongs_to(&self, domain: &str) -> bool {
        self.identifiers.iter().any(|(ns, _)| ns == domain)
    }
}

/// The host's persistent device registry.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn devices(&self) -> Result<Vec<RegisteredDevice>, CoreError>;

    async fn remove_device(&self, id: &str) -> Result<(), CoreError>;
}

/// Fire-and-forget user notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &PersistentNotification) -> Result<(), CoreError>;
}

/// Stop whatever the controller is running, purge its devices, and refuse
/// further starts for the rest of the process.
///
/// Safe to call whether or not anything is running.
#[async_trait]
pub trait Teardown: Send + Sync {
    async fn teardown(&self);
}
