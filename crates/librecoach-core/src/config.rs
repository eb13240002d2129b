// ── Runtime settings ──
//
// These types describe *how* the integration behaves: names, paths, and
// timing. They never touch disk; `librecoach-config` builds them from the
// settings file and environment and hands them in.

use std::path::PathBuf;
use std::time::Duration;

/// Integration domain; also the top-level key in the static configuration.
pub const DEFAULT_DOMAIN: &str = "librecoach_ble";

/// Retained topic carrying the bridge toggle.
pub const DEFAULT_TOPIC: &str = "librecoach/config/microair_enabled";

/// Quality of service requested for the toggle subscription.
pub const DEFAULT_QOS: u8 = 1;

/// Stable identifier of the cleanup notification.
pub const DEFAULT_NOTIFICATION_ID: &str = "librecoach_ble_cleanup";

/// Marker config written by the companion add-on.
pub const DEFAULT_BRIDGE_CONFIG_PATH: &str = "/config/.librecoach/ble_config.json";

/// Host static configuration holding the integration declaration.
pub const DEFAULT_STATIC_CONFIG_PATH: &str = "/config/configuration.yaml";

/// Host device registry storage file.
pub const DEFAULT_DEVICE_REGISTRY_PATH: &str = "/config/.storage/core.device_registry";

/// Settings for the toggle-driven controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Identifier namespace of devices owned by this integration.
    pub domain: String,
    /// Topic of the retained toggle signal.
    pub topic: String,
    /// Requested delivery guarantee (0, 1 or 2).
    pub qos: u8,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.into(),
            topic: DEFAULT_TOPIC.into(),
            qos: DEFAULT_QOS,
        }
    }
}

/// Timing of the presence monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Sleep before the first probe, while the host and add-ons boot.
    pub grace_period: Duration,
    /// Sleep between attempts.
    pub retry_delay: Duration,
    /// Attempts that must all confirm absence before cleanup.
    pub max_attempts: u32,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(120),
            retry_delay: Duration::from_secs(30),
            max_attempts: 3,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Targets of the one-shot self-cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupSettings {
    /// Top-level key whose declaration is stripped from the static config.
    pub integration_key: String,
    /// Static declarative configuration file.
    pub static_config_path: PathBuf,
    /// Notification identifier, reused on every cleanup.
    pub notification_id: String,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            integration_key: DEFAULT_DOMAIN.into(),
            static_config_path: PathBuf::from(DEFAULT_STATIC_CONFIG_PATH),
            notification_id: DEFAULT_NOTIFICATION_ID.into(),
        }
    }
}

/// Program launched as the managed bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for BridgeCommand {
    fn default() -> Self {
        Self {
            program: "librecoach-ble-bridge".into(),
            args: Vec::new(),
        }
    }
}

/// Everything [`Integration::setup`](crate::Integration::setup) needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationSettings {
    pub controller: ControllerSettings,
    pub monitor: MonitorSettings,
    pub cleanup: CleanupSettings,
    /// Marker config file read by the [`ConfigStore`](crate::ConfigStore).
    pub bridge_config_path: PathBuf,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            controller: ControllerSettings::default(),
            monitor: MonitorSettings::default(),
            cleanup: CleanupSettings::default(),
            bridge_config_path: PathBuf::from(DEFAULT_BRIDGE_CONFIG_PATH),
        }
    }
}

impl IntegrationSettings {
    /// Settings with stock defaults rooted at `bridge_config_path`.
    pub fn with_bridge_config(bridge_config_path: impl Into<PathBuf>) -> Self {
        Self {
            bridge_config_path: bridge_config_path.into(),
            ..Self::default()
        }
    }
}
