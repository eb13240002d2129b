//! Daemon settings for the LibreCoach BLE bridge supervisor.
//!
//! Compiled defaults, an optional TOML file and `LIBRECOACH_*` environment
//! variables are layered with figment (later layers win), validated, and
//! translated into `librecoach_core::IntegrationSettings`. Nested keys use a
//! double underscore in the environment: `LIBRECOACH_MONITOR__MAX_ATTEMPTS=5`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use librecoach_core::config::{
    BridgeCommand, CleanupSettings, ControllerSettings, DEFAULT_BRIDGE_CONFIG_PATH,
    DEFAULT_DEVICE_REGISTRY_PATH, DEFAULT_DOMAIN, DEFAULT_NOTIFICATION_ID, DEFAULT_QOS,
    DEFAULT_STATIC_CONFIG_PATH, DEFAULT_TOPIC, IntegrationSettings, MonitorSettings,
};

/// Settings file read when no explicit path is given (ignored if absent).
pub const DEFAULT_SETTINGS_PATH: &str = "/config/librecoach/settings.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "LIBRECOACH_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("settings file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("settings loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings structs ────────────────────────────────────────────────

/// Top-level daemon settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Integration domain: device namespace and static-config key.
    pub domain: String,
    pub paths: Paths,
    pub signal: Signal,
    pub bridge: Bridge,
    pub monitor: Monitor,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.into(),
            paths: Paths::default(),
            signal: Signal::default(),
            bridge: Bridge::default(),
            monitor: Monitor::default(),
        }
    }
}

/// Files the daemon reads and edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Marker config written by the companion add-on.
    pub bridge_config: PathBuf,
    /// Static configuration holding the integration declaration.
    pub static_config: PathBuf,
    /// Host device registry storage file.
    pub device_registry: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            bridge_config: DEFAULT_BRIDGE_CONFIG_PATH.into(),
            static_config: DEFAULT_STATIC_CONFIG_PATH.into(),
            device_registry: DEFAULT_DEVICE_REGISTRY_PATH.into(),
        }
    }
}

/// Toggle signal transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Signal {
    pub topic: String,
    pub qos: u8,
    /// Subscriber command line emitting one payload per line. `{topic}` and
    /// `{qos}` are substituted. Standard input is read when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

impl Default for Signal {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.into(),
            qos: DEFAULT_QOS,
            command: None,
        }
    }
}

/// The managed bridge process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bridge {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for Bridge {
    fn default() -> Self {
        let command = BridgeCommand::default();
        Self {
            program: command.program,
            args: command.args,
        }
    }
}

/// Presence monitor timing, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    pub grace_period_secs: u64,
    pub retry_delay_secs: u64,
    pub max_attempts: u32,
    pub request_timeout_secs: u64,
}

impl Default for Monitor {
    fn default() -> Self {
        let defaults = MonitorSettings::default();
        Self {
            grace_period_secs: defaults.grace_period.as_secs(),
            retry_delay_secs: defaults.retry_delay.as_secs(),
            max_attempts: defaults.max_attempts,
            request_timeout_secs: defaults.request_timeout.as_secs(),
        }
    }
}

// ── Loading ─────────────────────────────────────────────────────────

impl Settings {
    /// The layered figment: defaults, then the settings file, then env.
    ///
    /// With `path == None` the default settings file is used if it exists.
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path.map_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH), Path::to_path_buf);
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate settings.
    ///
    /// An explicitly named settings file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path.filter(|p| !p.exists()) {
            return Err(ConfigError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        Self::from_figment(&Self::figment(path))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let settings: Self = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.trim().is_empty() {
            return Err(invalid("domain", "must not be empty"));
        }
        if self.signal.topic.trim().is_empty() {
            return Err(invalid("signal.topic", "must not be empty"));
        }
        if self.signal.qos > 2 {
            return Err(invalid(
                "signal.qos",
                format!("{} is not one of 0, 1, 2", self.signal.qos),
            ));
        }
        if self.signal.command.as_ref().is_some_and(Vec::is_empty) {
            return Err(invalid("signal.command", "must name a program"));
        }
        if self.bridge.program.trim().is_empty() {
            return Err(invalid("bridge.program", "must not be empty"));
        }
        if self.monitor.max_attempts == 0 {
            return Err(invalid(
                "monitor.max_attempts",
                "at least one attempt is required",
            ));
        }
        Ok(())
    }

    /// Render as TOML, e.g. for `config show`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    // ── Translation to core settings ────────────────────────────────

    pub fn controller(&self) -> ControllerSettings {
        ControllerSettings {
            domain: self.domain.clone(),
            topic: self.signal.topic.clone(),
            qos: self.signal.qos,
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            grace_period: Duration::from_secs(self.monitor.grace_period_secs),
            retry_delay: Duration::from_secs(self.monitor.retry_delay_secs),
            max_attempts: self.monitor.max_attempts,
            request_timeout: Duration::from_secs(self.monitor.request_timeout_secs),
        }
    }

    pub fn cleanup(&self) -> CleanupSettings {
        CleanupSettings {
            integration_key: self.domain.clone(),
            static_config_path: self.paths.static_config.clone(),
            notification_id: if self.domain == DEFAULT_DOMAIN {
                DEFAULT_NOTIFICATION_ID.into()
            } else {
                format!("{}_cleanup", self.domain)
            },
        }
    }

    pub fn bridge_command(&self) -> BridgeCommand {
        BridgeCommand {
            program: self.bridge.program.clone(),
            args: self.bridge.args.clone(),
        }
    }

    pub fn integration(&self) -> IntegrationSettings {
        IntegrationSettings {
            controller: self.controller(),
            monitor: self.monitor_settings(),
            cleanup: self.cleanup(),
            bridge_config_path: self.paths.bridge_config.clone(),
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}
