// ── Bridge configuration store ──
//
// The companion add-on writes a small JSON object to a well-known path.
// The file may not exist yet (add-on still booting) or may be caught
// half-written; neither is fatal. Reads always run on the blocking pool.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::CoreError;

/// Configuration blob written by the companion add-on.
///
/// Only `addon_slug` and `microair_enabled` are interpreted here; every
/// other key (credentials, device lists, ...) is carried through untouched
/// for the bridge process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon_slug: Option<String>,
    /// Informational only; the live toggle signal is authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microair_enabled: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BridgeConfig {
    /// An empty object counts as "no configuration".
    pub fn is_empty(&self) -> bool {
        self.addon_slug.is_none() && self.microair_enabled.is_none() && self.extra.is_empty()
    }

    /// The add-on slug, if set and non-blank.
    pub fn addon_slug(&self) -> Option<&str> {
        self.addon_slug
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// `microair_enabled` decoded from a bool or a `"true"`/`"false"` string.
    pub fn microair_enabled_flag(&self) -> Option<bool> {
        match self.microair_enabled.as_ref()? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => Some(s.trim() == "true"),
            _ => None,
        }
    }
}

/// Loads the bridge configuration from its fixed path.
///
/// Holds no snapshot of its own; the controller keeps the last-known-good
/// copy and calls [`load`](Self::load) again on every start attempt.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file, reporting exactly why nothing came back.
    pub async fn read(&self) -> Result<BridgeConfig, CoreError> {
        let path = self.path.clone();
        let text = tokio::task::spawn_blocking(move || match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::io(path, e)),
        })
        .await
        .map_err(|e| CoreError::join(&e))??;

        let Some(text) = text else {
            return Err(CoreError::ConfigMissing {
                path: self.path.clone(),
            });
        };

        serde_json::from_str(&text).map_err(|e| CoreError::ConfigParse {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    /// Load the configuration, or `None` when it is missing or unreadable.
    ///
    /// A missing file is expected during startup and only logged at debug;
    /// parse and I/O failures are warnings. Callers fall back to whatever
    /// they loaded last.
    pub async fn load(&self) -> Option<BridgeConfig> {
        match self.read().await {
            Ok(config) => Some(config),
            Err(e @ CoreError::ConfigMissing { .. }) => {
                debug!(kind = e.kind(), path = %self.path.display(), "config file not present");
                None
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "config file error");
                None
            }
        }
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub async fn save(&self, config: &BridgeConfig) -> Result<(), CoreError> {
        let text = serde_json::to_string_pretty(config)
            .map_err(|e| CoreError::Internal(format!("config serialization failed: {e}")))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
            }
            std::fs::write(&path, text).map_err(|e| CoreError::io(path, e))
        })
        .await
        .map_err(|e| CoreError::join(&e))?
    }

    /// Delete the file. Returns `Ok(false)` if it was already gone.
    pub async fn remove(&self) -> Result<bool, CoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CoreError::io(path, e)),
        })
        .await
        .map_err(|e| CoreError::join(&e))?
    }
}
