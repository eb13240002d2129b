// ── Process bridge ──
//
// Stock `ManagedResource`: the bridge runs as a child process that reads
// the same configuration file the controller does.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::BridgeCommand;
use crate::error::CoreError;
use crate::host::{ManagedResource, ResourceFactory};
use crate::store::BridgeConfig;

/// Environment variable carrying the bridge config path to the child.
pub const CONFIG_PATH_ENV: &str = "LIBRECOACH_BLE_CONFIG";

/// Environment variable carrying the companion add-on slug to the child.
pub const ADDON_SLUG_ENV: &str = "LIBRECOACH_ADDON_SLUG";

/// Creates one [`ProcessBridge`] per start.
#[derive(Debug, Clone)]
pub struct ProcessBridgeFactory {
    command: BridgeCommand,
    config_path: PathBuf,
}

impl ProcessBridgeFactory {
    pub fn new(command: BridgeCommand, config_path: impl Into<PathBuf>) -> Self {
        Self {
            command,
            config_path: config_path.into(),
        }
    }
}

impl ResourceFactory for ProcessBridgeFactory {
    fn create(&self, config: &BridgeConfig) -> Box<dyn ManagedResource> {
        Box::new(ProcessBridge {
            command: self.command.clone(),
            config_path: self.config_path.clone(),
            addon_slug: config.addon_slug().map(str::to_owned),
            child: None,
        })
    }
}

/// The bridge child process.
#[derive(Debug)]
pub struct ProcessBridge {
    command: BridgeCommand,
    config_path: PathBuf,
    addon_slug: Option<String>,
    child: Option<Child>,
}

impl ProcessBridge {
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }
}

#[async_trait]
impl ManagedResource for ProcessBridge {
    async fn start(&mut self) -> Result<(), CoreError> {
        if self.child.is_some() {
            return Ok(());
        }

        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .env(CONFIG_PATH_ENV, &self.config_path)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(slug) = &self.addon_slug {
            cmd.env(ADDON_SLUG_ENV, slug);
        }

        let child = cmd.spawn().map_err(|e| CoreError::ResourceStart {
            message: format!("cannot launch {}: {e}", self.command.program),
        })?;
        debug!(program = %self.command.program, pid = ?child.id(), "bridge process spawned");
        self.child = Some(child);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CoreError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                warn!(program = %self.command.program, %status, "bridge process had already exited");
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => {
                return Err(CoreError::ResourceStop {
                    message: format!("cannot query {}: {e}", self.command.program),
                });
            }
        }

        // `kill` waits for the child to be reaped.
        child.kill().await.map_err(|e| CoreError::ResourceStop {
            message: format!("cannot kill {}: {e}", self.command.program),
        })?;
        info!(program = %self.command.program, "bridge process terminated");
        Ok(())
    }

    fn describe(&self) -> String {
        match self.pid() {
            Some(pid) => format!("{} (pid {pid})", self.command.program),
            None => self.command.program.clone(),
        }
    }
}
