// ── Integration runtime ──
//
// Wires the controller, the activation task and the presence monitor
// together for one load/unload cycle of the integration.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cleanup::{Cleanup, SelfCleanup};
use crate::config::IntegrationSettings;
use crate::controller::{ControllerHandle, LifecycleController, activate};
use crate::error::CoreError;
use crate::host::{DeviceRegistry, Notifier, ResourceFactory, Teardown};
use crate::monitor::{MonitorOutcome, PresenceMonitor, PresenceProbe};
use crate::signal::{Readiness, SignalSource};
use crate::store::{BridgeConfig, ConfigStore};

/// Host collaborators handed to [`Integration::setup`].
pub struct IntegrationDeps {
    pub settings: IntegrationSettings,
    pub factory: Arc<dyn ResourceFactory>,
    pub registry: Arc<dyn DeviceRegistry>,
    pub notifier: Arc<dyn Notifier>,
    pub signals: Arc<dyn SignalSource>,
    /// `None` without control-plane credentials; disables the monitor.
    pub probe: Option<Arc<dyn PresenceProbe>>,
    pub readiness: Readiness,
}

/// A loaded integration.
pub struct Integration {
    controller: ControllerHandle,
    cancel: CancellationToken,
    controller_task: JoinHandle<()>,
    activation_task: JoinHandle<()>,
    monitor_task: Option<JoinHandle<MonitorOutcome>>,
}

impl Integration {
    /// Load the integration.
    ///
    /// Never fails: a missing configuration only means the bridge cannot
    /// start until one appears, and a missing add-on slug only means nothing
    /// is monitored.
    pub async fn setup(deps: IntegrationDeps) -> Self {
        let IntegrationDeps {
            settings,
            factory,
            registry,
            notifier,
            signals,
            probe,
            readiness,
        } = deps;

        let store = ConfigStore::new(&settings.bridge_config_path);
        let initial = match store.read().await {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    kind = e.kind(),
                    disposition = %e.disposition(),
                    error = %e,
                    "no bridge configuration yet, bridge starts once it is written"
                );
                BridgeConfig::default()
            }
        };
        let slug = initial.addon_slug().map(str::to_owned);

        let cancel = CancellationToken::new();
        let controller = LifecycleController::new(
            settings.controller.clone(),
            store.clone(),
            factory,
            registry,
            initial,
        );
        let (handle, controller_task) = ControllerHandle::spawn(controller, cancel.child_token());

        let monitor_task = match slug {
            Some(slug) => {
                let cleanup: Arc<dyn Cleanup> = Arc::new(SelfCleanup::new(
                    settings.cleanup.clone(),
                    notifier,
                    Arc::new(handle.clone()) as Arc<dyn Teardown>,
                    store,
                ));
                info!(%slug, "monitoring companion add-on");
                Some(PresenceMonitor::new(slug, probe, cleanup, settings.monitor.clone()).spawn())
            }
            None => {
                debug!("no add-on slug configured, presence monitor not started");
                None
            }
        };

        let activation_task = {
            let handle = handle.clone();
            let cancel = cancel.child_token();
            let controller_settings = settings.controller.clone();
            tokio::spawn(async move {
                if let Err(e) =
                    activate(handle, signals, readiness, controller_settings, cancel).await
                {
                    warn!(kind = e.kind(), error = %e, "bridge toggle subscription failed");
                }
            })
        };

        info!("bridge will activate when the toggle signal arrives");
        Self {
            controller: handle,
            cancel,
            controller_task,
            activation_task,
            monitor_task,
        }
    }

    pub fn controller(&self) -> &ControllerHandle {
        &self.controller
    }

    /// Take the monitor task, e.g. to await its outcome.
    pub fn take_monitor(&mut self) -> Option<JoinHandle<MonitorOutcome>> {
        self.monitor_task.take()
    }

    /// Unload: abort the monitor, end the subscription, stop the bridge.
    pub async fn unload(self) -> Result<(), CoreError> {
        if let Some(monitor) = self.monitor_task {
            monitor.abort();
        }
        self.cancel.cancel();

        if let Err(e) = self.activation_task.await {
            debug!(error = %e, "activation task ended abnormally");
        }
        self.controller_task
            .await
            .map_err(|e| CoreError::join(&e))?;
        info!("integration unloaded");
        Ok(())
    }
}
