//! `run`: the long-lived supervisor.

use std::sync::Arc;

use librecoach_api::{SupervisorClient, SupervisorCredentials, TransportConfig};
use librecoach_config::Settings;
use librecoach_core::{
    Integration, IntegrationDeps, LogNotifier, Notifier, PresenceProbe, ProcessBridgeFactory,
    Readiness, StorageDeviceRegistry, SupervisorNotifier, SupervisorProbe,
};
use tracing::{info, warn};

use crate::error::{CliError, exit_code};
use crate::signal::{LineInput, LineSignalSource};

pub async fn handle(settings: &Settings) -> Result<i32, CliError> {
    let integration_settings = settings.integration();

    let client = match SupervisorCredentials::from_env() {
        Some(credentials) => {
            let transport =
                TransportConfig::with_timeout(integration_settings.monitor.request_timeout);
            Some(SupervisorClient::from_credentials(&credentials, &transport)?)
        }
        None => {
            warn!("no SUPERVISOR_TOKEN, not running under the Supervisor");
            None
        }
    };

    let notifier: Arc<dyn Notifier> = match &client {
        Some(client) => Arc::new(SupervisorNotifier::new(client.clone())),
        None => Arc::new(LogNotifier),
    };
    let probe = client.map(|client| Arc::new(SupervisorProbe::new(client)) as Arc<dyn PresenceProbe>);

    let input = settings
        .signal
        .command
        .clone()
        .map_or(LineInput::Stdin, LineInput::Command);

    let readiness = Readiness::new();
    let integration = Integration::setup(IntegrationDeps {
        factory: Arc::new(ProcessBridgeFactory::new(
            settings.bridge_command(),
            &settings.paths.bridge_config,
        )),
        registry: Arc::new(StorageDeviceRegistry::new(&settings.paths.device_registry)),
        notifier,
        signals: Arc::new(LineSignalSource::new(input)),
        probe,
        readiness: readiness.clone(),
        settings: integration_settings,
    })
    .await;

    readiness.fire();
    info!("supervisor running");

    shutdown_signal().await?;
    info!("shutting down");
    integration.unload().await?;
    Ok(exit_code::SUCCESS)
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<(), CliError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<(), CliError> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
