//! `probe`: a single presence attempt.

use librecoach_api::{SupervisorClient, SupervisorCredentials, TransportConfig};
use librecoach_config::Settings;
use librecoach_core::{ConfigStore, PresenceProbe, PresenceVerdict, SupervisorProbe};

use crate::cli::ProbeArgs;
use crate::error::{CliError, exit_code};
use crate::output;

pub async fn handle(args: &ProbeArgs, settings: &Settings, color: bool) -> Result<i32, CliError> {
    let slug = match &args.slug {
        Some(slug) => slug.clone(),
        None => ConfigStore::new(&settings.paths.bridge_config)
            .load()
            .await
            .and_then(|config| config.addon_slug().map(str::to_owned))
            .ok_or_else(|| CliError::NoSlug {
                path: settings.paths.bridge_config.clone(),
            })?,
    };

    let credentials = SupervisorCredentials::from_env().ok_or(CliError::NoCredentials)?;
    let transport = TransportConfig::with_timeout(settings.monitor_settings().request_timeout);
    let client = SupervisorClient::from_credentials(&credentials, &transport)?;

    let verdict = SupervisorProbe::new(client).probe(&slug).await;
    println!("{}", output::verdict(&slug, &verdict, color));

    Ok(match verdict {
        PresenceVerdict::Present => exit_code::SUCCESS,
        PresenceVerdict::Absent => exit_code::ABSENT,
        PresenceVerdict::Inconclusive { .. } => exit_code::INCONCLUSIVE,
    })
}
