//! Config subcommand handlers.

use std::fmt::Write;

use serde_json::Value;

use librecoach_config::{DEFAULT_SETTINGS_PATH, Settings};
use librecoach_core::{BridgeConfig, ConfigStore};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::{CliError, exit_code};

/// Bridge config keys whose values are never printed.
const SENSITIVE_MARKERS: [&str; 4] = ["password", "token", "secret", "key"];

fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| key.contains(marker))
}

/// Pretty JSON of the bridge configuration with credentials masked.
pub fn redacted_bridge_config(config: &BridgeConfig) -> Result<String, CliError> {
    let mut config = config.clone();
    for (key, value) in &mut config.extra {
        if is_sensitive(key) && !value.is_null() {
            *value = Value::String("****".into());
        }
    }
    Ok(serde_json::to_string_pretty(&config)?)
}

pub async fn handle(
    args: &ConfigArgs,
    settings: &Settings,
    global: &GlobalOpts,
) -> Result<i32, CliError> {
    match args.command {
        ConfigCommand::Show => {
            let mut out = String::new();
            let source = global
                .settings
                .as_ref()
                .map_or_else(|| DEFAULT_SETTINGS_PATH.to_owned(), |p| p.display().to_string());
            let _ = writeln!(out, "# settings (file: {source})");
            out.push_str(&settings.to_toml()?);

            let store = ConfigStore::new(&settings.paths.bridge_config);
            let _ = writeln!(out);
            let _ = writeln!(out, "# bridge config ({})", store.path().display());
            match store.read().await {
                Ok(config) => {
                    let _ = writeln!(out, "{}", redacted_bridge_config(&config)?);
                }
                Err(e) => {
                    let _ = writeln!(out, "# unavailable: {e}");
                }
            }

            print!("{out}");
            Ok(exit_code::SUCCESS)
        }
    }
}
