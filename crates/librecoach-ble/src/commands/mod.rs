//! Command dispatch.

pub mod config_cmd;
pub mod probe;
pub mod run;
pub mod strip;

use librecoach_config::Settings;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Run `command` and return the process exit code.
pub async fn dispatch(command: Command, global: &GlobalOpts) -> Result<i32, CliError> {
    let settings = Settings::load(global.settings.as_deref())?;
    let color = output::should_color(global.color);
    tracing::debug!(command = ?command, "dispatching command");

    match command {
        Command::Run => run::handle(&settings).await,
        Command::Probe(args) => probe::handle(&args, &settings, color).await,
        Command::Config(args) => config_cmd::handle(&args, &settings, global).await,
        Command::Strip(args) => strip::handle(&args, &settings, color).await,
    }
}
