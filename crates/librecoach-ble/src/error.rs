//! CLI error types with miette diagnostics.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use librecoach_config::ConfigError;
use librecoach_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    /// `probe`: the add-on is confirmed absent.
    pub const ABSENT: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    /// `probe`: the attempt neither confirmed nor refuted presence.
    pub const INCONCLUSIVE: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Settings ─────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(librecoach::settings),
        help(
            "Check the settings file and LIBRECOACH_* environment variables.\n\
             Run: librecoach-ble config show"
        )
    )]
    Settings(#[from] ConfigError),

    // ── Supervisor ───────────────────────────────────────────────────
    #[error("No Supervisor token available")]
    #[diagnostic(
        code(librecoach::no_credentials),
        help(
            "SUPERVISOR_TOKEN is provided to add-ons and integrations running under\n\
             the Home Assistant Supervisor. Set it (and SUPERVISOR) to probe manually."
        )
    )]
    NoCredentials,

    #[error("Supervisor request failed")]
    #[diagnostic(code(librecoach::supervisor))]
    Supervisor(#[from] librecoach_api::Error),

    #[error("No add-on slug configured in {}", path.display())]
    #[diagnostic(
        code(librecoach::no_slug),
        help("Pass --slug, or wait for the companion add-on to write its configuration.")
    )]
    NoSlug { path: PathBuf },

    // ── Runtime ──────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(librecoach::core))]
    Core(#[from] CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(librecoach::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Settings(_) | Self::NoSlug { .. } => exit_code::USAGE,
            Self::NoCredentials => exit_code::AUTH,
            Self::Supervisor(librecoach_api::Error::Authentication { .. }) => exit_code::AUTH,
            Self::Supervisor(_) => exit_code::CONNECTION,
            _ => exit_code::GENERAL,
        }
    }
}
