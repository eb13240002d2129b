//! Clap derive structures for the `librecoach-ble` daemon.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// librecoach-ble -- supervisor for the LibreCoach BLE bridge
#[derive(Debug, Parser)]
#[command(
    name = "librecoach-ble",
    version,
    about = "Supervise the LibreCoach BLE bridge",
    long_about = "Starts and stops the LibreCoach BLE bridge from the retained \
        microair_enabled toggle,\nand cleans up after itself once the companion \
        add-on has been uninstalled.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Settings file (TOML)
    #[arg(long, short = 'c', env = "LIBRECOACH_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the supervisor until interrupted
    Run,

    /// Check once whether the companion add-on is installed
    Probe(ProbeArgs),

    /// Inspect effective settings
    Config(ConfigArgs),

    /// Remove the integration declaration from the static configuration
    Strip(StripArgs),
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Add-on slug (defaults to `addon_slug` from the bridge configuration)
    #[arg(long)]
    pub slug: Option<String>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print effective settings and the current bridge configuration
    Show,
}

#[derive(Debug, Args)]
pub struct StripArgs {
    /// Show what would be removed without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Static configuration file (defaults to `paths.static_config`)
    #[arg(long)]
    pub file: Option<PathBuf>,
}
