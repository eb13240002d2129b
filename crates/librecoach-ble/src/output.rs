//! Terminal output helpers.

use std::io::{self, IsTerminal};

use owo_colors::OwoColorize;

use librecoach_core::PresenceVerdict;

use crate::cli::ColorMode;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// One-line rendering of a probe verdict.
pub fn verdict(slug: &str, verdict: &PresenceVerdict, color: bool) -> String {
    let (label, detail) = match verdict {
        PresenceVerdict::Present => ("present", String::new()),
        PresenceVerdict::Absent => ("absent", String::new()),
        PresenceVerdict::Inconclusive { reason } => ("inconclusive", format!(" ({reason})")),
    };
    let label = if color {
        match verdict {
            PresenceVerdict::Present => label.green().to_string(),
            PresenceVerdict::Absent => label.red().to_string(),
            PresenceVerdict::Inconclusive { .. } => label.yellow().to_string(),
        }
    } else {
        label.to_owned()
    };
    format!("{slug}: {label}{detail}")
}

/// A line removed from a file, diff style.
pub fn removed_line(line: &str, color: bool) -> String {
    let line = format!("- {line}");
    if color { line.red().to_string() } else { line }
}
