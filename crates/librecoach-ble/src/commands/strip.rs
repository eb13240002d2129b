//! `strip`: the static-config step of self-cleanup, on demand.

use librecoach_config::Settings;
use librecoach_core::{CoreError, DeclarationEdit, strip_declaration, strip_declaration_file};

use crate::cli::StripArgs;
use crate::error::{CliError, exit_code};
use crate::output;

pub async fn handle(args: &StripArgs, settings: &Settings, color: bool) -> Result<i32, CliError> {
    let path = args
        .file
        .clone()
        .unwrap_or_else(|| settings.paths.static_config.clone());
    let key = settings.domain.clone();

    if args.dry_run {
        let content = tokio::fs::read_to_string(&path).await?;
        let stripped = strip_declaration(&content, &key);
        if stripped.changed() {
            println!("{}", path.display());
            for line in &stripped.removed {
                println!("{}", output::removed_line(line, color));
            }
        } else {
            println!("{}: no '{key}:' declaration", path.display());
        }
        return Ok(exit_code::SUCCESS);
    }

    let edit = {
        let path = path.clone();
        tokio::task::spawn_blocking(move || strip_declaration_file(&path, &key))
            .await
            .map_err(|e| CoreError::Internal(e.to_string()))??
    };
    match edit {
        DeclarationEdit::Removed { lines } => {
            println!("{}: removed {lines} line(s)", path.display());
        }
        DeclarationEdit::NotPresent | DeclarationEdit::Failed => {
            println!("{}: nothing to remove", path.display());
        }
    }
    Ok(exit_code::SUCCESS)
}
