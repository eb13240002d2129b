// ── Self-cleanup ──
//
// Runs once, after the presence monitor has confirmed on every attempt
// that the companion add-on is gone. Each step is independent: a failed
// notification does not keep the declaration in place, and a failed edit
// does not keep the marker file around.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use librecoach_api::PersistentNotification;
use tracing::{debug, error, info, warn};

use crate::config::CleanupSettings;
use crate::error::CoreError;
use crate::host::{Notifier, Teardown};
use crate::store::ConfigStore;

const NOTIFICATION_TITLE: &str = "LibreCoach BLE: Automated Cleanup";

/// Individually logged cleanup sub-steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CleanupStep {
    Notify,
    StaticConfig,
    MarkerFile,
}

/// Result of editing the static configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationEdit {
    /// The declaration was found and `lines` lines were removed.
    Removed { lines: usize },
    /// Nothing to remove (or no static config file at all).
    NotPresent,
    Failed,
}

/// What a cleanup run managed to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupSummary {
    pub notified: bool,
    pub declaration: DeclarationEdit,
    /// `true` if the marker file existed and was deleted.
    pub marker_removed: bool,
    /// Steps that failed, in execution order.
    pub failures: Vec<CleanupStep>,
}

impl CleanupSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupReport {
    Performed(CleanupSummary),
    /// A previous call already ran the cleanup in this process.
    AlreadyPerformed,
}

/// The destructive action taken when the companion add-on is gone.
#[async_trait]
pub trait Cleanup: Send + Sync {
    async fn perform(&self, slug: &str) -> CleanupReport;
}

// ── Static configuration edit ────────────────────────────────────

/// Static configuration text with one declaration taken out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedConfig {
    pub content: String,
    /// Removed lines, in file order.
    pub removed: Vec<String>,
}

impl StrippedConfig {
    pub fn changed(&self) -> bool {
        !self.removed.is_empty()
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// A block sequence entry (`- item`), which YAML allows at its parent key's
/// own indentation.
fn is_sequence_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed == "-" || trimmed.starts_with("- ")
}

/// Remove every `key:` declaration and the block nested beneath it.
///
/// A declaration is any line whose trimmed text starts with `key:`. Lines
/// indented deeper than it belong to its block, as do sequence entries at
/// its own indentation. Blank lines inside the block go with it only when
/// more nested content follows; trailing blanks stay. The content's line
/// ending (`\n` or `\r\n`) is kept.
pub fn strip_declaration(content: &str, key: &str) -> StrippedConfig {
    let marker = format!("{key}:");
    let eol = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let mut kept: Vec<&str> = Vec::new();
    let mut removed: Vec<String> = Vec::new();
    // Indentation of the declaration whose block we are inside.
    let mut block: Option<usize> = None;
    let mut pending_blank: Vec<&str> = Vec::new();

    for line in content.lines() {
        if let Some(indent) = block {
            if line.trim().is_empty() {
                pending_blank.push(line);
                continue;
            }
            let depth = indent_of(line);
            if depth > indent || (depth == indent && is_sequence_item(line)) {
                removed.extend(pending_blank.drain(..).map(str::to_owned));
                removed.push(line.to_owned());
                continue;
            }
            block = None;
            kept.append(&mut pending_blank);
        }

        if line.trim_start().starts_with(&marker) {
            block = Some(indent_of(line));
            removed.push(line.to_owned());
        } else {
            kept.push(line);
        }
    }
    kept.append(&mut pending_blank);

    let mut stripped = kept.join(eol);
    if content.ends_with('\n') && !stripped.is_empty() {
        stripped.push_str(eol);
    }

    StrippedConfig {
        content: stripped,
        removed,
    }
}

/// Strip `key` from the file at `path`, rewriting it only if it changed.
///
/// Blocking; run it on the blocking pool.
pub fn strip_declaration_file(path: &Path, key: &str) -> Result<DeclarationEdit, CoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(DeclarationEdit::NotPresent);
        }
        Err(e) => return Err(CoreError::io(path, e)),
    };

    let stripped = strip_declaration(&content, key);
    if !stripped.changed() {
        return Ok(DeclarationEdit::NotPresent);
    }

    std::fs::write(path, &stripped.content).map_err(|e| CoreError::io(path, e))?;
    Ok(DeclarationEdit::Removed {
        lines: stripped.removed.len(),
    })
}

// ── SelfCleanup ──────────────────────────────────────────────────

/// Tears the integration down and removes its traces from the host.
///
/// Single-shot: only the first [`perform`](Cleanup::perform) in a process
/// does anything.
pub struct SelfCleanup {
    settings: CleanupSettings,
    notifier: Arc<dyn Notifier>,
    teardown: Arc<dyn Teardown>,
    store: ConfigStore,
    performed: AtomicBool,
}

impl SelfCleanup {
    pub fn new(
        settings: CleanupSettings,
        notifier: Arc<dyn Notifier>,
        teardown: Arc<dyn Teardown>,
        store: ConfigStore,
    ) -> Self {
        Self {
            settings,
            notifier,
            teardown,
            store,
            performed: AtomicBool::new(false),
        }
    }

    fn notification(&self, slug: &str) -> PersistentNotification {
        PersistentNotification {
            title: NOTIFICATION_TITLE.into(),
            message: format!(
                "The LibreCoach add-on ({slug}) was uninstalled. The accompanying Bluetooth \
                 integration has automatically removed its entry from {}. The integration will \
                 be completely gone following the next Home Assistant restart.",
                file_name(&self.settings.static_config_path)
            ),
            notification_id: self.settings.notification_id.clone(),
        }
    }

    async fn strip_static_config(&self) -> Result<DeclarationEdit, CoreError> {
        let path = self.settings.static_config_path.clone();
        let key = self.settings.integration_key.clone();
        tokio::task::spawn_blocking(move || strip_declaration_file(&path, &key))
            .await
            .map_err(|e| CoreError::join(&e))?
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

fn step_failed(step: CleanupStep, source: &CoreError) -> CoreError {
    CoreError::CleanupStep {
        step,
        message: source.to_string(),
    }
}

#[async_trait]
impl Cleanup for SelfCleanup {
    async fn perform(&self, slug: &str) -> CleanupReport {
        if self.performed.swap(true, Ordering::SeqCst) {
            debug!(slug, "cleanup already performed, skipping");
            return CleanupReport::AlreadyPerformed;
        }

        error!(
            slug,
            "automated cleanup: removing LibreCoach BLE configuration, add-on is no longer installed"
        );

        self.teardown.teardown().await;

        let mut failures = Vec::new();

        let notified = match self.notifier.notify(&self.notification(slug)).await {
            Ok(()) => true,
            Err(e) => {
                let e = step_failed(CleanupStep::Notify, &e);
                error!(kind = e.kind(), slug, error = %e, "cleanup notification failed");
                failures.push(CleanupStep::Notify);
                false
            }
        };

        let declaration = match self.strip_static_config().await {
            Ok(edit) => {
                match edit {
                    DeclarationEdit::Removed { lines } => info!(
                        key = %self.settings.integration_key,
                        lines,
                        path = %self.settings.static_config_path.display(),
                        "removed declaration from static config"
                    ),
                    _ => debug!(
                        key = %self.settings.integration_key,
                        "no declaration in static config"
                    ),
                }
                edit
            }
            Err(e) => {
                let e = step_failed(CleanupStep::StaticConfig, &e);
                error!(
                    kind = e.kind(),
                    path = %self.settings.static_config_path.display(),
                    error = %e,
                    "failed to edit static config"
                );
                failures.push(CleanupStep::StaticConfig);
                DeclarationEdit::Failed
            }
        };

        let marker_removed = match self.store.remove().await {
            Ok(removed) => {
                if removed {
                    info!(path = %self.store.path().display(), "deleted marker config file");
                }
                removed
            }
            Err(e) => {
                let e = step_failed(CleanupStep::MarkerFile, &e);
                error!(
                    kind = e.kind(),
                    path = %self.store.path().display(),
                    error = %e,
                    "failed to delete marker config file"
                );
                failures.push(CleanupStep::MarkerFile);
                false
            }
        };

        if !failures.is_empty() {
            warn!(slug, failed = failures.len(), "cleanup finished with failures");
        }

        CleanupReport::Performed(CleanupSummary {
            notified,
            declaration,
            marker_removed,
            failures,
        })
    }
}
