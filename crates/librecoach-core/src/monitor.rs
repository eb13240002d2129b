// ── Presence monitor ──
//
// One-shot background check that the companion add-on is still installed.
// Deliberately conservative: self-cleanup is destructive, so it only runs
// when every single attempt positively confirmed absence. Any error along
// the way counts against the budget but can never trigger cleanup.

use std::sync::Arc;

use async_trait::async_trait;
use librecoach_api::SupervisorClient;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cleanup::{Cleanup, CleanupReport};
use crate::config::MonitorSettings;
use crate::error::CoreError;

/// Result of one presence attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceVerdict {
    Present,
    /// Both sources answered and neither lists the add-on.
    Absent,
    /// At least one source failed and none reported presence.
    Inconclusive { reason: String },
}

/// A single presence attempt against the host control plane.
#[async_trait]
pub trait PresenceProbe: Send + Sync {
    async fn probe(&self, slug: &str) -> PresenceVerdict;
}

/// How a monitor run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// No control-plane credentials; nothing was checked.
    Disabled,
    Present { attempt: u32 },
    /// Not every attempt confirmed absence; nothing was touched.
    Ambiguous { confirmed: u32, inconclusive: u32 },
    CleanedUp(CleanupReport),
}

// ── Supervisor-backed probe ──────────────────────────────────────

/// Checks both Supervisor sources concurrently.
#[derive(Debug, Clone)]
pub struct SupervisorProbe {
    client: SupervisorClient,
}

impl SupervisorProbe {
    pub fn new(client: SupervisorClient) -> Self {
        Self { client }
    }

    /// Merge the two lookups: presence anywhere wins, then any error makes
    /// the attempt inconclusive, otherwise the add-on is absent.
    pub fn combine(
        info: Result<bool, librecoach_api::Error>,
        listing: Result<bool, librecoach_api::Error>,
    ) -> PresenceVerdict {
        if matches!(info, Ok(true)) || matches!(listing, Ok(true)) {
            return PresenceVerdict::Present;
        }

        let failures: Vec<String> = [("info", info), ("listing", listing)]
            .into_iter()
            .filter_map(|(source, result)| {
                result.err().map(|e| format!("{source} lookup failed: {e}"))
            })
            .collect();

        if failures.is_empty() {
            PresenceVerdict::Absent
        } else {
            PresenceVerdict::Inconclusive {
                reason: failures.join("; "),
            }
        }
    }
}

#[async_trait]
impl PresenceProbe for SupervisorProbe {
    async fn probe(&self, slug: &str) -> PresenceVerdict {
        let (info, listing) = tokio::join!(self.client.addon_info(slug), self.client.list_addons());

        let info = info.map(|info| info.is_some_and(|info| info.is_installed()));
        let listing = listing.map(|list| list.contains(slug));

        for err in [info.as_ref().err(), listing.as_ref().err()].into_iter().flatten() {
            debug!(
                kind = "PresenceCheckTransportError",
                slug,
                transient = err.is_transient(),
                status = ?err.status(),
                error = %err,
                "presence lookup failed"
            );
        }

        Self::combine(info, listing)
    }
}

// ── PresenceMonitor ──────────────────────────────────────────────

/// Decides, once per process, whether the add-on is gone for good.
pub struct PresenceMonitor {
    slug: String,
    probe: Option<Arc<dyn PresenceProbe>>,
    cleanup: Arc<dyn Cleanup>,
    settings: MonitorSettings,
}

impl PresenceMonitor {
    /// `probe` is `None` when no control-plane credentials are available;
    /// the monitor then only waits out the grace period and gives up.
    pub fn new(
        slug: impl Into<String>,
        probe: Option<Arc<dyn PresenceProbe>>,
        cleanup: Arc<dyn Cleanup>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            slug: slug.into(),
            probe,
            cleanup,
            settings,
        }
    }

    /// Run the monitor on its own task.
    pub fn spawn(self) -> JoinHandle<MonitorOutcome> {
        tokio::spawn(async move { self.run().await })
    }

    pub async fn run(&self) -> MonitorOutcome {
        let slug = self.slug.as_str();
        let max_attempts = self.settings.max_attempts;

        tokio::time::sleep(self.settings.grace_period).await;

        let Some(probe) = self.probe.as_ref() else {
            warn!(slug, "no Supervisor token, cannot verify add-on status");
            return MonitorOutcome::Disabled;
        };

        let mut confirmed = 0;
        let mut inconclusive = 0;

        for attempt in 1..=max_attempts {
            match probe.probe(slug).await {
                PresenceVerdict::Present => {
                    debug!(slug, attempt, "add-on verified present");
                    return MonitorOutcome::Present { attempt };
                }
                PresenceVerdict::Absent => {
                    warn!(slug, attempt, max_attempts, "add-on not found by either source");
                    confirmed += 1;
                }
                PresenceVerdict::Inconclusive { reason } => {
                    let err = CoreError::PresenceCheckTransport {
                        message: reason,
                        status: None,
                    };
                    warn!(
                        kind = err.kind(),
                        slug,
                        attempt,
                        max_attempts,
                        error = %err,
                        "presence check inconclusive"
                    );
                    inconclusive += 1;
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.settings.retry_delay).await;
            }
        }

        if max_attempts > 0 && confirmed == max_attempts {
            info!(slug, attempts = max_attempts, "absence confirmed on every attempt");
            return MonitorOutcome::CleanedUp(self.cleanup.perform(slug).await);
        }

        let err = CoreError::PresenceCheckAmbiguous {
            slug: slug.to_owned(),
            inconclusive,
            attempts: max_attempts,
        };
        warn!(
            kind = err.kind(),
            disposition = %err.disposition(),
            error = %err,
            "assuming add-on present, bridge continues"
        );
        MonitorOutcome::Ambiguous {
            confirmed,
            inconclusive,
        }
    }
}
