// ── Core error types ──
//
// Every failure in this crate is caught where it happens and logged; the
// enum exists so each kind carries an explicit disposition instead of being
// swallowed as a generic fault. Only `ConfigUnavailable`, `ResourceStart`
// and `Retired` ever reach a caller of the controller.

use std::path::PathBuf;

use thiserror::Error;

use crate::cleanup::CleanupStep;

/// What the subsystem does after a failure of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Disposition {
    /// Continue with the empty or last-known-good configuration.
    FallBack,
    /// Stay stopped; the next toggle delivery tries again.
    RetryOnNextSignal,
    /// Logged and ignored; the surrounding operation proceeds.
    Absorbed,
    /// The presence attempt neither confirms nor refutes absence.
    Inconclusive,
    /// The monitor stops without acting.
    TerminalNonAction,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Config file not found at {}", path.display())]
    ConfigMissing { path: PathBuf },

    #[error("Config file {} is not a valid JSON object: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("Cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No bridge configuration available (looked in {})", path.display())]
    ConfigUnavailable { path: PathBuf },

    // ── Managed resource ─────────────────────────────────────────────
    #[error("Bridge failed to start: {message}")]
    ResourceStart { message: String },

    #[error("Bridge failed to stop cleanly: {message}")]
    ResourceStop { message: String },

    // ── Host collaborators ───────────────────────────────────────────
    #[error("Device registry cleanup failed: {message}")]
    RegistryCleanup { message: String },

    #[error("Subscription to {topic} failed: {message}")]
    Subscription { topic: String, message: String },

    #[error("Notification failed: {message}")]
    Notification { message: String },

    // ── Presence checks ──────────────────────────────────────────────
    #[error("Presence check transport error: {message}")]
    PresenceCheckTransport {
        message: String,
        status: Option<u16>,
    },

    #[error(
        "Could not confirm status of {slug}: {inconclusive} of {attempts} attempts were inconclusive"
    )]
    PresenceCheckAmbiguous {
        slug: String,
        inconclusive: u32,
        attempts: u32,
    },

    #[error("Cleanup step '{step}' failed: {message}")]
    CleanupStep { step: CleanupStep, message: String },

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("Bridge was retired by automated cleanup and will not start again")]
    Retired,

    #[error("Controller task is no longer running")]
    ControllerUnavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Policy for this failure kind.
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::ConfigMissing { .. } | Self::ConfigParse { .. } | Self::Io { .. } => {
                Disposition::FallBack
            }
            Self::ConfigUnavailable { .. } | Self::ResourceStart { .. } => {
                Disposition::RetryOnNextSignal
            }
            Self::PresenceCheckTransport { .. } => Disposition::Inconclusive,
            Self::PresenceCheckAmbiguous { .. } | Self::Retired => Disposition::TerminalNonAction,
            Self::ResourceStop { .. }
            | Self::RegistryCleanup { .. }
            | Self::Subscription { .. }
            | Self::Notification { .. }
            | Self::CleanupStep { .. }
            | Self::ControllerUnavailable
            | Self::Internal(_) => Disposition::Absorbed,
        }
    }

    /// Short stable name used as the `kind` field in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigMissing { .. } => "ConfigMissing",
            Self::ConfigParse { .. } => "ConfigParseError",
            Self::Io { .. } => "Io",
            Self::ConfigUnavailable { .. } => "ConfigUnavailable",
            Self::ResourceStart { .. } => "ResourceStartFailure",
            Self::ResourceStop { .. } => "ResourceStopFailure",
            Self::RegistryCleanup { .. } => "RegistryCleanupFailure",
            Self::Subscription { .. } => "SubscriptionFailure",
            Self::Notification { .. } => "NotificationFailure",
            Self::PresenceCheckTransport { .. } => "PresenceCheckTransportError",
            Self::PresenceCheckAmbiguous { .. } => "PresenceCheckAmbiguous",
            Self::CleanupStep { .. } => "CleanupSubstepFailure",
            Self::Retired => "Retired",
            Self::ControllerUnavailable => "ControllerUnavailable",
            Self::Internal(_) => "Internal",
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn join(err: &tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<librecoach_api::Error> for CoreError {
    fn from(err: librecoach_api::Error) -> Self {
        Self::PresenceCheckTransport {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_start_path_failures_retry_on_next_signal() {
        let unavailable = CoreError::ConfigUnavailable {
            path: PathBuf::from("/x"),
        };
        assert_eq!(unavailable.disposition(), Disposition::RetryOnNextSignal);

        let stop = CoreError::ResourceStop {
            message: "boom".into(),
        };
        assert_eq!(stop.disposition(), Disposition::Absorbed);
        assert_eq!(stop.kind(), "ResourceStopFailure");
    }

    #[test]
    fn api_errors_become_inconclusive_transport_errors() {
        let err = CoreError::from(librecoach_api::Error::Supervisor {
            status: 503,
            message: "busy".into(),
        });
        assert!(matches!(
            err,
            CoreError::PresenceCheckTransport {
                status: Some(503),
                ..
            }
        ));
        assert_eq!(err.disposition(), Disposition::Inconclusive);
    }
}
