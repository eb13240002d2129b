use thiserror::Error;

/// Top-level error type for the `librecoach-api` crate.
///
/// Covers every failure mode of a Supervisor round-trip: authentication,
/// transport, non-success statuses, and payload decoding.
/// `librecoach-core` maps these into presence-check failures.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The bearer token was rejected (HTTP 401/403).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The token could not be encoded as a header value.
    #[error("Invalid header value: {message}")]
    InvalidHeader { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The base URL cannot carry path segments (e.g. `mailto:`).
    #[error("Base URL cannot be used for API paths: {url}")]
    InvalidBaseUrl { url: String },

    // ── Supervisor API ──────────────────────────────────────────────
    /// Non-success status or a `{"result": "error"}` envelope.
    #[error("Supervisor API error (HTTP {status}): {message}")]
    Supervisor { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Supervisor { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the Supervisor reported the resource as unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Supervisor { status: 400 | 404, .. })
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Supervisor { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// First 200 characters of a response body, for error messages.
pub(crate) fn body_preview(body: &str) -> String {
    body.chars().take(200).collect()
}
