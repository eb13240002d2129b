use secrecy::SecretString;

/// Environment variable holding the Supervisor bearer token.
pub const TOKEN_ENV: &str = "SUPERVISOR_TOKEN";

/// Environment variable holding the Supervisor address.
pub const ADDRESS_ENV: &str = "SUPERVISOR";

/// Address used when the host does not export one.
pub const DEFAULT_ADDRESS: &str = "http://supervisor";

/// Credentials for the Supervisor control plane.
///
/// Only hosts that run a Supervisor export a token, so the absence of
/// credentials is itself meaningful: there is no add-on subsystem to ask.
#[derive(Debug, Clone)]
pub struct SupervisorCredentials {
    /// Base URL, always carrying an explicit scheme.
    pub base_url: String,
    /// Bearer token.
    pub token: SecretString,
}

impl SupervisorCredentials {
    /// Read credentials from the process environment.
    ///
    /// Returns `None` when `SUPERVISOR_TOKEN` is unset or empty.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let token = lookup(TOKEN_ENV).filter(|t| !t.trim().is_empty())?;
        let address = lookup(ADDRESS_ENV)
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_owned());
        Some(Self {
            base_url: normalize_address(&address),
            token: SecretString::from(token),
        })
    }
}

/// Prefix a bare host (`supervisor`, `172.30.32.2`) with `http://`.
pub fn normalize_address(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_owned()
    } else {
        format!("http://{raw}")
    }
}
