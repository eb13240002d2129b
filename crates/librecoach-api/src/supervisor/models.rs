// Wire types for the Supervisor API.
//
// Responses are wrapped as `{"result": "ok" | "error", "message": ..., "data": ...}`.
// Only the fields the bridge reads are typed; everything else is kept in
// `extra` so debug output stays faithful to what the Supervisor sent.

use serde::{Deserialize, Serialize};

/// The `{ result, message, data }` envelope around every Supervisor reply.
#[derive(Debug, Deserialize)]
pub struct SupervisorResponse<T> {
    pub result: String,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

/// Body of `GET /addons/{slug}/info`.
///
/// The endpoint answers for store entries that are not installed as well;
/// those come back with a `null` (or empty) `version`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddonInfo {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AddonInfo {
    /// `true` when the add-on is actually installed (non-empty version).
    pub fn is_installed(&self) -> bool {
        self.version.as_deref().is_some_and(|v| !v.trim().is_empty())
    }
}

/// Body of `GET /addons`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddonList {
    #[serde(default)]
    pub addons: Vec<AddonSummary>,
}

impl AddonList {
    /// `true` if an entry with exactly this slug is listed.
    pub fn contains(&self, slug: &str) -> bool {
        self.addons.iter().any(|a| a.slug.as_deref() == Some(slug))
    }
}

/// One entry of the installed add-on listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddonSummary {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Payload of the `persistent_notification.create` service call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistentNotification {
    pub title: String,
    pub message: String,
    /// Stable identifier; re-using it replaces the previous notification.
    pub notification_id: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn store_entry_without_version_is_not_installed() {
        let info: AddonInfo =
            serde_json::from_value(json!({ "slug": "x", "version": null })).expect("valid");
        assert!(!info.is_installed());

        let info: AddonInfo = serde_json::from_value(json!({ "version": "" })).expect("valid");
        assert!(!info.is_installed());

        let info: AddonInfo =
            serde_json::from_value(json!({ "version": "1.4.0", "arch": ["aarch64"] }))
                .expect("valid");
        assert!(info.is_installed());
        assert!(info.extra.contains_key("arch"));
    }

    #[test]
    fn listing_matches_exact_slug_only() {
        let list: AddonList = serde_json::from_value(json!({
            "addons": [{ "slug": "abc_librecoach" }, { "name": "no slug" }]
        }))
        .expect("valid");
        assert!(list.contains("abc_librecoach"));
        assert!(!list.contains("librecoach"));
    }
}
