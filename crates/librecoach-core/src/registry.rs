// ── Storage-file device registry ──
//
// Edits the host's JSON storage file directly. Only `data.devices` is
// touched; every other key (versions, deleted devices, per-device fields
// this crate does not know about) is written back as it was read.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;
use crate::host::{DeviceRegistry, RegisteredDevice};

/// [`DeviceRegistry`] over a `core.device_registry` storage file.
///
/// Changes made while the host is running may be overwritten by the host's
/// own next save; the daemon runs this against a stopped or standalone host.
#[derive(Debug, Clone)]
pub struct StorageDeviceRegistry {
    path: PathBuf,
}

impl StorageDeviceRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn registry_error(path: &Path, message: impl std::fmt::Display) -> CoreError {
    CoreError::RegistryCleanup {
        message: format!("{}: {message}", path.display()),
    }
}

/// Read the storage document, `None` if the file does not exist.
fn read_document(path: &Path) -> Result<Option<Value>, CoreError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CoreError::io(path, e)),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| registry_error(path, e))
}

fn devices_mut<'a>(path: &Path, doc: &'a mut Value) -> Result<&'a mut Vec<Value>, CoreError> {
    doc.pointer_mut("/data/devices")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| registry_error(path, "missing data.devices array"))
}

fn parse_device(entry: &Value) -> Option<RegisteredDevice> {
    let id = entry.get("id")?.as_str()?.to_owned();
    let name = entry
        .get("name_by_user")
        .and_then(Value::as_str)
        .or_else(|| entry.get("name").and_then(Value::as_str))
        .map(str::to_owned);
    let identifiers = entry
        .get("identifiers")
        .and_then(Value::as_array)
        .map(|pairs| {
            pairs
                .iter()
                .filter_map(|pair| match pair.as_array()?.as_slice() {
                    [ns, value] => Some((ns.as_str()?.to_owned(), value.as_str()?.to_owned())),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Some(RegisteredDevice {
        id,
        name,
        identifiers,
    })
}

fn load_devices(path: &Path) -> Result<Vec<RegisteredDevice>, CoreError> {
    let Some(mut doc) = read_document(path)? else {
        debug!(path = %path.display(), "device registry file not present");
        return Ok(Vec::new());
    };
    Ok(devices_mut(path, &mut doc)?
        .iter()
        .filter_map(parse_device)
        .collect())
}

fn remove_from_file(path: &Path, id: &str) -> Result<(), CoreError> {
    let Some(mut doc) = read_document(path)? else {
        return Ok(());
    };

    let devices = devices_mut(path, &mut doc)?;
    let before = devices.len();
    devices.retain(|d| d.get("id").and_then(Value::as_str) != Some(id));
    if devices.len() == before {
        debug!(device_id = id, "device already gone from registry");
        return Ok(());
    }

    let text = serde_json::to_string_pretty(&doc).map_err(|e| registry_error(path, e))?;
    let tmp = path.with_extension("librecoach-tmp");
    std::fs::write(&tmp, text).map_err(|e| CoreError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| CoreError::io(path, e))?;
    debug!(device_id = id, "removed device from registry");
    Ok(())
}

#[async_trait]
impl DeviceRegistry for StorageDeviceRegistry {
    async fn devices(&self) -> Result<Vec<RegisteredDevice>, CoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || load_devices(&path))
            .await
            .map_err(|e| CoreError::join(&e))?
    }

    async fn remove_device(&self, id: &str) -> Result<(), CoreError> {
        let path = self.path.clone();
        let id = id.to_owned();
        tokio::task::spawn_blocking(move || remove_from_file(&path, &id))
            .await
            .map_err(|e| CoreError::join(&e))?
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn registry_doc() -> Value {
        json!({
            "version": 1,
            "minor_version": 8,
            "key": "core.device_registry",
            "data": {
                "devices": [
                    {
                        "id": "aa11",
                        "name": "MaxxFan",
                        "identifiers": [["librecoach_ble", "C4:4F:33:01:02:03"]],
                        "manufacturer": "Airxcel"
                    },
                    {
                        "id": "bb22",
                        "name": "Hue bridge",
                        "name_by_user": "Living room",
                        "identifiers": [["hue", "0017880a"]]
                    },
                    { "id": "cc33", "identifiers": [["librecoach_ble", "thermostat"], ["mqtt", "x"]] }
                ],
                "deleted_devices": [{ "id": "zz99" }]
            }
        })
    }

    fn write_registry(dir: &tempfile::TempDir) -> StorageDeviceRegistry {
        let path = dir.path().join("core.device_registry");
        std::fs::write(&path, registry_doc().to_string()).expect("write");
        StorageDeviceRegistry::new(path)
    }

    #[tokio::test]
    async fn lists_devices_with_identifiers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = write_registry(&dir);

        let devices = registry.devices().await.expect("devices");

        assert_eq!(devices.len(), 3);
        assert!(devices[0].belongs_to("librecoach_ble"));
        assert_eq!(devices[1].name.as_deref(), Some("Living room"));
        assert!(!devices[1].belongs_to("librecoach_ble"));
        assert!(devices[2].belongs_to("mqtt"));
        assert_eq!(devices[2].name, None);
    }

    #[tokio::test]
    async fn removing_keeps_unrelated_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = write_registry(&dir);

        registry.remove_device("aa11").await.expect("removed");
        registry.remove_device("aa11").await.expect("idempotent");

        let doc: Value =
            serde_json::from_str(&std::fs::read_to_string(registry.path()).expect("read"))
                .expect("json");
        let mut expected = registry_doc();
        expected["data"]["devices"]
            .as_array_mut()
            .expect("array")
            .remove(0);
        assert_eq!(doc, expected);
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_registry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = StorageDeviceRegistry::new(dir.path().join("nope"));

        assert!(registry.devices().await.expect("devices").is_empty());
        registry.remove_device("aa11").await.expect("nothing to do");
    }

    #[tokio::test]
    async fn malformed_file_is_a_cleanup_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("core.device_registry");
        std::fs::write(&path, r#"{"data": {}}"#).expect("write");

        let err = StorageDeviceRegistry::new(path)
            .devices()
            .await
            .expect_err("no devices array");

        assert_eq!(err.kind(), "RegistryCleanupFailure");
    }
}
