//! Metadata snapshot builder.
//!
//! The native runtime retains only the last metadata blob pushed into it, so
//! the snapshot must always be current when a crash occurs. Snapshots are
//! replaced wholesale on every user-info or session-property mutation, never
//! patched. Total serialized size must stay below [`METADATA_MAX_BYTES`];
//! the orchestrator rebuilds the snapshot without session properties when
//! the full variant would exceed the ceiling.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Byte ceiling for a serialized metadata snapshot.
pub const METADATA_MAX_BYTES: usize = 2048;

/// Static information about the integrating application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    /// Application version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    /// Application package identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    /// Version of this SDK.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_version: Option<String>,
}

/// Static information about the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device manufacturer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    /// Device model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Operating system version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    /// Platform API level.
    #[serde(default)]
    pub api_level: i32,
    /// CPU architecture name (keys the packaged symbol table).
    #[serde(default)]
    pub architecture: String,
    /// Whether the device runs a 32-bit userspace.
    #[serde(default)]
    pub is_32bit: bool,
}

/// Information about the current user, set by the integrating application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Opaque user identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// User email, if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// User display name, if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// The serialized blob pushed into the native runtime for inclusion in any
/// future crash report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    /// Application info at snapshot time.
    pub app_info: AppInfo,
    /// Device info at snapshot time.
    pub device_info: DeviceInfo,
    /// User info at snapshot time.
    pub user_info: UserInfo,
    /// Session properties, omitted when the full snapshot would exceed the
    /// size ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_properties: Option<BTreeMap<String, String>>,
}

/// Holds the mutable inputs to metadata snapshots.
///
/// App and device info are fixed for the process lifetime; user info and
/// session properties are replaced under their locks on mutation.
#[derive(Debug)]
pub struct MetadataStore {
    app_info: AppInfo,
    device_info: DeviceInfo,
    user_info: RwLock<UserInfo>,
    session_properties: RwLock<BTreeMap<String, String>>,
}

impl MetadataStore {
    /// Create a store with the process-constant app and device info.
    #[must_use]
    pub fn new(app_info: AppInfo, device_info: DeviceInfo) -> Self {
        Self {
            app_info,
            device_info,
            user_info: RwLock::new(UserInfo::default()),
            session_properties: RwLock::new(BTreeMap::new()),
        }
    }

    /// Device info captured at construction.
    #[must_use]
    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// Replace the current user info wholesale.
    pub fn set_user_info(&self, user_info: UserInfo) {
        if let Ok(mut guard) = self.user_info.write() {
            *guard = user_info;
        }
    }

    /// Set a single session property.
    pub fn set_session_property(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut guard) = self.session_properties.write() {
            guard.insert(key.into(), value.into());
        }
    }

    /// Remove a session property. Removing an absent key is a no-op.
    pub fn remove_session_property(&self, key: &str) {
        if let Ok(mut guard) = self.session_properties.write() {
            guard.remove(key);
        }
    }

    /// Assemble a snapshot of the current state.
    #[must_use]
    pub fn build(&self, include_session_properties: bool) -> MetadataSnapshot {
        let user_info = self
            .user_info
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default();
        let session_properties = if include_session_properties {
            Some(
                self.session_properties
                    .read()
                    .map(|guard| guard.clone())
                    .unwrap_or_default(),
            )
        } else {
            None
        };
        MetadataSnapshot {
            app_info: self.app_info.clone(),
            device_info: self.device_info.clone(),
            user_info,
            session_properties,
        }
    }

    /// Serialize a snapshot of the current state.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn serialize(&self, include_session_properties: bool) -> Result<String> {
        Ok(serde_json::to_string(&self.build(include_session_properties))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MetadataStore {
        MetadataStore::new(
            AppInfo {
                app_version: Some("2.4.1".to_string()),
                package_name: Some("com.example.app".to_string()),
                sdk_version: Some("0.1.0".to_string()),
            },
            DeviceInfo {
                manufacturer: Some("Acme".to_string()),
                model: Some("Phone 12".to_string()),
                os_version: Some("14".to_string()),
                api_level: 34,
                architecture: "arm64-v8a".to_string(),
                is_32bit: false,
            },
        )
    }

    #[test]
    fn test_build_includes_session_properties() {
        let store = store();
        store.set_session_property("k", "v");

        let snapshot = store.build(true);
        let props = snapshot.session_properties.unwrap();
        assert_eq!(props.get("k"), Some(&"v".to_string()));
    }

    #[test]
    fn test_build_excludes_session_properties() {
        let store = store();
        store.set_session_property("k", "v");

        let snapshot = store.build(false);
        assert!(snapshot.session_properties.is_none());
    }

    #[test]
    fn test_user_info_replaced_wholesale() {
        let store = store();
        store.set_user_info(UserInfo {
            user_id: Some("u-1".to_string()),
            email: Some("a@b.c".to_string()),
            username: None,
        });
        store.set_user_info(UserInfo {
            user_id: Some("u-2".to_string()),
            email: None,
            username: None,
        });

        let snapshot = store.build(true);
        assert_eq!(snapshot.user_info.user_id, Some("u-2".to_string()));
        // Previous email must not leak through a partial update.
        assert!(snapshot.user_info.email.is_none());
    }

    #[test]
    fn test_remove_session_property() {
        let store = store();
        store.set_session_property("k", "v");
        store.remove_session_property("k");
        store.remove_session_property("absent");

        let props = store.build(true).session_properties.unwrap();
        assert!(props.is_empty());
    }

    #[test]
    fn test_serialize_reduced_variant_is_smaller() {
        let store = store();
        store.set_session_property("key", "x".repeat(4096));

        let full = store.serialize(true).unwrap();
        let reduced = store.serialize(false).unwrap();
        assert!(full.len() >= METADATA_MAX_BYTES);
        assert!(reduced.len() < METADATA_MAX_BYTES);
        assert!(!reduced.contains("session_properties"));
    }

    #[test]
    fn test_snapshot_serialization_round_trip() {
        let store = store();
        store.set_session_property("k", "v");
        let snapshot = store.build(true);

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: MetadataSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, back);
    }

    #[test]
    fn test_default_snapshot_is_compact() {
        let snapshot = MetadataSnapshot::default();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.len() < METADATA_MAX_BYTES);
    }
}
