//! Device identity
//!
//! Tronbyt devices identify themselves with an 8-hex-character id burned
//! into the firmware. Both cases are accepted on the wire; the stored
//! canonical form is lowercase.

use serde::{Deserialize, Serialize};
use tronbyt_core::{Error, Result};

/// Check a raw device id: exactly 8 characters, all hex digits
pub fn is_valid_device_id(s: &str) -> bool {
    s.len() == 8 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Validated, lowercase-canonical device identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Parse and canonicalize a raw device id
    pub fn parse(s: &str) -> Result<Self> {
        if !is_valid_device_id(s) {
            return Err(Error::InvalidDeviceId);
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// The canonical id string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Default display name derived from the id prefix
    /// (`a1b2c3d4` becomes `Tronbyt-a1b2`)
    pub fn default_name(&self) -> String {
        format!("Tronbyt-{}", &self.0[..4])
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Columns a user may change on their device. Identity (`id`) and
/// ownership (`user_id`) never change through the update path; writes go
/// through the service-role store client, so this filter is the guard.
const DEVICE_PATCH_FIELDS: &[&str] = &["name", "api_key"];

/// Keep only user-patchable device fields; `None` when nothing remains
pub fn sanitize_device_patch(updates: &serde_json::Value) -> Option<serde_json::Value> {
    let map = updates.as_object()?;
    let filtered: serde_json::Map<String, serde_json::Value> = map
        .iter()
        .filter(|(k, _)| DEVICE_PATCH_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if filtered.is_empty() {
        return None;
    }
    Some(serde_json::Value::Object(filtered))
}

/// A device record as stored in the `devices` table
///
/// `user_id` is absent until the device is claimed for the first time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// 8-hex-character device identifier
    pub id: String,
    /// Owning user, once claimed
    #[serde(default)]
    pub user_id: Option<String>,
    /// Human-readable label
    pub name: String,
    /// Optional device-scoped API credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}
