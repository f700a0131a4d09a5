//! User profiles

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use tronbyt_store::{Filter, RecordStore};

pub(crate) const PROFILES_TABLE: &str = "user_profiles";

/// Columns a user may change through the profile passthrough. `id` and
/// `is_admin` are server-managed; profile writes go through the
/// service-role store client, so this filter is the guard.
const PROFILE_PATCH_FIELDS: &[&str] = &["username", "theme_preference"];

/// Keep only user-patchable profile fields; `None` when nothing remains
pub fn sanitize_profile_patch(updates: &Value) -> Option<Value> {
    let map = updates.as_object()?;
    let filtered: serde_json::Map<String, Value> = map
        .iter()
        .filter(|(k, _)| PROFILE_PATCH_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if filtered.is_empty() {
        return None;
    }
    Some(Value::Object(filtered))
}

fn default_theme() -> String {
    "system".to_string()
}

/// An authenticated user, as assembled from the `user_profiles` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default = "default_theme")]
    pub theme_preference: String,
}

/// Profile passthrough operations
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn RecordStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Fetch a profile by user id; failures are logged and become `None`
    pub async fn get_profile(&self, user_id: &str) -> Option<AuthUser> {
        let result = self
            .store
            .find(PROFILES_TABLE, &[Filter::eq("id", user_id)])
            .await;

        match result {
            Ok(rows) => rows
                .into_iter()
                .next()
                .and_then(|row| match serde_json::from_value(row) {
                    Ok(user) => Some(user),
                    Err(e) => {
                        error!("malformed user profile row: {e}");
                        None
                    }
                }),
            Err(e) => {
                error!("failed to get user profile: {e}");
                None
            }
        }
    }

    /// Patch profile fields; protected columns are dropped before the
    /// write. Returns whether the update took.
    pub async fn update_profile(&self, user_id: &str, updates: Value) -> bool {
        let Some(patch) = sanitize_profile_patch(&updates) else {
            return false;
        };

        let result = self
            .store
            .conditional_update(PROFILES_TABLE, &[Filter::eq("id", user_id)], patch)
            .await;

        match result {
            Ok(affected) => affected > 0,
            Err(e) => {
                error!("failed to update user profile: {e}");
                false
            }
        }
    }
}
