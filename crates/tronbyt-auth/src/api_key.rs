//! API tokens
//!
//! Long-lived credentials for non-session API calls. Raw token values are
//! returned exactly once, at creation; listings carry a masked preview and
//! logs only ever see a short hash fingerprint.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{error, warn};
use uuid::Uuid;

use tronbyt_core::Result;
use tronbyt_store::{Filter, RecordStore};

use crate::user::{AuthUser, PROFILES_TABLE};

const API_TOKENS_TABLE: &str = "api_tokens";
const DEVICES_TABLE: &str = "devices";

/// Length of a generated API key
const API_KEY_LENGTH: usize = 32;

/// Generate a random 32-character alphanumeric API key
pub fn generate_api_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_LENGTH)
        .map(char::from)
        .collect()
}

/// Mask a token for display: first 8 characters plus an ellipsis
pub fn mask_token(token: &str) -> String {
    match token.get(..8) {
        Some(prefix) => format!("{prefix}..."),
        None => String::new(),
    }
}

/// Short, non-reversible fingerprint of a key, safe to put in logs
pub fn key_fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)[..8].to_string()
}

/// An API token row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: Uuid,
    pub user_id: String,
    pub token: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// An API token as listed to its owner, with the value masked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTokenSummary {
    pub id: Uuid,
    pub name: String,
    pub token_preview: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<&ApiToken> for ApiTokenSummary {
    fn from(token: &ApiToken) -> Self {
        Self {
            id: token.id,
            name: token.name.clone(),
            token_preview: mask_token(&token.token),
            created_at: token.created_at,
            last_used_at: token.last_used_at,
        }
    }
}

/// API token CRUD and key-based user resolution
#[derive(Clone)]
pub struct ApiTokenManager {
    store: Arc<dyn RecordStore>,
}

impl ApiTokenManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Create a new token for a user; the raw value is only available in
    /// the returned record.
    pub async fn create_token(&self, user_id: &str, name: &str) -> Result<ApiToken> {
        let record = ApiToken {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            token: generate_api_key(),
            name: name.to_string(),
            created_at: Utc::now(),
            last_used_at: None,
            expires_at: None,
        };

        self.store
            .upsert(API_TOKENS_TABLE, serde_json::to_value(&record)?, None)
            .await?;
        Ok(record)
    }

    /// List a user's tokens, newest first, values masked
    pub async fn list_tokens(&self, user_id: &str) -> Vec<ApiTokenSummary> {
        let result = self
            .store
            .find(API_TOKENS_TABLE, &[Filter::eq("user_id", user_id)])
            .await;

        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                error!("failed to list API tokens: {e}");
                return Vec::new();
            }
        };

        let mut tokens: Vec<ApiToken> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(token) => Some(token),
                Err(e) => {
                    warn!("skipping malformed API token row: {e}");
                    None
                }
            })
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tokens.iter().map(ApiTokenSummary::from).collect()
    }

    /// Delete a token, scoped to its owner; returns whether a row went away
    pub async fn delete_token(&self, user_id: &str, token_id: Uuid) -> bool {
        let result = self
            .store
            .delete(
                API_TOKENS_TABLE,
                &[
                    Filter::eq("id", token_id.to_string()),
                    Filter::eq("user_id", user_id),
                ],
            )
            .await;

        match result {
            Ok(removed) => removed > 0,
            Err(e) => {
                error!("failed to delete API token: {e}");
                false
            }
        }
    }

    /// Resolve a user from an API key.
    ///
    /// Tries user API tokens first (touching `last_used_at`), then falls
    /// back to a device-scoped key when a device id is supplied. Any
    /// failure resolves to `None`; only a fingerprint of the key reaches
    /// the logs.
    pub async fn user_by_api_key(
        &self,
        api_key: &str,
        device_id: Option<&str>,
    ) -> Option<(AuthUser, Option<Value>)> {
        match self.try_user_token(api_key, device_id).await {
            Ok(Some(found)) => return Some(found),
            Ok(None) => {}
            Err(e) => {
                error!(key = %key_fingerprint(api_key), "API key lookup failed: {e}");
                return None;
            }
        }

        if let Some(device_id) = device_id {
            match self.try_device_key(api_key, device_id).await {
                Ok(found) => return found,
                Err(e) => {
                    error!(key = %key_fingerprint(api_key), "device key lookup failed: {e}");
                }
            }
        }
        None
    }

    async fn try_user_token(
        &self,
        api_key: &str,
        device_id: Option<&str>,
    ) -> Result<Option<(AuthUser, Option<Value>)>> {
        let rows = self
            .store
            .find(API_TOKENS_TABLE, &[Filter::eq("token", api_key)])
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let Some(user_id) = row.get("user_id").and_then(Value::as_str) else {
            return Ok(None);
        };
        let user_id = user_id.to_string();

        self.store
            .conditional_update(
                API_TOKENS_TABLE,
                &[Filter::eq("token", api_key)],
                serde_json::json!({"last_used_at": Utc::now()}),
            )
            .await?;

        let profiles = self
            .store
            .find(PROFILES_TABLE, &[Filter::eq("id", user_id.as_str())])
            .await?;
        let Some(profile) = profiles.into_iter().next() else {
            return Ok(None);
        };
        let user: AuthUser = serde_json::from_value(profile)?;

        let device = match device_id {
            Some(device_id) => self
                .store
                .find(
                    DEVICES_TABLE,
                    &[
                        Filter::eq("id", device_id),
                        Filter::eq("user_id", user_id.as_str()),
                    ],
                )
                .await?
                .into_iter()
                .next(),
            None => None,
        };

        Ok(Some((user, device)))
    }

    async fn try_device_key(
        &self,
        api_key: &str,
        device_id: &str,
    ) -> Result<Option<(AuthUser, Option<Value>)>> {
        let devices = self
            .store
            .find(
                DEVICES_TABLE,
                &[Filter::eq("id", device_id), Filter::eq("api_key", api_key)],
            )
            .await?;
        let Some(device) = devices.into_iter().next() else {
            return Ok(None);
        };
        let Some(owner_id) = device.get("user_id").and_then(Value::as_str) else {
            return Ok(None);
        };

        let profiles = self
            .store
            .find(PROFILES_TABLE, &[Filter::eq("id", owner_id)])
            .await?;
        let Some(profile) = profiles.into_iter().next() else {
            return Ok(None);
        };
        let user: AuthUser = serde_json::from_value(profile)?;

        Ok(Some((user, Some(device))))
    }
}
