//! Pairing token issuance and claim resolution
//!
//! The claim flow is an ordered sequence of checks; the first failing
//! check wins and nothing is mutated before all checks pass. Consuming
//! the token is a conditional update on `claimed_by IS NULL`, which is
//! the single atomic commit point: under concurrent claims of one token
//! exactly one caller gets through.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use tronbyt_core::config::DEFAULT_TOKEN_VALIDITY_MINUTES;
use tronbyt_core::Result;
use tronbyt_store::{Filter, RecordStore};

use crate::device::{sanitize_device_patch, Device, DeviceId};
use crate::token::{generate_pairing_token, PairingToken, PendingDevice};

const TOKENS_TABLE: &str = "device_pairing_tokens";
const DEVICES_TABLE: &str = "devices";

/// An already-claimed token must look identical to a nonexistent one, so
/// a guesser cannot probe claim state.
const MSG_INVALID_TOKEN: &str = "Invalid or expired pairing token";
const MSG_EXPIRED: &str = "Pairing token has expired";
const MSG_ALREADY_OWNED: &str = "Device is already claimed by another user";
const MSG_SUCCESS: &str = "Device claimed successfully";

/// Result of a device claim operation
///
/// Business-rule rejections are ordinary values with `success = false`;
/// callers must not treat them as infrastructure failures.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClaimResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub message: String,
}

impl ClaimResult {
    fn claimed(device_id: String) -> Self {
        Self {
            success: true,
            device_id: Some(device_id),
            message: MSG_SUCCESS.to_string(),
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            device_id: None,
            message: message.into(),
        }
    }
}

/// Issues pairing tokens and resolves device claims
///
/// Stateless compute over an injected record store; clone freely.
#[derive(Clone)]
pub struct PairingManager {
    store: Arc<dyn RecordStore>,
    validity: Duration,
}

impl PairingManager {
    /// Create a manager with the default 30-minute validity window
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_validity_minutes(store, DEFAULT_TOKEN_VALIDITY_MINUTES)
    }

    /// Create a manager with a custom validity window
    pub fn with_validity_minutes(store: Arc<dyn RecordStore>, minutes: i64) -> Self {
        Self {
            store,
            validity: Duration::minutes(minutes),
        }
    }

    /// Issue a fresh single-use pairing token for a device.
    ///
    /// Called by the firmware during setup. Any outstanding token for the
    /// same device is invalidated first, so at most one token per device
    /// is ever claimable. Store failures after that delete are fatal to
    /// the request; the caller must not retry silently.
    pub async fn issue_token(&self, device_id: &str) -> Result<PairingToken> {
        let device_id = DeviceId::parse(device_id)?;

        self.store
            .delete(
                TOKENS_TABLE,
                &[Filter::eq("device_id", device_id.as_str())],
            )
            .await?;

        let now = Utc::now();
        let record = PairingToken {
            device_id: device_id.to_string(),
            token: generate_pairing_token(),
            created_at: now,
            expires_at: now + self.validity,
            claimed_by: None,
            claimed_at: None,
        };

        self.store
            .upsert(
                TOKENS_TABLE,
                serde_json::to_value(&record)?,
                Some("device_id"),
            )
            .await?;

        info!(device_id = %device_id, "generated pairing token");
        Ok(record)
    }

    /// Claim a device with a pairing token, binding it to `user_id`.
    ///
    /// Rejections come back as `ClaimResult` values; store failures are
    /// folded into a generic failure message and logged with context.
    pub async fn claim_device(&self, user_id: &str, pairing_token: &str) -> ClaimResult {
        match self.try_claim(user_id, pairing_token).await {
            Ok(result) => result,
            Err(e) => {
                error!("failed to claim device: {e}");
                ClaimResult::rejected(format!("Failed to claim device: {e}"))
            }
        }
    }

    async fn try_claim(&self, user_id: &str, pairing_token: &str) -> Result<ClaimResult> {
        // An already-claimed token fails this lookup the same way a
        // nonexistent one does.
        let rows = self
            .store
            .find(
                TOKENS_TABLE,
                &[
                    Filter::eq("token", pairing_token),
                    Filter::is_null("claimed_by"),
                ],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(ClaimResult::rejected(MSG_INVALID_TOKEN));
        };
        let record: PairingToken = serde_json::from_value(row)?;

        if Utc::now() > record.expires_at {
            // Expired rows stay in the store; they are inert.
            return Ok(ClaimResult::rejected(MSG_EXPIRED));
        }

        let device_id = DeviceId::parse(&record.device_id)?;

        // Ownership is exclusive and outlives token state: an existing
        // device row whose owner is not the caller is never re-claimable,
        // however valid the token. A row with a null owner counts as
        // someone else's; only rows this flow creates carry an owner, so
        // an ownerless row was put there outside the claim path.
        let devices = self
            .store
            .find(DEVICES_TABLE, &[Filter::eq("id", device_id.as_str())])
            .await?;
        if let Some(device) = devices.first() {
            let owner = device.get("user_id").and_then(Value::as_str);
            if owner != Some(user_id) {
                return Ok(ClaimResult::rejected(MSG_ALREADY_OWNED));
            }
        }

        self.store
            .upsert(
                DEVICES_TABLE,
                json!({
                    "id": device_id.as_str(),
                    "user_id": user_id,
                    "name": device_id.default_name(),
                }),
                Some("id"),
            )
            .await?;

        // Commit point. Zero rows affected means a concurrent claimant got
        // here first; report it exactly like a missing token.
        let affected = self
            .store
            .conditional_update(
                TOKENS_TABLE,
                &[
                    Filter::eq("token", pairing_token),
                    Filter::is_null("claimed_by"),
                ],
                json!({
                    "claimed_by": user_id,
                    "claimed_at": Utc::now(),
                }),
            )
            .await?;
        if affected == 0 {
            return Ok(ClaimResult::rejected(MSG_INVALID_TOKEN));
        }

        info!(device_id = %device_id, user_id, "device claimed");
        Ok(ClaimResult::claimed(device_id.to_string()))
    }

    /// Devices with an unclaimed, unexpired pairing token.
    ///
    /// Best-effort read for the dashboard; store failures yield an empty
    /// list rather than an error.
    pub async fn pending_devices(&self) -> Vec<PendingDevice> {
        let result = self
            .store
            .find(
                TOKENS_TABLE,
                &[
                    Filter::is_null("claimed_by"),
                    Filter::gt("expires_at", json!(Utc::now())),
                ],
            )
            .await;

        match result {
            Ok(rows) => rows
                .into_iter()
                .filter_map(|row| match serde_json::from_value::<PendingDevice>(row) {
                    Ok(pending) => Some(pending),
                    Err(e) => {
                        warn!("skipping malformed pending token row: {e}");
                        None
                    }
                })
                .collect(),
            Err(e) => {
                error!("failed to list pending devices: {e}");
                Vec::new()
            }
        }
    }

    /// All devices owned by a user
    pub async fn devices_for_user(&self, user_id: &str) -> Result<Vec<Device>> {
        let rows = self
            .store
            .find(DEVICES_TABLE, &[Filter::eq("user_id", user_id)])
            .await?;

        let mut devices = Vec::with_capacity(rows.len());
        for row in rows {
            devices.push(serde_json::from_value(row)?);
        }
        Ok(devices)
    }

    /// Fetch one of `user_id`'s devices; failures and foreign devices both
    /// come back as `None`
    pub async fn get_device(&self, user_id: &str, device_id: &str) -> Option<Device> {
        let result = self
            .store
            .find(
                DEVICES_TABLE,
                &[Filter::eq("id", device_id), Filter::eq("user_id", user_id)],
            )
            .await;

        match result {
            Ok(rows) => rows
                .into_iter()
                .next()
                .and_then(|row| match serde_json::from_value(row) {
                    Ok(device) => Some(device),
                    Err(e) => {
                        warn!("malformed device row: {e}");
                        None
                    }
                }),
            Err(e) => {
                error!("failed to get device: {e}");
                None
            }
        }
    }

    /// Patch a device, scoped to its owner; protected columns are dropped
    /// before the write. Returns whether a row was updated.
    pub async fn update_device(&self, user_id: &str, device_id: &str, updates: Value) -> bool {
        let Some(patch) = sanitize_device_patch(&updates) else {
            return false;
        };

        let result = self
            .store
            .conditional_update(
                DEVICES_TABLE,
                &[Filter::eq("id", device_id), Filter::eq("user_id", user_id)],
                patch,
            )
            .await;

        match result {
            Ok(affected) => affected > 0,
            Err(e) => {
                error!("failed to update device: {e}");
                false
            }
        }
    }

    /// Delete a device, scoped to its owner; returns whether a row went away
    pub async fn delete_device(&self, user_id: &str, device_id: &str) -> bool {
        let result = self
            .store
            .delete(
                DEVICES_TABLE,
                &[Filter::eq("id", device_id), Filter::eq("user_id", user_id)],
            )
            .await;

        match result {
            Ok(removed) => removed > 0,
            Err(e) => {
                error!("failed to delete device: {e}");
                false
            }
        }
    }

    /// Check that `user_id` owns `device_id`; failures count as "no"
    pub async fn owns_device(&self, user_id: &str, device_id: &str) -> bool {
        let result = self
            .store
            .find(
                DEVICES_TABLE,
                &[Filter::eq("id", device_id), Filter::eq("user_id", user_id)],
            )
            .await;

        match result {
            Ok(rows) => !rows.is_empty(),
            Err(e) => {
                error!("device ownership check failed: {e}");
                false
            }
        }
    }
}
