//! Pairing token records and generation

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// A pairing token as stored in the `device_pairing_tokens` table
///
/// Created unclaimed by the issuer and mutated exactly once, when a user
/// redeems it. Never touched after that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingToken {
    /// The device this token was issued for
    pub device_id: String,
    /// The secret itself; sole lookup key for claiming
    pub token: String,
    /// Issue time
    pub created_at: DateTime<Utc>,
    /// End of the validity window
    pub expires_at: DateTime<Utc>,
    /// User who redeemed the token, null while pending
    #[serde(default)]
    pub claimed_by: Option<String>,
    /// Set exactly when `claimed_by` transitions from null
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
}

/// A device waiting to be claimed, as surfaced to the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingDevice {
    pub device_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Generate a pairing token: 32 random bytes, URL-safe base64
///
/// 256 bits of entropy makes the token unguessable within its 30-minute
/// window even under aggressive online probing.
pub fn generate_pairing_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
