//! Session verification seam
//!
//! JWT validation lives in the managed auth service; this module only
//! defines the boundary trait the server depends on, plus the HTTP
//! implementation that asks the service who a bearer token belongs to.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use tronbyt_store::{Filter, RecordStore};

use crate::user::{AuthUser, PROFILES_TABLE};

/// Resolves a session access token to an authenticated user
///
/// Implementations return `None` for anything short of a valid session;
/// the distinction between "expired", "garbage", and "unknown" stays
/// inside the auth service.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, access_token: &str) -> Option<AuthUser>;
}

/// Session verifier backed by the managed auth service's REST endpoint
pub struct RestSessionVerifier {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    store: Arc<dyn RecordStore>,
}

impl RestSessionVerifier {
    /// Create a verifier for the auth service at `base_url`.
    ///
    /// `store` is consulted for the user's profile row after the token
    /// checks out.
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        store: Arc<dyn RecordStore>,
    ) -> tronbyt_core::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| tronbyt_core::Error::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            store,
        })
    }
}

#[async_trait]
impl SessionVerifier for RestSessionVerifier {
    async fn verify(&self, access_token: &str) -> Option<AuthUser> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|e| warn!("auth service unreachable: {e}"))
            .ok()?;

        if !response.status().is_success() {
            return None;
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| warn!("auth service returned malformed user: {e}"))
            .ok()?;
        let id = payload.get("id")?.as_str()?.to_string();
        let email = payload
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let rows = self
            .store
            .find(PROFILES_TABLE, &[Filter::eq("id", id.as_str())])
            .await
            .map_err(|e| warn!("profile lookup failed during auth: {e}"))
            .ok()?;
        let profile = rows.into_iter().next()?;
        let mut user: AuthUser = serde_json::from_value(profile)
            .map_err(|e| warn!("malformed profile row during auth: {e}"))
            .ok()?;

        // The auth service, not the profile table, is authoritative for
        // identity and email.
        user.id = id;
        user.email = email;
        Some(user)
    }
}
