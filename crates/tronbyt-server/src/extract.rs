//! Request authentication
//!
//! Dashboard requests carry a session access token (Authorization header
//! or cookie); API requests may instead carry a long-lived API token. The
//! `AuthedUser` extractor accepts both, in that order.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};

use tronbyt_auth::AuthUser;

use crate::state::AppState;

/// Name of the session cookie set by the dashboard after login
pub const SESSION_COOKIE: &str = "tronbyt-access-token";

/// Extractor rejecting unauthenticated requests with 401
pub struct AuthedUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthedUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(state, &parts.headers)
            .await
            .map(Self)
            .ok_or((StatusCode::UNAUTHORIZED, "Not authenticated".to_string()))
    }
}

/// Resolve the caller: session token first, API token as fallback
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Option<AuthUser> {
    let token = bearer_token(headers).or_else(|| cookie_token(headers))?;

    if let Some(user) = state.sessions.verify(&token).await {
        return Some(user);
    }
    state
        .api_tokens
        .user_by_api_key(&token, None)
        .await
        .map(|(user, _)| user)
}

/// Extract a bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Extract the session token from the cookie header
fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}
