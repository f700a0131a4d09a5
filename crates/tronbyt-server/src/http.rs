//! HTTP request handlers
//!
//! Pairing, account, and API-token endpoints. Business-rule rejections in
//! the claim flow come back as 400s carrying the `ClaimResult` body;
//! infrastructure failures map to 502.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::debug;
use uuid::Uuid;

use tronbyt_auth::{sanitize_profile_patch, ApiTokenSummary, AuthUser};
use tronbyt_core::Error;
use tronbyt_pairing::{sanitize_device_patch, ClaimResult, Device, PendingDevice};

use crate::extract::AuthedUser;
use crate::rate_limit::client_key;
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Liveness and server info
        .route("/api/health", get(health_handler))
        .route("/api/info", get(server_info_handler))
        // Pairing API
        .route("/api/pair/token", post(issue_token_handler))
        .route("/api/pair/claim", post(claim_device_handler))
        .route("/api/pair/pending", get(pending_devices_handler))
        // Account API
        .route("/api/me", get(me_handler))
        .route("/api/profile", patch(update_profile_handler))
        // Device API
        .route("/api/devices", get(list_devices_handler))
        .route(
            "/api/devices/:id",
            get(get_device_handler)
                .patch(update_device_handler)
                .delete(delete_device_handler),
        )
        // App installations
        .route("/api/devices/:id/apps", get(list_apps_handler))
        .route(
            "/api/devices/:id/apps/:iname",
            get(get_app_handler)
                .put(save_app_handler)
                .delete(delete_app_handler),
        )
        // API keys
        .route("/api/keys", post(create_key_handler).get(list_keys_handler))
        .route("/api/keys/:id", delete(delete_key_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Map an error to the HTTP status it should surface as
fn error_status(error: &Error) -> StatusCode {
    match error {
        Error::InvalidDeviceId => StatusCode::BAD_REQUEST,
        Error::StoreUnavailable(_) => StatusCode::BAD_GATEWAY,
        Error::Unauthorized => StatusCode::UNAUTHORIZED,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Pairing API Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct IssueTokenRequest {
    /// 8-hex-character device identifier
    pub device_id: String,
}

#[derive(Debug, Serialize)]
pub struct IssueTokenResponse {
    pub device_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issue a pairing token for a device
///
/// Called by the firmware during setup; deliberately unauthenticated, so
/// the upstream rate limiter keys on the client address.
async fn issue_token_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<IssueTokenRequest>,
) -> Result<(StatusCode, Json<IssueTokenResponse>), (StatusCode, String)> {
    debug!(
        client = %client_key(&headers, peer.map(|ConnectInfo(addr)| addr)),
        "pairing token requested"
    );

    let token = state
        .pairing
        .issue_token(&request.device_id)
        .await
        .map_err(|e| (error_status(&e), e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(IssueTokenResponse {
            device_id: token.device_id,
            token: token.token,
            expires_at: token.expires_at,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ClaimDeviceRequest {
    pub pairing_token: String,
}

/// Claim a device with a pairing token, binding it to the caller
async fn claim_device_handler(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
    Json(request): Json<ClaimDeviceRequest>,
) -> (StatusCode, Json<ClaimResult>) {
    let result = state
        .pairing
        .claim_device(&user.id, &request.pairing_token)
        .await;

    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(result))
}

/// Devices waiting to be claimed
async fn pending_devices_handler(
    State(state): State<Arc<AppState>>,
    AuthedUser(_user): AuthedUser,
) -> Json<Vec<PendingDevice>> {
    Json(state.pairing.pending_devices().await)
}

// ============================================================================
// Account Handlers
// ============================================================================

/// The authenticated caller's profile
async fn me_handler(AuthedUser(user): AuthedUser) -> Json<AuthUser> {
    Json(user)
}

/// Patch profile fields (passthrough)
///
/// Only whitelisted columns pass through; a body with nothing patchable
/// is a client error, not a silent no-op.
async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
    Json(updates): Json<Value>,
) -> Result<StatusCode, (StatusCode, String)> {
    let Some(patch) = sanitize_profile_patch(&updates) else {
        return Err((
            StatusCode::BAD_REQUEST,
            "No updatable profile fields".to_string(),
        ));
    };

    if state.users.update_profile(&user.id, patch).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::BAD_GATEWAY,
            "Failed to update profile".to_string(),
        ))
    }
}

/// The caller's devices
async fn list_devices_handler(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
) -> Result<Json<Vec<Device>>, (StatusCode, String)> {
    state
        .pairing
        .devices_for_user(&user.id)
        .await
        .map(Json)
        .map_err(|e| (error_status(&e), e.to_string()))
}

fn device_not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Device not found".to_string())
}

/// One of the caller's devices
async fn get_device_handler(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<String>,
) -> Result<Json<Device>, (StatusCode, String)> {
    state
        .pairing
        .get_device(&user.id, &id)
        .await
        .map(Json)
        .ok_or_else(device_not_found)
}

/// Patch a device (name, device API key)
async fn update_device_handler(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<String>,
    Json(updates): Json<Value>,
) -> Result<StatusCode, (StatusCode, String)> {
    if sanitize_device_patch(&updates).is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            "No updatable device fields".to_string(),
        ));
    }

    if state.pairing.update_device(&user.id, &id, updates).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(device_not_found())
    }
}

/// Remove a device from the caller's account
async fn delete_device_handler(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.pairing.delete_device(&user.id, &id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(device_not_found())
    }
}

// ============================================================================
// App Installation Handlers
// ============================================================================

/// Installations on one of the caller's devices
async fn list_apps_handler(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<Value>>, (StatusCode, String)> {
    if !state.pairing.owns_device(&user.id, &id).await {
        return Err(device_not_found());
    }
    Ok(Json(state.installs.list(&user.id, &id).await))
}

/// One installation by name
async fn get_app_handler(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
    Path((id, iname)): Path<(String, String)>,
) -> Result<Json<Value>, (StatusCode, String)> {
    state
        .installs
        .get(&user.id, &id, &iname)
        .await
        .map(Json)
        .ok_or((
            StatusCode::NOT_FOUND,
            "App installation not found".to_string(),
        ))
}

/// Create or replace an installation
///
/// The upsert cannot be owner-scoped by filter, so ownership of the
/// device is checked first.
async fn save_app_handler(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
    Path((id, iname)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<StatusCode, (StatusCode, String)> {
    if !body.is_object() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Installation body must be a JSON object".to_string(),
        ));
    }
    if !state.pairing.owns_device(&user.id, &id).await {
        return Err(device_not_found());
    }

    if state.installs.save(&user.id, &id, &iname, body).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::BAD_GATEWAY,
            "Failed to save app installation".to_string(),
        ))
    }
}

/// Delete an installation
async fn delete_app_handler(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
    Path((id, iname)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.installs.delete(&user.id, &id, &iname).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            "App installation not found".to_string(),
        ))
    }
}

// ============================================================================
// API Key Handlers
// ============================================================================

fn default_key_name() -> String {
    "Default".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    #[serde(default = "default_key_name")]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateKeyResponse {
    pub id: Uuid,
    /// The raw key; shown only in this response
    pub token: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Create an API key for the caller
async fn create_key_handler(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
    Json(request): Json<CreateKeyRequest>,
) -> Result<(StatusCode, Json<CreateKeyResponse>), (StatusCode, String)> {
    let token = state
        .api_tokens
        .create_token(&user.id, &request.name)
        .await
        .map_err(|e| (error_status(&e), e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(CreateKeyResponse {
            id: token.id,
            token: token.token,
            name: token.name,
            created_at: token.created_at,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct ApiKeysResponse {
    pub api_keys: Vec<ApiTokenSummary>,
}

/// List the caller's API keys, values masked
async fn list_keys_handler(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
) -> Json<ApiKeysResponse> {
    Json(ApiKeysResponse {
        api_keys: state.api_tokens.list_tokens(&user.id).await,
    })
}

/// Delete one of the caller's API keys
async fn delete_key_handler(
    State(state): State<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
    Path(id): Path<Uuid>,
) -> StatusCode {
    if state.api_tokens.delete_token(&user.id, id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// ============================================================================
// Server Info
// ============================================================================

/// Server information response
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub version: String,
    pub token_validity_minutes: i64,
    pub rate_limit_requests: u32,
    pub rate_limit_burst: u32,
}

async fn server_info_handler(State(state): State<Arc<AppState>>) -> Json<ServerInfo> {
    Json(ServerInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        token_validity_minutes: state.settings.token_validity_minutes,
        rate_limit_requests: state.settings.rate_limit_requests,
        rate_limit_burst: state.settings.rate_limit_burst,
    })
}

async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use tronbyt_auth::SessionVerifier;
    use tronbyt_core::Settings;
    use tronbyt_store::{MemoryStore, RecordStore};

    /// Verifier that accepts exactly one session token
    struct OneUserVerifier;

    #[async_trait]
    impl SessionVerifier for OneUserVerifier {
        async fn verify(&self, access_token: &str) -> Option<AuthUser> {
            (access_token == "session-u1").then(|| AuthUser {
                id: "u1".to_string(),
                email: "alice@example.com".to_string(),
                username: "alice".to_string(),
                is_admin: false,
                theme_preference: "system".to_string(),
            })
        }
    }

    fn test_app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState::new(
            Settings::new(),
            store.clone() as Arc<dyn RecordStore>,
            Arc::new(OneUserVerifier),
        ));
        (create_router(state), store)
    }

    fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = auth {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = auth {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app();
        let response = app.oneshot(get_request("/api/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_issue_token_rejects_bad_device_id() {
        let (app, _) = test_app();
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/pair/token",
                None,
                json!({"device_id": "not-hex!"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_issue_and_claim_flow() {
        let (app, _) = test_app();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/pair/token",
                None,
                json!({"device_id": "A1B2C3D4"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let issued = body_json(response).await;
        assert_eq!(issued["device_id"], "a1b2c3d4");
        let token = issued["token"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/pair/claim",
                Some("session-u1"),
                json!({"pairing_token": token}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let claimed = body_json(response).await;
        assert_eq!(claimed["success"], true);
        assert_eq!(claimed["device_id"], "a1b2c3d4");

        // The token is single-use.
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/pair/claim",
                Some("session-u1"),
                json!({"pairing_token": token}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let rejected = body_json(response).await;
        assert_eq!(rejected["success"], false);
        assert_eq!(rejected["message"], "Invalid or expired pairing token");
    }

    #[tokio::test]
    async fn test_claim_requires_auth() {
        let (app, _) = test_app();
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/pair/claim",
                None,
                json!({"pairing_token": "whatever"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let (app, _) = test_app();
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/pair/claim",
                Some("stale-session"),
                json!({"pairing_token": "whatever"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_pending_devices() {
        let (app, _) = test_app();

        let response = app
            .clone()
            .oneshot(get_request("/api/pair/pending", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/pair/token",
                None,
                json!({"device_id": "a1b2c3d4"}),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(get_request("/api/pair/pending", Some("session-u1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let pending = body_json(response).await;
        assert_eq!(pending.as_array().unwrap().len(), 1);
        assert_eq!(pending[0]["device_id"], "a1b2c3d4");
    }

    async fn claim_device(app: &Router, device_id: &str, session: &str) {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/pair/token",
                None,
                json!({"device_id": device_id}),
            ))
            .await
            .unwrap();
        let issued = body_json(response).await;
        let token = issued["token"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/pair/claim",
                Some(session),
                json!({"pairing_token": token}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_profile_update_cannot_escalate_privileges() {
        let (app, store) = test_app();
        store
            .upsert(
                "user_profiles",
                json!({"id": "u1", "username": "alice", "is_admin": false}),
                None,
            )
            .await
            .unwrap();

        // A body carrying only server-managed fields is a client error.
        let response = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                "/api/profile",
                Some("session-u1"),
                json!({"is_admin": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Mixed bodies go through, minus the protected fields.
        let response = app
            .oneshot(json_request(
                "PATCH",
                "/api/profile",
                Some("session-u1"),
                json!({"theme_preference": "dark", "is_admin": true, "id": "u9"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let rows = store
            .find("user_profiles", &[tronbyt_store::Filter::eq("id", "u1")])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["theme_preference"], "dark");
        assert_eq!(rows[0]["is_admin"], false);
    }

    #[tokio::test]
    async fn test_device_get_update_delete() {
        let (app, _) = test_app();
        claim_device(&app, "a1b2c3d4", "session-u1").await;

        let response = app
            .clone()
            .oneshot(get_request("/api/devices/a1b2c3d4", Some("session-u1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let device = body_json(response).await;
        assert_eq!(device["name"], "Tronbyt-a1b2");

        let response = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                "/api/devices/a1b2c3d4",
                Some("session-u1"),
                json!({"name": "Kitchen"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // Ownership cannot be rewritten through the device patch.
        let response = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                "/api/devices/a1b2c3d4",
                Some("session-u1"),
                json!({"user_id": "u2"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(get_request("/api/devices/a1b2c3d4", Some("session-u1")))
            .await
            .unwrap();
        let device = body_json(response).await;
        assert_eq!(device["name"], "Kitchen");
        assert_eq!(device["user_id"], "u1");

        let request = Request::builder()
            .method("DELETE")
            .uri("/api/devices/a1b2c3d4")
            .header("authorization", "Bearer session-u1")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(get_request("/api/devices/a1b2c3d4", Some("session-u1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_app_installation_lifecycle() {
        let (app, _) = test_app();
        claim_device(&app, "a1b2c3d4", "session-u1").await;

        // Saving onto an unclaimed device id is a 404.
        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/devices/ffffffff/apps/clock",
                Some("session-u1"),
                json!({"app_id": "clock"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/devices/a1b2c3d4/apps/clock",
                Some("session-u1"),
                json!({"app_id": "clock", "config": {"tz": "UTC"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(get_request(
                "/api/devices/a1b2c3d4/apps",
                Some("session-u1"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed = body_json(response).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["iname"], "clock");
        assert_eq!(listed[0]["user_id"], "u1");

        let response = app
            .clone()
            .oneshot(get_request(
                "/api/devices/a1b2c3d4/apps/clock",
                Some("session-u1"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let install = body_json(response).await;
        assert_eq!(install["config"]["tz"], "UTC");

        let request = Request::builder()
            .method("DELETE")
            .uri("/api/devices/a1b2c3d4/apps/clock")
            .header("authorization", "Bearer session-u1")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(get_request(
                "/api/devices/a1b2c3d4/apps/clock",
                Some("session-u1"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_api_key_lifecycle_and_fallback_auth() {
        let (app, store) = test_app();
        // Profile row backs API-token authentication.
        store
            .upsert(
                "user_profiles",
                json!({"id": "u1", "username": "alice"}),
                None,
            )
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/keys",
                Some("session-u1"),
                json!({"name": "CLI"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let raw_key = created["token"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(get_request("/api/keys", Some("session-u1")))
            .await
            .unwrap();
        let listed = body_json(response).await;
        let preview = listed["api_keys"][0]["token_preview"].as_str().unwrap();
        assert!(preview.ends_with("..."));
        assert_ne!(preview, raw_key);

        // The raw key authenticates where the session verifier fails.
        let response = app
            .oneshot(get_request("/api/me", Some(&raw_key)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let me = body_json(response).await;
        assert_eq!(me["username"], "alice");
    }

    #[tokio::test]
    async fn test_delete_key() {
        let (app, _) = test_app();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/keys",
                Some("session-u1"),
                json!({}),
            ))
            .await
            .unwrap();
        let created = body_json(response).await;
        assert_eq!(created["name"], "Default");
        let id = created["id"].as_str().unwrap().to_string();

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/keys/{id}"))
            .header("authorization", "Bearer session-u1")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/keys/{id}"))
            .header("authorization", "Bearer session-u1")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_server_info() {
        let (app, _) = test_app();
        let response = app.oneshot(get_request("/api/info", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let info = body_json(response).await;
        assert_eq!(info["token_validity_minutes"], 30);
    }
}
