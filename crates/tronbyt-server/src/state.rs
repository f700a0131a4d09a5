//! Shared application state

use std::sync::Arc;

use tronbyt_auth::{ApiTokenManager, SessionVerifier, UserDirectory};
use tronbyt_core::Settings;
use tronbyt_pairing::{InstallationManager, PairingManager};
use tronbyt_store::RecordStore;

/// State shared by every request handler
///
/// Built once in the composition root; the store client and session
/// verifier are injected so tests can substitute in-memory fakes.
pub struct AppState {
    /// Application settings
    pub settings: Settings,
    /// Pairing token issuer and claim processor
    pub pairing: PairingManager,
    /// App-installation passthrough
    pub installs: InstallationManager,
    /// Profile passthrough
    pub users: UserDirectory,
    /// API token CRUD and key resolution
    pub api_tokens: ApiTokenManager,
    /// External JWT/session validation
    pub sessions: Arc<dyn SessionVerifier>,
}

impl AppState {
    /// Create application state over an injected store and verifier
    pub fn new(
        settings: Settings,
        store: Arc<dyn RecordStore>,
        sessions: Arc<dyn SessionVerifier>,
    ) -> Self {
        Self {
            pairing: PairingManager::with_validity_minutes(
                store.clone(),
                settings.token_validity_minutes,
            ),
            installs: InstallationManager::new(store.clone()),
            users: UserDirectory::new(store.clone()),
            api_tokens: ApiTokenManager::new(store),
            settings,
            sessions,
        }
    }
}
