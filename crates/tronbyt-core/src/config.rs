//! Configuration types for the Tronbyt backend

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default pairing-token validity window in minutes
pub const DEFAULT_TOKEN_VALIDITY_MINUTES: i64 = 30;

/// Main configuration for the Tronbyt backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// HTTP listen port
    pub port: u16,
    /// Base URL of the managed record-store/auth service
    pub store_url: String,
    /// Publishable key used for user-scoped requests
    pub store_anon_key: String,
    /// Service-role key used for admin operations (bypasses row security)
    pub store_service_key: String,
    /// Pairing-token validity window in minutes
    pub token_validity_minutes: i64,
    /// Sustained rate limit, requests per minute per client
    pub rate_limit_requests: u32,
    /// Rate limit burst allowance
    pub rate_limit_burst: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8000,
            store_url: String::new(),
            store_anon_key: String::new(),
            store_service_key: String::new(),
            token_validity_minutes: DEFAULT_TOKEN_VALIDITY_MINUTES,
            rate_limit_requests: 60,
            rate_limit_burst: 10,
        }
    }
}

impl Settings {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set listen port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder pattern: set the record-store base URL
    pub fn with_store_url(mut self, url: impl Into<String>) -> Self {
        self.store_url = url.into();
        self
    }

    /// Builder pattern: set the publishable key
    pub fn with_anon_key(mut self, key: impl Into<String>) -> Self {
        self.store_anon_key = key.into();
        self
    }

    /// Builder pattern: set the service-role key
    pub fn with_service_key(mut self, key: impl Into<String>) -> Self {
        self.store_service_key = key.into();
        self
    }

    /// Builder pattern: set the pairing-token validity window
    pub fn with_token_validity_minutes(mut self, minutes: i64) -> Self {
        self.token_validity_minutes = minutes;
        self
    }

    /// Builder pattern: set rate limit parameters
    pub fn with_rate_limit(mut self, requests: u32, burst: u32) -> Self {
        self.rate_limit_requests = requests;
        self.rate_limit_burst = burst;
        self
    }

    /// Check that the settings are usable for multi-tenant mode
    pub fn validate(&self) -> Result<()> {
        if self.store_url.is_empty() {
            return Err(Error::Config(
                "store URL is not set; provide STORE_URL".to_string(),
            ));
        }
        if self.store_service_key.is_empty() {
            return Err(Error::Config(
                "service-role key is not set; provide STORE_SERVICE_KEY".to_string(),
            ));
        }
        if self.token_validity_minutes <= 0 {
            return Err(Error::Config(
                "token validity must be a positive number of minutes".to_string(),
            ));
        }
        Ok(())
    }
}
