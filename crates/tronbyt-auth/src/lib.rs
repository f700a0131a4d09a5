//! Tronbyt Auth - Multi-tenant authentication glue
//!
//! Everything here is passthrough to the managed auth/database service:
//! profile reads and updates, API-token CRUD with masked previews, and a
//! `SessionVerifier` seam behind which the external JWT validation lives.

pub mod api_key;
pub mod session;
pub mod user;

pub use api_key::{generate_api_key, key_fingerprint, mask_token, ApiToken, ApiTokenManager, ApiTokenSummary};
pub use session::{RestSessionVerifier, SessionVerifier};
pub use user::{sanitize_profile_patch, AuthUser, UserDirectory};
