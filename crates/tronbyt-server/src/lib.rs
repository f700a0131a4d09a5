//! Tronbyt Server - Axum-based HTTP API
//!
//! Route declarations and handlers for the pairing and account surface.
//! All interesting logic lives in `tronbyt-pairing` and `tronbyt-auth`;
//! this crate wires requests to those managers and maps errors to status
//! codes.

pub mod extract;
pub mod http;
pub mod rate_limit;
pub mod state;

pub use extract::AuthedUser;
pub use http::create_router;
pub use rate_limit::client_key;
pub use state::AppState;
