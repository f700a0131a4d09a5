//! Tronbyt Core - Shared settings and error types
//!
//! Every other crate in the workspace builds on the `Error` enum and the
//! `Settings` struct defined here.

pub mod config;
pub mod error;

pub use config::Settings;
pub use error::{Error, Result};
