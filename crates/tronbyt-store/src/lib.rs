//! Tronbyt Store - Record store contract and clients
//!
//! The pairing core is stateless compute over a shared keyed record store.
//! This crate defines the store contract (`RecordStore`) and ships two
//! implementations:
//!
//! - [`MemoryStore`] - in-process tables behind a single lock, used as the
//!   substitutable fake in tests and for local single-tenant development.
//! - [`RestStore`] - a PostgREST-compatible HTTP client for the managed
//!   Postgres service used in multi-tenant deployments.
//!
//! The one non-negotiable guarantee implementations must provide is an
//! atomic `conditional_update`: "update where claimed_by is null" is the
//! commit point of the claim flow and must never let two writers through.

pub mod memory;
pub mod rest;
pub mod store;

pub use memory::MemoryStore;
pub use rest::RestStore;
pub use store::{Filter, RecordStore, StoreError, StoreResult};
