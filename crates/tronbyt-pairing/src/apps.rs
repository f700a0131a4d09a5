//! App installations
//!
//! Dashboard-managed records describing which apps render on a device,
//! keyed by `(device_id, iname)`. Rows are opaque JSON passthrough; every
//! operation is scoped to the owning user, and `save` overwrites the
//! scoping columns so a request body cannot re-home an installation.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::error;

use tronbyt_store::{Filter, RecordStore};

const INSTALLATIONS_TABLE: &str = "app_installations";

/// CRUD over the `app_installations` table
///
/// Callers are responsible for verifying device ownership before `save`;
/// the other operations are self-scoping through their filters.
#[derive(Clone)]
pub struct InstallationManager {
    store: Arc<dyn RecordStore>,
}

impl InstallationManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// All installations on a device, oldest first; failures yield an
    /// empty list
    pub async fn list(&self, user_id: &str, device_id: &str) -> Vec<Value> {
        let result = self
            .store
            .find(
                INSTALLATIONS_TABLE,
                &[
                    Filter::eq("device_id", device_id),
                    Filter::eq("user_id", user_id),
                ],
            )
            .await;

        match result {
            Ok(mut rows) => {
                rows.sort_by(|a, b| {
                    let a = a.get("created_at").and_then(Value::as_str).unwrap_or("");
                    let b = b.get("created_at").and_then(Value::as_str).unwrap_or("");
                    a.cmp(b)
                });
                rows
            }
            Err(e) => {
                error!("failed to list app installations: {e}");
                Vec::new()
            }
        }
    }

    /// Fetch one installation by name
    pub async fn get(&self, user_id: &str, device_id: &str, iname: &str) -> Option<Value> {
        let result = self
            .store
            .find(
                INSTALLATIONS_TABLE,
                &[
                    Filter::eq("device_id", device_id),
                    Filter::eq("user_id", user_id),
                    Filter::eq("iname", iname),
                ],
            )
            .await;

        match result {
            Ok(rows) => rows.into_iter().next(),
            Err(e) => {
                error!("failed to get app installation: {e}");
                None
            }
        }
    }

    /// Create or replace an installation
    ///
    /// `user_id`, `device_id`, and `iname` in the body are overwritten
    /// with the scoped values before the upsert.
    pub async fn save(&self, user_id: &str, device_id: &str, iname: &str, data: Value) -> bool {
        let mut record = match data {
            Value::Object(map) => map,
            _ => {
                error!("app installation body must be a JSON object");
                return false;
            }
        };
        record.insert("user_id".to_string(), json!(user_id));
        record.insert("device_id".to_string(), json!(device_id));
        record.insert("iname".to_string(), json!(iname));

        let result = self
            .store
            .upsert(
                INSTALLATIONS_TABLE,
                Value::Object(record),
                Some("device_id,iname"),
            )
            .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                error!("failed to save app installation: {e}");
                false
            }
        }
    }

    /// Delete an installation; returns whether a row went away
    pub async fn delete(&self, user_id: &str, device_id: &str, iname: &str) -> bool {
        let result = self
            .store
            .delete(
                INSTALLATIONS_TABLE,
                &[
                    Filter::eq("device_id", device_id),
                    Filter::eq("user_id", user_id),
                    Filter::eq("iname", iname),
                ],
            )
            .await;

        match result {
            Ok(removed) => removed > 0,
            Err(e) => {
                error!("failed to delete app installation: {e}");
                false
            }
        }
    }
}
