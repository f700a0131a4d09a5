//! In-memory record store
//!
//! Tables live behind a single `RwLock`, so every write (including the
//! read-then-patch of `conditional_update`) holds the lock for its whole
//! duration. That gives this store the per-row serialization the claim
//! flow requires without any extra machinery.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::store::{Filter, RecordStore, StoreError, StoreResult};

/// In-process record store for tests and single-tenant development
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, Vec<Value>>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently in a table (test helper)
    pub async fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map(Vec::len).unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert(
        &self,
        table: &str,
        record: Value,
        conflict_key: Option<&str>,
    ) -> StoreResult<Value> {
        // Composite keys arrive as a comma-separated column list.
        let key_columns: Vec<&str> = conflict_key.unwrap_or("id").split(',').collect();
        let key_values: Option<Vec<Value>> = key_columns
            .iter()
            .map(|column| record.get(column).cloned())
            .collect();

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        if let Some(key_values) = key_values {
            if let Some(existing) = rows.iter_mut().find(|row| {
                key_columns
                    .iter()
                    .zip(&key_values)
                    .all(|(column, value)| row.get(column) == Some(value))
            }) {
                merge_patch(existing, &record);
                return Ok(existing.clone());
            }
        }

        rows.push(record.clone());
        Ok(record)
    }

    async fn find(&self, table: &str, filters: &[Filter]) -> StoreResult<Vec<Value>> {
        let tables = self.tables.read().await;
        let rows = match tables.get(table) {
            Some(rows) => rows,
            None => return Ok(Vec::new()),
        };

        Ok(rows
            .iter()
            .filter(|row| matches_all(row, filters))
            .cloned()
            .collect())
    }

    async fn conditional_update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> StoreResult<u64> {
        let patch_map = patch
            .as_object()
            .ok_or_else(|| StoreError::Rejected("patch must be a JSON object".to_string()))?
            .clone();

        let mut tables = self.tables.write().await;
        let rows = match tables.get_mut(table) {
            Some(rows) => rows,
            None => return Ok(0),
        };

        let mut affected = 0;
        for row in rows.iter_mut() {
            if matches_all(row, filters) {
                if let Some(map) = row.as_object_mut() {
                    for (k, v) in &patch_map {
                        map.insert(k.clone(), v.clone());
                    }
                    affected += 1;
                }
            }
        }
        Ok(affected)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let rows = match tables.get_mut(table) {
            Some(rows) => rows,
            None => return Ok(0),
        };

        let before = rows.len();
        rows.retain(|row| !matches_all(row, filters));
        Ok((before - rows.len()) as u64)
    }
}

/// Overlay the fields of `patch` onto `target`
fn merge_patch(target: &mut Value, patch: &Value) {
    if let (Some(target_map), Some(patch_map)) = (target.as_object_mut(), patch.as_object()) {
        for (k, v) in patch_map {
            target_map.insert(k.clone(), v.clone());
        }
    }
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches(row, f))
}

fn matches(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, value) => row.get(column) == Some(value),
        Filter::IsNull(column) => match row.get(column) {
            None | Some(Value::Null) => true,
            Some(_) => false,
        },
        Filter::Gt(column, value) => match row.get(column) {
            Some(actual) => greater_than(actual, value),
            None => false,
        },
    }
}

/// Compare two JSON scalars, parsing RFC 3339 timestamps when both sides
/// are strings so that range filters over `expires_at` behave like SQL.
fn greater_than(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x > y,
            _ => false,
        },
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(dx), Ok(dy)) => dx > dy,
                _ => x > y,
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_replaces_on_conflict_key() {
        let store = MemoryStore::new();
        store
            .upsert("devices", json!({"id": "a1b2c3d4", "name": "one"}), None)
            .await
            .unwrap();
        store
            .upsert("devices", json!({"id": "a1b2c3d4", "name": "two"}), None)
            .await
            .unwrap();

        let rows = store
            .find("devices", &[Filter::eq("id", "a1b2c3d4")])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "two");
    }

    #[tokio::test]
    async fn test_upsert_preserves_unpatched_fields() {
        let store = MemoryStore::new();
        store
            .upsert(
                "devices",
                json!({"id": "a1b2c3d4", "name": "one", "api_key": "k"}),
                None,
            )
            .await
            .unwrap();
        store
            .upsert("devices", json!({"id": "a1b2c3d4", "name": "two"}), None)
            .await
            .unwrap();

        let rows = store
            .find("devices", &[Filter::eq("id", "a1b2c3d4")])
            .await
            .unwrap();
        assert_eq!(rows[0]["api_key"], "k");
    }

    #[tokio::test]
    async fn test_upsert_composite_conflict_key() {
        let store = MemoryStore::new();
        store
            .upsert(
                "app_installations",
                json!({"device_id": "a1b2c3d4", "iname": "clock", "app_id": "v1"}),
                Some("device_id,iname"),
            )
            .await
            .unwrap();
        // Same composite key replaces; differing second column inserts.
        store
            .upsert(
                "app_installations",
                json!({"device_id": "a1b2c3d4", "iname": "clock", "app_id": "v2"}),
                Some("device_id,iname"),
            )
            .await
            .unwrap();
        store
            .upsert(
                "app_installations",
                json!({"device_id": "a1b2c3d4", "iname": "weather", "app_id": "v1"}),
                Some("device_id,iname"),
            )
            .await
            .unwrap();

        assert_eq!(store.row_count("app_installations").await, 2);
        let rows = store
            .find("app_installations", &[Filter::eq("iname", "clock")])
            .await
            .unwrap();
        assert_eq!(rows[0]["app_id"], "v2");
    }

    #[tokio::test]
    async fn test_is_null_matches_null_and_absent() {
        let store = MemoryStore::new();
        store
            .upsert("tokens", json!({"token": "t1", "claimed_by": null}), Some("token"))
            .await
            .unwrap();
        store
            .upsert("tokens", json!({"token": "t2"}), Some("token"))
            .await
            .unwrap();
        store
            .upsert("tokens", json!({"token": "t3", "claimed_by": "u1"}), Some("token"))
            .await
            .unwrap();

        let rows = store
            .find("tokens", &[Filter::is_null("claimed_by")])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_gt_compares_timestamps() {
        let store = MemoryStore::new();
        store
            .upsert(
                "tokens",
                json!({"token": "old", "expires_at": "2026-01-01T00:00:00Z"}),
                Some("token"),
            )
            .await
            .unwrap();
        store
            .upsert(
                "tokens",
                json!({"token": "new", "expires_at": "2026-06-01T00:00:00+00:00"}),
                Some("token"),
            )
            .await
            .unwrap();

        let rows = store
            .find(
                "tokens",
                &[Filter::gt("expires_at", "2026-03-01T00:00:00Z")],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["token"], "new");
    }

    #[tokio::test]
    async fn test_conditional_update_counts_affected() {
        let store = MemoryStore::new();
        store
            .upsert("tokens", json!({"token": "t1", "claimed_by": null}), Some("token"))
            .await
            .unwrap();

        let affected = store
            .conditional_update(
                "tokens",
                &[Filter::eq("token", "t1"), Filter::is_null("claimed_by")],
                json!({"claimed_by": "u1"}),
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        // Second attempt no longer matches.
        let affected = store
            .conditional_update(
                "tokens",
                &[Filter::eq("token", "t1"), Filter::is_null("claimed_by")],
                json!({"claimed_by": "u2"}),
            )
            .await
            .unwrap();
        assert_eq!(affected, 0);

        let rows = store.find("tokens", &[Filter::eq("token", "t1")]).await.unwrap();
        assert_eq!(rows[0]["claimed_by"], "u1");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store
            .upsert("tokens", json!({"token": "t1", "device_id": "a1b2c3d4"}), Some("token"))
            .await
            .unwrap();
        store
            .upsert("tokens", json!({"token": "t2", "device_id": "ffffffff"}), Some("token"))
            .await
            .unwrap();

        let removed = store
            .delete("tokens", &[Filter::eq("device_id", "a1b2c3d4")])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.row_count("tokens").await, 1);
    }
}
