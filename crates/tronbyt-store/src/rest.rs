//! PostgREST-backed record store
//!
//! Talks to the managed Postgres service over its REST surface. Each
//! `conditional_update` maps to a single filtered `PATCH`, which the
//! service executes as one SQL `UPDATE`; that is where the claim flow's
//! exactly-one-winner guarantee comes from in production.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::store::{Filter, RecordStore, StoreError, StoreResult};

/// Request timeout for store calls; expiry surfaces as `Unavailable`
/// rather than hanging the claim flow.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for a PostgREST-compatible record store
#[derive(Debug, Clone)]
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    /// Create a client for the service at `base_url`, authenticating every
    /// request with `api_key` (the service-role key for admin operations).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn read_rows(&self, response: reqwest::Response) -> StoreResult<Vec<Value>> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(StoreError::Rejected(format!("{status}: {body}")));
        }

        if body.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Render filters as PostgREST query pairs (`column=op.value`)
fn filter_pairs(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| match f {
            Filter::Eq(column, value) => ((*column).to_string(), format!("eq.{}", render(value))),
            Filter::IsNull(column) => ((*column).to_string(), "is.null".to_string()),
            Filter::Gt(column, value) => ((*column).to_string(), format!("gt.{}", render(value))),
        })
        .collect()
}

/// Render a JSON scalar the way PostgREST expects it in a query string
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RecordStore for RestStore {
    async fn upsert(
        &self,
        table: &str,
        record: Value,
        conflict_key: Option<&str>,
    ) -> StoreResult<Value> {
        debug!(table, "upserting record");
        let mut req = self
            .authed(self.http.post(self.table_url(table)))
            .header(
                "Prefer",
                "return=representation,resolution=merge-duplicates",
            )
            .json(&record);
        if let Some(key) = conflict_key {
            req = req.query(&[("on_conflict", key)]);
        }

        let response = req
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let rows = self.read_rows(response).await?;
        Ok(rows.into_iter().next().unwrap_or(record))
    }

    async fn find(&self, table: &str, filters: &[Filter]) -> StoreResult<Vec<Value>> {
        let response = self
            .authed(self.http.get(self.table_url(table)))
            .query(&filter_pairs(filters))
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        self.read_rows(response).await
    }

    async fn conditional_update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> StoreResult<u64> {
        debug!(table, "conditional update");
        let response = self
            .authed(self.http.patch(self.table_url(table)))
            .query(&filter_pairs(filters))
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let rows = self.read_rows(response).await?;
        Ok(rows.len() as u64)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<u64> {
        debug!(table, "deleting records");
        let response = self
            .authed(self.http.delete(self.table_url(table)))
            .query(&filter_pairs(filters))
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let rows = self.read_rows(response).await?;
        Ok(rows.len() as u64)
    }
}
