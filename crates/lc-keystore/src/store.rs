use chrono::{DateTime, Utc};
use lc_types::{Context, Result};
use serde_json::Value;
use uuid::Uuid;

use crate::types::{ApiKey, ApiKeyUpdate};

/// Key store contract (spec §4.8, component C8). Implemented by
/// [`crate::PgKeyStore`] (production) and [`crate::InMemoryKeyStore`] (the
/// test double the spec calls for explicitly).
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    /// `None` on not-found or a lookup/validation-hash mismatch — never an
    /// error (spec §7: "not-found is never an error").
    async fn find_by_key(&self, ctx: &Context, plaintext: &str) -> Result<Option<ApiKey>>;

    async fn add(
        &self,
        ctx: &Context,
        plugin_id: &str,
        name: &str,
        plaintext: &str,
        permissions: Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ApiKey>;

    async fn update(&self, ctx: &Context, id: Uuid, update: ApiKeyUpdate) -> Result<ApiKey>;

    /// Soft delete (`active = false`); preserves audit history.
    async fn delete(&self, ctx: &Context, id: Uuid) -> Result<()>;

    /// Only `active = true` rows.
    async fn list_by_plugin(&self, ctx: &Context, plugin_id: &str) -> Result<Vec<ApiKey>>;
}
