use chrono::{DateTime, Utc};
use lc_pool::Pool;
use lc_types::{Context, Error, Result};
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::store::KeyStore;
use crate::types::{ApiKey, ApiKeyUpdate, AuditLogEntry};

/// Production `KeyStore` (spec §4.8): O(1) lookup-hash match, bcrypt
/// validation, audit-log append-on-write.
#[derive(Clone)]
pub struct PgKeyStore {
    pool: Pool,
}

impl PgKeyStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn audit_log(&self) -> ApiKeyAuditLog {
        ApiKeyAuditLog::new(self.pool.clone())
    }
}

#[async_trait::async_trait]
impl KeyStore for PgKeyStore {
    async fn find_by_key(&self, ctx: &Context, plaintext: &str) -> Result<Option<ApiKey>> {
        ctx.check()?;
        if plaintext.is_empty() {
            return Err(Error::KeyNil);
        }
        let lookup_hash = lc_identity::sha256_hex(plaintext);

        let row: Option<(Uuid, String, String, String, Value, bool, Option<DateTime<Utc>>, DateTime<Utc>, DateTime<Utc>)> =
            sqlx::query_as(
                r#"
                select id, key_hash, plugin_id, name, permissions, active, expires_at, created_at, updated_at
                from api_keys
                where key_lookup_hash = $1
                "#,
            )
            .bind(&lookup_hash)
            .fetch_optional(self.pool.inner())
            .await
            .map_err(Error::Db)?;

        let Some((id, key_hash, plugin_id, name, permissions, active, expires_at, created_at, updated_at)) = row else {
            return Ok(None);
        };

        // bcrypt verification is CPU-bound (~50ms); run off the reactor.
        let plaintext_owned = plaintext.to_string();
        let matches = tokio::task::spawn_blocking(move || lc_identity::bcrypt_verify(&key_hash, &plaintext_owned))
            .await
            .map_err(|e| Error::lineage_store_failed(format!("bcrypt verification task panicked: {e}")))??;

        if !matches {
            tracing::warn!(%id, "api key lookup hash matched but bcrypt validation failed");
            return Ok(None);
        }

        Ok(Some(ApiKey {
            id,
            plugin_id,
            name,
            permissions,
            active,
            expires_at,
            created_at,
            updated_at,
        }))
    }

    async fn add(
        &self,
        ctx: &Context,
        plugin_id: &str,
        name: &str,
        plaintext: &str,
        permissions: Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ApiKey> {
        ctx.check()?;
        if plugin_id.trim().is_empty() {
            return Err(Error::PluginIdEmpty);
        }
        if plaintext.is_empty() {
            return Err(Error::KeyNil);
        }

        let lookup_hash = lc_identity::sha256_hex(plaintext);

        let (exists,): (bool,) = sqlx::query_as("select exists(select 1 from api_keys where key_lookup_hash = $1)")
            .bind(&lookup_hash)
            .fetch_one(self.pool.inner())
            .await
            .map_err(Error::Db)?;
        if exists {
            return Err(Error::KeyAlreadyExists);
        }

        let plaintext_owned = plaintext.to_string();
        let key_hash = tokio::task::spawn_blocking(move || lc_identity::bcrypt_hash(&plaintext_owned))
            .await
            .map_err(|e| Error::lineage_store_failed(format!("bcrypt hash task panicked: {e}")))??;

        let row: (Uuid, bool, DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
            r#"
            insert into api_keys (key_hash, key_lookup_hash, plugin_id, name, permissions, expires_at)
            values ($1, $2, $3, $4, $5, $6)
            returning id, active, created_at, updated_at
            "#,
        )
        .bind(&key_hash)
        .bind(&lookup_hash)
        .bind(plugin_id)
        .bind(name)
        .bind(&permissions)
        .bind(expires_at)
        .fetch_one(self.pool.inner())
        .await
        .map_err(Error::Db)?;

        let (id, active, created_at, updated_at) = row;

        self.audit_log().append_best_effort(id, "created", serde_json::json!({ "plugin_id": plugin_id })).await;

        Ok(ApiKey {
            id,
            plugin_id: plugin_id.to_string(),
            name: name.to_string(),
            permissions,
            active,
            expires_at,
            created_at,
            updated_at,
        })
    }

    async fn update(&self, ctx: &Context, id: Uuid, update: ApiKeyUpdate) -> Result<ApiKey> {
        ctx.check()?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("update api_keys set updated_at = now()");
        if let Some(name) = &update.name {
            builder.push(", name = ");
            builder.push_bind(name.clone());
        }
        if let Some(permissions) = &update.permissions {
            builder.push(", permissions = ");
            builder.push_bind(permissions.clone());
        }
        if let Some(active) = update.active {
            builder.push(", active = ");
            builder.push_bind(active);
        }
        if let Some(expires_at) = update.expires_at {
            builder.push(", expires_at = ");
            builder.push_bind(expires_at);
        }
        builder.push(" where id = ");
        builder.push_bind(id);
        builder.push(" returning id, plugin_id, name, permissions, active, expires_at, created_at, updated_at");

        let row: Option<(Uuid, String, String, Value, bool, Option<DateTime<Utc>>, DateTime<Utc>, DateTime<Utc>)> = builder
            .build_query_as()
            .fetch_optional(self.pool.inner())
            .await
            .map_err(Error::Db)?;

        let Some((id, plugin_id, name, permissions, active, expires_at, created_at, updated_at)) = row else {
            return Err(Error::KeyNotFound);
        };

        self.audit_log().append_best_effort(id, "updated", serde_json::json!({})).await;

        Ok(ApiKey {
            id,
            plugin_id,
            name,
            permissions,
            active,
            expires_at,
            created_at,
            updated_at,
        })
    }

    async fn delete(&self, ctx: &Context, id: Uuid) -> Result<()> {
        ctx.check()?;

        let (affected,): (i64,) = sqlx::query_as(
            r#"
            with updated as (
                update api_keys set active = false, updated_at = now() where id = $1
                returning id
            )
            select count(*) from updated
            "#,
        )
        .bind(id)
        .fetch_one(self.pool.inner())
        .await
        .map_err(Error::Db)?;

        if affected == 0 {
            return Err(Error::KeyNotFound);
        }

        self.audit_log().append_best_effort(id, "deleted", serde_json::json!({})).await;
        Ok(())
    }

    async fn list_by_plugin(&self, ctx: &Context, plugin_id: &str) -> Result<Vec<ApiKey>> {
        ctx.check()?;
        if plugin_id.trim().is_empty() {
            return Err(Error::PluginIdEmpty);
        }

        let rows: Vec<(Uuid, String, Value, bool, Option<DateTime<Utc>>, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            select id, name, permissions, active, expires_at, created_at, updated_at
            from api_keys
            where plugin_id = $1 and active = true
            order by created_at desc
            "#,
        )
        .bind(plugin_id)
        .fetch_all(self.pool.inner())
        .await
        .map_err(Error::Db)?;

        Ok(rows
            .into_iter()
            .map(|(id, name, permissions, active, expires_at, created_at, updated_at)| ApiKey {
                id,
                plugin_id: plugin_id.to_string(),
                name,
                permissions,
                active,
                expires_at,
                created_at,
                updated_at,
            })
            .collect())
    }
}

/// Append-on-write audit trail for `api_keys` (spec §4.8). Writes are
/// best-effort: a failure is logged but never fails the calling operation.
/// `list_for_key` is a supplemented read accessor the spec never names but
/// implies by specifying the write path.
#[derive(Clone)]
pub struct ApiKeyAuditLog {
    pool: Pool,
}

impl ApiKeyAuditLog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Best-effort append: logs and swallows any failure.
    pub async fn append_best_effort(&self, api_key_id: Uuid, action: &str, detail: Value) {
        if let Err(e) = self.append(api_key_id, action, detail).await {
            tracing::warn!(%api_key_id, action, error = %e, "api key audit log append failed");
        }
    }

    async fn append(&self, api_key_id: Uuid, action: &str, detail: Value) -> Result<()> {
        sqlx::query("insert into api_key_audit_log (api_key_id, action, detail) values ($1, $2, $3)")
            .bind(api_key_id)
            .bind(action)
            .bind(detail)
            .execute(self.pool.inner())
            .await
            .map_err(Error::Db)?;
        Ok(())
    }

    pub async fn list_for_key(&self, ctx: &Context, api_key_id: Uuid, limit: i64) -> Result<Vec<AuditLogEntry>> {
        ctx.check()?;
        let rows: Vec<(i64, String, Value, DateTime<Utc>)> = sqlx::query_as(
            r#"
            select id, action, detail, created_at
            from api_key_audit_log
            where api_key_id = $1
            order by created_at desc
            limit $2
            "#,
        )
        .bind(api_key_id)
        .bind(limit)
        .fetch_all(self.pool.inner())
        .await
        .map_err(Error::Db)?;

        Ok(rows
            .into_iter()
            .map(|(id, action, detail, created_at)| AuditLogEntry {
                id,
                api_key_id,
                action,
                detail,
                created_at,
            })
            .collect())
    }
}
