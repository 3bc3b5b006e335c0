use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use lc_types::{Context, Error, Result};
use serde_json::Value;
use uuid::Uuid;

use crate::store::KeyStore;
use crate::types::{ApiKey, ApiKeyUpdate};

struct Record {
    key: ApiKey,
    lookup_hash: String,
}

/// In-process `KeyStore` test double (spec §4.8 calls for this explicitly).
/// Same not-found/duplicate-key semantics as [`crate::PgKeyStore`], no
/// bcrypt round-trip — the lookup hash alone decides a match.
#[derive(Default)]
pub struct InMemoryKeyStore {
    records: Mutex<HashMap<Uuid, Record>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn find_by_key(&self, ctx: &Context, plaintext: &str) -> Result<Option<ApiKey>> {
        ctx.check()?;
        if plaintext.is_empty() {
            return Err(Error::KeyNil);
        }
        let lookup_hash = lc_identity::sha256_hex(plaintext);
        let records = self.records.lock().expect("lock poisoned");
        Ok(records.values().find(|r| r.lookup_hash == lookup_hash).map(|r| r.key.clone()))
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
        let mut records = self.records.lock().expect("lock poisoned");
        if records.values().any(|r| r.lookup_hash == lookup_hash) {
            return Err(Error::KeyAlreadyExists);
        }

        let now = Utc::now();
        let key = ApiKey {
            id: Uuid::new_v4(),
            plugin_id: plugin_id.to_string(),
            name: name.to_string(),
            permissions,
            active: true,
            expires_at,
            created_at: now,
            updated_at: now,
        };
        records.insert(key.id, Record { key: key.clone(), lookup_hash });
        Ok(key)
    }

    async fn update(&self, ctx: &Context, id: Uuid, update: ApiKeyUpdate) -> Result<ApiKey> {
        ctx.check()?;
        let mut records = self.records.lock().expect("lock poisoned");
        let record = records.get_mut(&id).ok_or(Error::KeyNotFound)?;

        if let Some(name) = update.name {
            record.key.name = name;
        }
        if let Some(permissions) = update.permissions {
            record.key.permissions = permissions;
        }
        if let Some(active) = update.active {
            record.key.active = active;
        }
        if let Some(expires_at) = update.expires_at {
            record.key.expires_at = expires_at;
        }
        record.key.updated_at = Utc::now();
        Ok(record.key.clone())
    }

    async fn delete(&self, ctx: &Context, id: Uuid) -> Result<()> {
        ctx.check()?;
        let mut records = self.records.lock().expect("lock poisoned");
        let record = records.get_mut(&id).ok_or(Error::KeyNotFound)?;
        record.key.active = false;
        record.key.updated_at = Utc::now();
        Ok(())
    }

    async fn list_by_plugin(&self, ctx: &Context, plugin_id: &str) -> Result<Vec<ApiKey>> {
        ctx.check()?;
        if plugin_id.trim().is_empty() {
            return Err(Error::PluginIdEmpty);
        }
        let records = self.records.lock().expect("lock poisoned");
        let mut keys: Vec<ApiKey> = records
            .values()
            .filter(|r| r.key.plugin_id == plugin_id && r.key.active)
            .map(|r| r.key.clone())
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn add_then_find_by_key_round_trips() {
        let store = InMemoryKeyStore::new();
        let ctx = Context::background();
        let added = store.add(&ctx, "plugin-a", "ci key", "s3cr3t", json!({"scope": "read"}), None).await.unwrap();

        let found = store.find_by_key(&ctx, "s3cr3t").await.unwrap().expect("found");
        assert_eq!(found.id, added.id);
        assert_eq!(found.plugin_id, "plugin-a");
    }

    #[tokio::test]
    async fn find_by_key_with_wrong_plaintext_is_none_not_error() {
        let store = InMemoryKeyStore::new();
        let ctx = Context::background();
        store.add(&ctx, "plugin-a", "ci key", "s3cr3t", json!({}), None).await.unwrap();

        let found = store.find_by_key(&ctx, "wrong").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn add_duplicate_key_is_rejected() {
        let store = InMemoryKeyStore::new();
        let ctx = Context::background();
        store.add(&ctx, "plugin-a", "k1", "s3cr3t", json!({}), None).await.unwrap();

        let err = store.add(&ctx, "plugin-b", "k2", "s3cr3t", json!({}), None).await.unwrap_err();
        assert!(matches!(err, Error::KeyAlreadyExists));
    }

    #[tokio::test]
    async fn delete_is_soft_and_excludes_from_list() {
        let store = InMemoryKeyStore::new();
        let ctx = Context::background();
        let added = store.add(&ctx, "plugin-a", "k1", "s3cr3t", json!({}), None).await.unwrap();

        store.delete(&ctx, added.id).await.unwrap();

        let listed = store.list_by_plugin(&ctx, "plugin-a").await.unwrap();
        assert!(listed.is_empty());

        // still findable by key lookup, just inactive — matches PgKeyStore's soft-delete semantics.
        let found = store.find_by_key(&ctx, "s3cr3t").await.unwrap().expect("found");
        assert!(!found.active);
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let store = InMemoryKeyStore::new();
        let ctx = Context::background();
        let err = store.update(&ctx, Uuid::new_v4(), ApiKeyUpdate::default()).await.unwrap_err();
        assert!(matches!(err, Error::KeyNotFound));
    }
}
