use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// A masked API key (spec §4.8): the bcrypt hash and the lookup hash never
/// leave the store.
#[derive(Debug, Clone)]
pub struct ApiKey {
    pub id: Uuid,
    pub plugin_id: String,
    pub name: String,
    pub permissions: Value,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields `Update` is allowed to change: name, permissions, active, expiry.
/// Never the hash (spec §4.8).
#[derive(Debug, Clone, Default)]
pub struct ApiKeyUpdate {
    pub name: Option<String>,
    pub permissions: Option<Value>,
    pub active: Option<bool>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// One `api_key_audit_log` row.
#[derive(Debug, Clone)]
pub struct AuditLogEntry {
    pub id: i64,
    pub api_key_id: Uuid,
    pub action: String,
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}
