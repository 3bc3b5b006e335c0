//! Embedded SQLx migrations for the lineage correlation core's persistent
//! schema: tables, indexes, the terminal-state trigger, the three
//! correlation materialized views, and `refresh_correlation_views()`.
//!
//! This SQL is treated as an externally-installed artifact the core merely
//! assumes is present. It lives in its own crate (rather than inline in
//! `lc-pool`/`lc-store`) so `lc-testkit` and scenario tests across every
//! other crate can provision a throwaway database without depending on the
//! ingestion or query crates themselves.

use lc_types::{Error, Result};
use sqlx::PgPool;

/// Run the embedded migrations against `pool`. Idempotent: re-running
/// against an already-migrated database is a no-op.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::no_database_connection(format!("schema migration failed: {e}")))?;
    Ok(())
}
