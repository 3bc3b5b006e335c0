//! Top-level facade: wires the connection pool, alias resolver, ingestion
//! writer, refresh debouncer, idempotency GC, correlation reader, and key
//! store into one `LineageStore`, owns the background workers' lifecycle,
//! and is the crate's single public entry point.

mod config;
mod health;

use std::sync::Arc;

use lc_gc::IdempotencyGc;
use lc_ingest::IngestWriter;
use lc_keystore::{KeyStore, PgKeyStore};
use lc_pool::Pool;
use lc_query::{CorrelationReader, TableNameSuggester};
use lc_refresh::RefreshDebouncer;
use lc_resolver::AliasResolver;
use lc_types::{ChangeNotifier, Context, Result, ViewRefresher};

pub use config::StoreConfig;
pub use health::StoreHealth;

/// The crate's single public entry point: one connection pool, one
/// correlation reader, one debounced view-refresh worker, one idempotency
/// GC worker, one key store, wired together the way a composition root
/// would wire C1–C8 by hand.
pub struct LineageStore {
    pool: Pool,
    writer: IngestWriter,
    reader: Arc<CorrelationReader>,
    debouncer: Arc<RefreshDebouncer>,
    gc: IdempotencyGc,
    keystore: Arc<dyn KeyStore>,
}

impl LineageStore {
    /// Wire every component against an already-connected pool. Spawns the
    /// refresh debouncer's actor task and the GC worker's task immediately;
    /// callers must call [`LineageStore::close`] before dropping to shut
    /// them down cleanly.
    pub fn new(pool: Pool, config: StoreConfig) -> Result<Self> {
        let resolver = AliasResolver::new(&config.resolver_patterns)?;
        let suggester = Arc::new(TableNameSuggester);
        let reader = Arc::new(CorrelationReader::with_resolver_and_suggester(pool.clone(), resolver, suggester));

        let refresher: Arc<dyn ViewRefresher> = reader.clone();
        let debouncer = Arc::new(RefreshDebouncer::new(config.refresh_delay, refresher));

        let notifier: Arc<dyn ChangeNotifier> = debouncer.clone();
        let writer = IngestWriter::new(pool.clone(), notifier);

        let gc = IdempotencyGc::spawn(pool.clone(), config.cleanup_interval)?;
        let keystore: Arc<dyn KeyStore> = Arc::new(PgKeyStore::new(pool.clone()));

        Ok(Self { pool, writer, reader, debouncer, gc, keystore })
    }

    /// Connect a fresh pool from environment (`DATABASE_URL` and friends)
    /// and wire it up in one step.
    pub async fn connect_from_env(config: StoreConfig) -> Result<Self> {
        let pool = Pool::connect_from_env().await?;
        Self::new(pool, config)
    }

    pub fn writer(&self) -> &IngestWriter {
        &self.writer
    }

    pub fn reader(&self) -> &CorrelationReader {
        &self.reader
    }

    pub fn keystore(&self) -> &dyn KeyStore {
        self.keystore.as_ref()
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// A point-in-time health snapshot: pool reachability plus the most
    /// recent GC tick's stats.
    pub async fn health(&self, ctx: &Context) -> StoreHealth {
        let database_reachable = self.pool.health_check(ctx).await.is_ok();
        StoreHealth {
            database_reachable,
            pool: self.pool.stats(),
            last_gc: self.gc.last_stats(),
        }
    }

    /// Shut down both background workers. Idempotent: a second call is a
    /// no-op on each worker (both `close()` implementations guard with their
    /// own once-semantics).
    pub async fn close(&self) {
        self.debouncer.close().await;
        self.gc.close().await;
    }
}
