//! Idempotency-table TTL garbage collection.
//!
//! A single background task wakes every `cleanup_interval`, deletes expired
//! rows from `lineage_event_idempotency` in bounded batches, and publishes
//! the tick's [`CleanupStats`] on a `watch` channel a caller can observe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use lc_pool::Pool;
use lc_types::{Context, Error, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Rows deleted per `DELETE` round-trip.
const BATCH_SIZE: i64 = 10_000;
/// Pause between batches within one tick.
const INTER_BATCH_SLEEP: Duration = Duration::from_millis(100);
/// Upper bound on a single tick, regardless of how many rows remain expired.
const TICK_TIMEOUT: Duration = Duration::from_secs(30);
/// Bound on how long `close()` waits for the worker to exit.
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(5);

/// Summary of one GC tick, published after every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub batches: u64,
    pub rows_deleted: u64,
    pub duration_ms: u64,
}

/// Background idempotency-table reaper.
pub struct IdempotencyGc {
    cancel: CancellationToken,
    closed: AtomicBool,
    task: StdMutex<Option<JoinHandle<()>>>,
    stats: watch::Receiver<CleanupStats>,
}

impl IdempotencyGc {
    /// Spawn the worker. `cleanup_interval` must be greater than zero.
    pub fn spawn(pool: Pool, cleanup_interval: Duration) -> Result<Self> {
        if cleanup_interval.is_zero() {
            return Err(Error::InvalidCleanupInterval);
        }

        let cancel = CancellationToken::new();
        let (stats_tx, stats_rx) = watch::channel(CleanupStats::default());

        let task_cancel = cancel.clone();
        let task = tokio::spawn(run_worker(pool, cleanup_interval, task_cancel, stats_tx));

        Ok(Self {
            cancel,
            closed: AtomicBool::new(false),
            task: StdMutex::new(Some(task)),
            stats: stats_rx,
        })
    }

    /// The most recently published tick summary.
    pub fn last_stats(&self) -> CleanupStats {
        *self.stats.borrow()
    }

    /// A clone of the stats channel, for a caller that wants to `.changed().await`.
    pub fn subscribe(&self) -> watch::Receiver<CleanupStats> {
        self.stats.clone()
    }

    /// Stop the worker. Idempotent — subsequent calls are no-ops.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();

        let handle = self.task.lock().expect("gc task lock poisoned").take();
        let Some(handle) = handle else { return };

        if tokio::time::timeout(SHUTDOWN_BUDGET, handle).await.is_err() {
            tracing::warn!("idempotency GC did not stop within shutdown budget");
        }
    }
}

async fn run_worker(
    pool: Pool,
    cleanup_interval: Duration,
    cancel: CancellationToken,
    stats_tx: watch::Sender<CleanupStats>,
) {
    let mut ticker = tokio::time::interval(cleanup_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so the worker's first real
    // sweep happens after one full interval, matching a periodic-only loop.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let stats = run_tick(&pool, &cancel).await;
                log_tick(stats);
                let _ = stats_tx.send(stats);
            }
        }
    }
}

async fn run_tick(pool: &Pool, cancel: &CancellationToken) -> CleanupStats {
    let ctx = Context::with_timeout(TICK_TIMEOUT);
    let started = tokio::time::Instant::now();

    let mut batches = 0u64;
    let mut rows_deleted = 0u64;

    loop {
        if ctx.check().is_err() || cancel.is_cancelled() {
            break;
        }

        let result = sqlx::query(
            r#"
            DELETE FROM lineage_event_idempotency
            WHERE idempotency_key IN (
                SELECT idempotency_key
                FROM lineage_event_idempotency
                WHERE expires_at < now()
                ORDER BY expires_at ASC
                LIMIT $1
            )
            "#,
        )
        .bind(BATCH_SIZE)
        .execute(pool.inner())
        .await;

        let affected = match result {
            Ok(r) => r.rows_affected(),
            Err(e) => {
                tracing::warn!(error = %e, "idempotency GC batch delete failed");
                break;
            }
        };

        batches += 1;
        rows_deleted += affected;

        if affected < BATCH_SIZE as u64 {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(INTER_BATCH_SLEEP) => {}
            _ = cancel.cancelled() => break,
        }
    }

    CleanupStats {
        batches,
        rows_deleted,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

fn log_tick(stats: CleanupStats) {
    if stats.rows_deleted == 0 {
        tracing::debug!(
            batches = stats.batches,
            rows_deleted = stats.rows_deleted,
            duration_ms = stats.duration_ms,
            "idempotency GC tick complete"
        );
    } else {
        tracing::info!(
            batches = stats.batches,
            rows_deleted = stats.rows_deleted,
            duration_ms = stats.duration_ms,
            "idempotency GC tick complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_interval_is_rejected_without_spawning() {
        // `connect_lazy` never touches the network, so this exercises the
        // real validation in `IdempotencyGc::spawn` without a live database —
        // covered end-to-end against a real pool in
        // lc-gc/tests/scenario_batched_purge.rs.
        let pool = Pool::from_pg_pool(
            sqlx::postgres::PgPoolOptions::new()
                .max_connections(1)
                .connect_lazy("postgres://invalid/invalid")
                .expect("lazy pool never touches the network"),
        );

        let result = IdempotencyGc::spawn(pool, Duration::ZERO);
        assert!(matches!(result, Err(Error::InvalidCleanupInterval)));
    }
}
