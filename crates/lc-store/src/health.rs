use lc_gc::CleanupStats;
use lc_pool::PoolStats;

/// A point-in-time snapshot of the store's health, the composition root's
/// equivalent of a `/v1/status` endpoint without introducing one (no HTTP
/// layer lives in this crate).
#[derive(Debug, Clone)]
pub struct StoreHealth {
    /// `Ok(())` iff the pool answered a trivial round-trip within budget.
    pub database_reachable: bool,
    pub pool: PoolStats,
    /// Results of the most recently completed GC tick, if any has run yet.
    pub last_gc: CleanupStats,
}
