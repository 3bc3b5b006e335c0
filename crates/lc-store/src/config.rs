use std::time::Duration;

use lc_resolver::PatternConfig;

const DEFAULT_REFRESH_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Wiring knobs for [`crate::LineageStore`]: refresh delay, cleanup
/// interval, and resolver patterns. All optional — defaults are sensible
/// for a production deployment.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Debounce window before a burst of writes triggers one view refresh.
    /// Zero disables background refresh entirely (callers must refresh
    /// manually via `LineageStore::reader().refresh_views`).
    pub refresh_delay: Duration,
    /// Interval between idempotency-table GC sweeps. Must be non-zero.
    pub cleanup_interval: Duration,
    /// Alias patterns for C3's URN resolver, compiled once at construction.
    pub resolver_patterns: Vec<PatternConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            refresh_delay: DEFAULT_REFRESH_DELAY,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            resolver_patterns: Vec::new(),
        }
    }
}
