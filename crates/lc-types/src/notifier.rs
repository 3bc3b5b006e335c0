/// A write-side hook that lets `lc-ingest` notify `lc-refresh` that a
/// transaction committed, without either crate depending on the other.
/// `lc-refresh::RefreshDebouncer` is the production implementation; tests use
/// a no-op or counting stub.
pub trait ChangeNotifier: Send + Sync {
    /// Fire-and-forget: must not block the caller's transaction commit path.
    fn notify_data_changed(&self);
}

/// A notifier that drops every notification. The default when a caller
/// wires up `lc-ingest` without a refresh debouncer (e.g. `lc-testkit`
/// fixtures that read base tables directly).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ChangeNotifier for NoopNotifier {
    fn notify_data_changed(&self) {}
}

/// The operation `lc-refresh` invokes once its debounce window elapses: a
/// materialized-view refresh implemented by `lc-query`. Defined here, rather
/// than in either crate, so neither needs to depend on the other —
/// `lc-store` is the only place that wires a concrete `lc-query` reader into
/// a concrete `lc-refresh` debouncer.
#[async_trait::async_trait]
pub trait ViewRefresher: Send + Sync {
    async fn refresh_views(&self, ctx: &crate::Context) -> crate::Result<()>;
}
