use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use lc_types::{ChangeNotifier, Context, ViewRefresher};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Bounded shutdown wait for an in-flight refresh (spec §4.6 `Close()`).
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(5);

enum Msg {
    Notify,
    Close(oneshot::Sender<()>),
}

/// `IDLE` / `TIMER_PENDING` / `REFRESHING` (spec §4.6). The actor task in
/// [`run_actor`] is the sole owner of this value — there is no shared mutex,
/// because the state machine is serialized by construction (one task reads
/// one channel), which is the "or equivalent" the spec's §9 design note
/// allows in place of an explicit mutex.
enum State {
    Idle,
    TimerPending,
    Refreshing,
}

/// Debounced materialized-view refresher (spec §4.6, component C5):
/// coalesces a burst of `notify_data_changed()` calls into at most one
/// in-flight `refresh_views` call, with at most one follow-up queued behind
/// it.
///
/// `refresh_delay == Duration::ZERO` disables the feature entirely —
/// `notify_data_changed` becomes a no-op and no actor task is spawned.
pub struct RefreshDebouncer {
    tx: Option<mpsc::UnboundedSender<Msg>>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl RefreshDebouncer {
    pub fn new(refresh_delay: Duration, refresher: Arc<dyn ViewRefresher>) -> Self {
        if refresh_delay.is_zero() {
            tracing::debug!("refresh debouncer disabled (refresh_delay = 0)");
            return Self {
                tx: None,
                task: StdMutex::new(None),
            };
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_actor(refresh_delay, refresher, rx));
        Self {
            tx: Some(tx),
            task: StdMutex::new(Some(task)),
        }
    }

    /// Cancel any armed timer; wait (bounded by [`SHUTDOWN_BUDGET`]) for an
    /// in-flight refresh to finish. Once this returns, every subsequent
    /// `notify_data_changed()` is a no-op.
    pub async fn close(&self) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };

        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(Msg::Close(done_tx)).is_err() {
            // Actor already gone.
            return;
        }
        if tokio::time::timeout(SHUTDOWN_BUDGET, done_rx).await.is_err() {
            tracing::warn!("refresh debouncer close() timed out waiting for actor shutdown");
        }

        let handle = self.task.lock().expect("debouncer task lock poisoned").take();
        if let Some(handle) = handle {
            if tokio::time::timeout(SHUTDOWN_BUDGET, handle).await.is_err() {
                tracing::warn!("refresh debouncer actor task did not exit within shutdown budget");
            }
        }
    }
}

impl ChangeNotifier for RefreshDebouncer {
    fn notify_data_changed(&self) {
        if let Some(tx) = self.tx.as_ref() {
            // An unbounded channel never blocks; a send error only means the
            // actor already exited (post-`close()`), which is itself a no-op.
            let _ = tx.send(Msg::Notify);
        }
    }
}

async fn run_actor(refresh_delay: Duration, refresher: Arc<dyn ViewRefresher>, mut rx: mpsc::UnboundedReceiver<Msg>) {
    let mut state = State::Idle;
    let mut deadline: Option<Instant> = None;
    let mut refresh_task: Option<JoinHandle<lc_types::Result<()>>> = None;
    let mut pending_again = false;

    loop {
        tokio::select! {
            biased;

            msg = rx.recv() => {
                match msg {
                    None => return,
                    Some(Msg::Close(done)) => {
                        deadline = None;
                        if let Some(handle) = refresh_task.take() {
                            let _ = handle.await;
                        }
                        let _ = done.send(());
                        return;
                    }
                    Some(Msg::Notify) => match state {
                        State::Idle => {
                            deadline = Some(Instant::now() + refresh_delay);
                            state = State::TimerPending;
                        }
                        State::TimerPending => {
                            deadline = Some(Instant::now() + refresh_delay);
                        }
                        State::Refreshing => {
                            pending_again = true;
                        }
                    },
                }
            }

            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                state = State::Refreshing;
                let refresher = refresher.clone();
                refresh_task = Some(tokio::spawn(async move {
                    refresher.refresh_views(&Context::background()).await
                }));
            }

            joined = async { refresh_task.as_mut().expect("guarded by is_some").await }, if refresh_task.is_some() => {
                refresh_task = None;
                match joined {
                    Ok(Err(e)) => tracing::warn!(error = %e, "materialized view refresh failed"),
                    Err(join_err) => tracing::warn!(error = %join_err, "refresh task panicked"),
                    Ok(Ok(())) => {}
                }
                if pending_again {
                    pending_again = false;
                    deadline = Some(Instant::now() + refresh_delay);
                    state = State::TimerPending;
                } else {
                    state = State::Idle;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRefresher {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl ViewRefresher for CountingRefresher {
        async fn refresh_views(&self, _ctx: &Context) -> lc_types::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_notifications_coalesces_to_one_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let refresher = Arc::new(CountingRefresher {
            calls: calls.clone(),
            delay: Duration::ZERO,
        });
        let debouncer = RefreshDebouncer::new(Duration::from_millis(200), refresher);

        for _ in 0..50 {
            debouncer.notify_data_changed();
        }

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        debouncer.close().await;
    }

    #[tokio::test]
    async fn zero_delay_disables_refresh_entirely() {
        let calls = Arc::new(AtomicUsize::new(0));
        let refresher = Arc::new(CountingRefresher {
            calls: calls.clone(),
            delay: Duration::ZERO,
        });
        let debouncer = RefreshDebouncer::new(Duration::ZERO, refresher);

        for _ in 0..50 {
            debouncer.notify_data_changed();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        debouncer.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn notify_during_refresh_causes_exactly_one_followup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let refresher = Arc::new(CountingRefresher {
            calls: calls.clone(),
            delay: Duration::from_millis(100),
        });
        let debouncer = RefreshDebouncer::new(Duration::from_millis(50), refresher);

        debouncer.notify_data_changed();
        tokio::time::sleep(Duration::from_millis(70)).await; // timer fires, refresh starts
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Arrives while REFRESHING: should not start a second refresh yet,
        // but should schedule exactly one follow-up.
        debouncer.notify_data_changed();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        debouncer.close().await;
    }

    #[tokio::test]
    async fn close_before_timer_fires_prevents_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let refresher = Arc::new(CountingRefresher {
            calls: calls.clone(),
            delay: Duration::ZERO,
        });
        let debouncer = RefreshDebouncer::new(Duration::from_secs(10), refresher);

        debouncer.notify_data_changed();
        debouncer.close().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
