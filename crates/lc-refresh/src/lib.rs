//! Component C5: debounced materialized-view refresh (spec §4.6).
//!
//! `lc-ingest` calls [`lc_types::ChangeNotifier::notify_data_changed`] after
//! every committed write; this crate coalesces bursts of those calls into a
//! bounded number of calls into C7's `RefreshViews`, via the
//! [`lc_types::ViewRefresher`] seam.

mod debouncer;

pub use debouncer::RefreshDebouncer;
