//! Shared glue for the lineage correlation core: the error taxonomy, the
//! cancellable `Context` every public operation accepts, and the small
//! domain enums (`RunState`, `EdgeType`, `TestStatus`) every other `lc-*`
//! crate would otherwise have to re-declare.
//!
//! No IO lives here — this crate is pure types, kept free of behavior so
//! every other crate in the workspace can depend on it without pulling in
//! a database driver transitively.

mod context;
mod domain;
mod error;
mod notifier;

pub use context::Context;
pub use domain::{EdgeType, RunState, TestStatus};
pub use error::{Error, Result};
pub use notifier::{ChangeNotifier, NoopNotifier, ViewRefresher};
