//! Alias resolver (spec §4.4, component C3): a pattern-based URN rewriter
//! reconciling the different dialects different producers emit for the same
//! physical dataset (e.g. `demo_postgres/{name}` → `postgresql://demo/marts.{name}`).

mod pattern;

pub use pattern::{AliasResolver, PatternConfig, PatternRule};
