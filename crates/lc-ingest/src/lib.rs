//! Ingestion writer (spec §4.3, component C4): `StoreEvent`/`StoreEvents`/
//! `StoreTestResult` — the idempotency gate, the transactional upsert of
//! run/dataset/edge/test-facet rows, and the §9 defensive facet walking
//! (parent/root extraction, `dataQualityAssertions`) that makes it safe
//! against arbitrarily-shaped OpenLineage JSON.

mod event;
mod facets;
mod writer;

pub use event::{DatasetRef, JobRef, LineageEvent, NewTestResult, RunRef};
pub use facets::{extract_assertions, extract_parent_info, Assertion, ParentInfo};
pub use writer::{EventOutcome, IngestWriter, StoreResult};
