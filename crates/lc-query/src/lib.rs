//! Component C7: correlation reader (spec §4.2, §4.5).
//!
//! Incident/impact/health/orphan queries over the materialized views, with
//! a resolver-aware two-phase path ([`pagination::paginate`]) that bounds
//! peak memory independent of base-table size once an [`lc_resolver::AliasResolver`]
//! is configured.

mod pagination;
mod reader;
mod suggester;
mod types;

pub use reader::CorrelationReader;
pub use suggester::{table_name_from_urn, NoopSuggester, PatternSuggester, TableNameSuggester};
pub use types::{
    CorrelationHealth, DownstreamRow, Incident, IncidentFilter, IncidentPage, ImpactRow, LikelyMatch, OrphanDataset,
    Pagination, RecentIncidentSummary, SuggestedPattern, UpstreamRow,
};

#[async_trait::async_trait]
impl lc_types::ViewRefresher for CorrelationReader {
    async fn refresh_views(&self, ctx: &lc_types::Context) -> lc_types::Result<()> {
        CorrelationReader::refresh_views(self, ctx).await
    }
}
