use chrono::{DateTime, Utc};
use serde_json::Value;

/// `query_incidents` filter options. Every field is optional;
/// `None` means "don't filter on this dimension."
#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    pub job_status: Option<String>,
    pub producer_name: Option<String>,
    pub dataset_urn: Option<String>,
    pub job_run_id: Option<String>,
    /// Matches `tool:%` prefix on `job_run_id`.
    pub tool: Option<String>,
    pub test_executed_after: Option<DateTime<Utc>>,
    pub test_executed_before: Option<DateTime<Utc>>,
}

/// `{limit, offset}` pagination.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// One row of `incident_correlation_view` (or its resolver-aware
/// reconstruction).
#[derive(Debug, Clone)]
pub struct Incident {
    pub test_result_id: i64,
    pub test_name: String,
    pub test_type: String,
    pub dataset_urn: String,
    pub status: String,
    pub message: String,
    pub test_metadata: Value,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: Option<i64>,
    pub job_run_id: String,
    pub job_name: String,
    pub job_namespace: String,
    pub job_status: String,
    pub producer_name: String,
    pub producer_version: String,
}

/// `QueryIncidents` result: the page plus the authoritative total across the
/// whole filtered/resolved set (not just this page).
#[derive(Debug, Clone, Default)]
pub struct IncidentPage {
    pub incidents: Vec<Incident>,
    pub total: i64,
}

/// One row of `QueryLineageImpact`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactRow {
    pub dataset_urn: String,
    pub depth: i32,
}

/// One row of `QueryDownstreamWithParents`.
#[derive(Debug, Clone)]
pub struct DownstreamRow {
    pub job_run_id: String,
    pub dataset_urn: String,
    pub parent_urn: String,
    pub depth: i32,
    pub producer_name: String,
}

/// One row of `QueryUpstreamWithChildren`.
#[derive(Debug, Clone)]
pub struct UpstreamRow {
    pub job_run_id: String,
    pub dataset_urn: String,
    pub child_urn: String,
    pub depth: i32,
}

/// One row of `QueryRecentIncidents` (`recent_incidents_summary`).
#[derive(Debug, Clone)]
pub struct RecentIncidentSummary {
    pub dataset_urn: String,
    pub job_run_id: Option<String>,
    pub producer_name: Option<String>,
    pub failure_count: i64,
    pub last_test_failure_at: Option<DateTime<Utc>>,
}

/// A candidate match offered against an orphan dataset by the true-orphan
/// procedure's table-name fallback.
#[derive(Debug, Clone)]
pub struct LikelyMatch {
    pub urn: String,
    pub confidence: f64,
    pub reason: String,
}

/// A dataset that is tested but has no producing output edge.
#[derive(Debug, Clone)]
pub struct OrphanDataset {
    pub dataset_urn: String,
    pub likely_match: Option<LikelyMatch>,
}

/// A candidate resolver pattern offered by a [`crate::PatternSuggester`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedPattern {
    pub pattern: String,
    pub canonical: String,
}

/// `query_correlation_health` result.
#[derive(Debug, Clone, Default)]
pub struct CorrelationHealth {
    pub correlation_rate: f64,
    pub total_datasets: i64,
    pub produced_datasets: i64,
    pub correlated_datasets: i64,
    pub orphan_datasets: Vec<OrphanDataset>,
    pub suggested_patterns: Vec<SuggestedPattern>,
}
