use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use lc_pool::Pool;
use lc_resolver::AliasResolver;
use lc_types::{Context, Error, Result};
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use crate::pagination::paginate;
use crate::suggester::{table_name_from_urn, NoopSuggester, PatternSuggester};
use crate::types::{
    CorrelationHealth, DownstreamRow, Incident, IncidentFilter, IncidentPage, ImpactRow, LikelyMatch, OrphanDataset,
    Pagination, RecentIncidentSummary, UpstreamRow,
};

/// Wall-clock budget above which `refresh_views` logs a warning rather than
/// just the usual debug-level timing (spec §4.2).
const REFRESH_WARN_THRESHOLD: StdDuration = StdDuration::from_secs(2);
/// Recursive traversal depth cap shared with the `lineage_impact_analysis`
/// materialized view (spec §6, §9 cyclic-lineage note).
const MAX_TRAVERSAL_DEPTH: i32 = 10;

/// Correlation reader (spec §4.2/§4.5, component C7): the read side of the
/// lineage core. Bypasses the materialized views for a resolver-aware
/// two-phase query whenever an [`AliasResolver`] with ≥1 pattern is
/// configured; otherwise reads straight from the views.
#[derive(Clone)]
pub struct CorrelationReader {
    pool: Pool,
    resolver: Arc<AliasResolver>,
    suggester: Arc<dyn PatternSuggester>,
}

impl CorrelationReader {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            resolver: Arc::new(AliasResolver::empty()),
            suggester: Arc::new(NoopSuggester),
        }
    }

    pub fn with_resolver(pool: Pool, resolver: AliasResolver) -> Self {
        Self {
            pool,
            resolver: Arc::new(resolver),
            suggester: Arc::new(NoopSuggester),
        }
    }

    pub fn with_resolver_and_suggester(pool: Pool, resolver: AliasResolver, suggester: Arc<dyn PatternSuggester>) -> Self {
        Self {
            pool,
            resolver: Arc::new(resolver),
            suggester,
        }
    }

    /// `RefreshViews` (spec §4.2): invokes `refresh_correlation_views()`,
    /// which refreshes all three views in dependency order, concurrently.
    pub async fn refresh_views(&self, ctx: &Context) -> Result<()> {
        ctx.check()?;
        let started = std::time::Instant::now();

        let rows: Vec<(String, f64)> = sqlx::query_as("select view_name, duration_ms from refresh_correlation_views()")
            .fetch_all(self.pool.inner())
            .await
            .map_err(|e| Error::ViewRefreshFailed { source: e })?;

        let elapsed = started.elapsed();
        if elapsed > REFRESH_WARN_THRESHOLD {
            tracing::warn!(elapsed_ms = elapsed.as_millis() as u64, ?rows, "materialized view refresh exceeded 2s budget");
        } else {
            tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, ?rows, "materialized view refresh complete");
        }

        Ok(())
    }

    /// `QueryIncidents` (spec §4.2): the view-path when no resolver patterns
    /// are configured, else the resolver-aware two-phase path.
    pub async fn query_incidents(&self, ctx: &Context, filter: &IncidentFilter, pagination: Pagination) -> Result<IncidentPage> {
        ctx.check()?;
        if self.resolver.get_pattern_count() == 0 {
            self.query_incidents_view_path(filter, pagination).await
        } else {
            self.query_incidents_resolver_path(filter, pagination).await
        }
    }

    async fn query_incidents_view_path(&self, filter: &IncidentFilter, pagination: Pagination) -> Result<IncidentPage> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            select
                test_result_id, test_name, test_type, dataset_urn, status, message,
                test_metadata, executed_at, duration_ms, job_run_id, job_name,
                job_namespace, job_status, producer_name, producer_version,
                count(*) over() as total
            from incident_correlation_view
            "#,
        );
        push_incident_filter(&mut builder, filter, true);
        builder.push(" order by executed_at desc limit ");
        builder.push_bind(pagination.limit);
        builder.push(" offset ");
        builder.push_bind(pagination.offset);

        let rows: Vec<(
            i64,
            String,
            String,
            String,
            String,
            String,
            Value,
            DateTime<Utc>,
            Option<i64>,
            String,
            String,
            String,
            String,
            String,
            String,
            i64,
        )> = builder
            .build_query_as()
            .fetch_all(self.pool.inner())
            .await
            .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        let total = rows.first().map(|r| r.15).unwrap_or(0);
        let incidents = rows.into_iter().map(incident_from_view_row).collect();

        Ok(IncidentPage { incidents, total })
    }

    async fn query_incidents_resolver_path(&self, filter: &IncidentFilter, pagination: Pagination) -> Result<IncidentPage> {
        let producers = self.fetch_producer_index(filter).await?;

        let mut candidate_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("select id, dataset_urn from test_results where status in ('failed', 'error')");
        if let Some(urn) = &filter.dataset_urn {
            candidate_builder.push(" and dataset_urn = ");
            candidate_builder.push_bind(urn.clone());
        }
        if let Some(after) = filter.test_executed_after {
            candidate_builder.push(" and executed_at > ");
            candidate_builder.push_bind(after);
        }
        if let Some(before) = filter.test_executed_before {
            candidate_builder.push(" and executed_at < ");
            candidate_builder.push_bind(before);
        }
        candidate_builder.push(" order by executed_at desc");

        // Stream rather than materialize: step 2 (spec §4.2) only needs to
        // hold the pairs that survive resolution, not every failed test row
        // in the base table. `query_incidents_resolver_path`'s O(correlated)
        // memory bound depends on this — materializing `candidates` first
        // would make it O(total failed tests) instead.
        let mut rows = candidate_builder.build_query_as::<(i64, String)>().fetch(self.pool.inner());
        let mut correlated: Vec<(i64, String)> = Vec::new();
        while let Some(row) = rows.try_next().await.map_err(|e| Error::CorrelationQueryFailed { source: e })? {
            let (id, urn) = row;
            let resolved = self.resolver.resolve(&urn);
            if producers.contains_key(&resolved) {
                correlated.push((id, resolved));
            }
        }
        drop(rows);

        let (page, total) = paginate(correlated, pagination.offset, pagination.limit);
        if page.is_empty() {
            return Ok(IncidentPage { incidents: Vec::new(), total });
        }

        let ids: Vec<i64> = page.iter().map(|(id, _)| *id).collect();
        let test_rows = self.fetch_test_rows_by_id(&ids).await?;

        let incidents = page
            .into_iter()
            .filter_map(|(id, resolved_urn)| {
                let test_row = test_rows.get(&id)?;
                let producer = producers.get(&resolved_urn)?;
                Some(Incident {
                    test_result_id: id,
                    test_name: test_row.test_name.clone(),
                    test_type: test_row.test_type.clone(),
                    dataset_urn: resolved_urn,
                    status: test_row.status.clone(),
                    message: test_row.message.clone(),
                    test_metadata: test_row.metadata.clone(),
                    executed_at: test_row.executed_at,
                    duration_ms: test_row.duration_ms,
                    job_run_id: producer.job_run_id.clone(),
                    job_name: producer.job_name.clone(),
                    job_namespace: producer.job_namespace.clone(),
                    job_status: producer.job_status.clone(),
                    producer_name: producer.producer_name.clone(),
                    producer_version: producer.producer_version.clone(),
                })
            })
            .collect();

        Ok(IncidentPage { incidents, total })
    }

    /// Produced-URN → first-matching producer job, ordered by `job_run_id`
    /// so "first producer row per URN wins" is deterministic (spec §4.2
    /// step 4), filtered by the job-side dimensions of `filter`
    /// (`job_status`, `producer_name`, `job_run_id`, `tool`).
    async fn fetch_producer_index(&self, filter: &IncidentFilter) -> Result<HashMap<String, ProducerRow>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            select le.dataset_urn, le.job_run_id, jr.job_name, jr.job_namespace,
                   jr.current_state, jr.producer_name, jr.producer_version
            from lineage_edges le
            join job_runs jr on jr.job_run_id = le.job_run_id
            where le.edge_type = 'output'
            "#,
        );
        if let Some(status) = &filter.job_status {
            builder.push(" and jr.current_state = ");
            builder.push_bind(status.clone());
        }
        if let Some(producer) = &filter.producer_name {
            builder.push(" and jr.producer_name = ");
            builder.push_bind(producer.clone());
        }
        if let Some(job_run_id) = &filter.job_run_id {
            builder.push(" and le.job_run_id = ");
            builder.push_bind(job_run_id.clone());
        }
        if let Some(tool) = &filter.tool {
            builder.push(" and le.job_run_id like ");
            builder.push_bind(format!("{tool}:%"));
        }
        builder.push(" order by le.job_run_id asc");

        let rows: Vec<(String, String, String, String, String, String, String)> = builder
            .build_query_as()
            .fetch_all(self.pool.inner())
            .await
            .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        let mut index = HashMap::new();
        for (dataset_urn, job_run_id, job_name, job_namespace, job_status, producer_name, producer_version) in rows {
            index.entry(dataset_urn).or_insert(ProducerRow {
                job_run_id,
                job_name,
                job_namespace,
                job_status,
                producer_name,
                producer_version,
            });
        }
        Ok(index)
    }

    async fn fetch_test_rows_by_id(&self, ids: &[i64]) -> Result<HashMap<i64, TestRow>> {
        let rows: Vec<(i64, String, String, String, String, Value, DateTime<Utc>, Option<i64>)> = sqlx::query_as(
            r#"
            select id, test_name, test_type, status, message, metadata, executed_at, duration_ms
            from test_results
            where id = any($1)
            "#,
        )
        .bind(ids)
        .fetch_all(self.pool.inner())
        .await
        .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        Ok(rows
            .into_iter()
            .map(|(id, test_name, test_type, status, message, metadata, executed_at, duration_ms)| {
                (
                    id,
                    TestRow {
                        test_name,
                        test_type,
                        status,
                        message,
                        metadata,
                        executed_at,
                        duration_ms,
                    },
                )
            })
            .collect())
    }

    /// `QueryIncidentByID` (spec §4.2): `None` on not-found, never an error.
    pub async fn query_incident_by_id(&self, ctx: &Context, test_result_id: i64) -> Result<Option<Incident>> {
        ctx.check()?;

        if self.resolver.get_pattern_count() == 0 {
            let row: Option<(
                i64,
                String,
                String,
                String,
                String,
                String,
                Value,
                DateTime<Utc>,
                Option<i64>,
                String,
                String,
                String,
                String,
                String,
                String,
            )> = sqlx::query_as(
                r#"
                select
                    test_result_id, test_name, test_type, dataset_urn, status, message,
                    test_metadata, executed_at, duration_ms, job_run_id, job_name,
                    job_namespace, job_status, producer_name, producer_version
                from incident_correlation_view
                where test_result_id = $1
                "#,
            )
            .bind(test_result_id)
            .fetch_optional(self.pool.inner())
            .await
            .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

            return Ok(row.map(incident_from_view_row_no_total));
        }

        let test_row: Option<(String, String, String, String, Value, DateTime<Utc>, Option<i64>, String)> = sqlx::query_as(
            r#"
            select test_name, test_type, status, message, metadata, executed_at, duration_ms, dataset_urn
            from test_results
            where id = $1
            "#,
        )
        .bind(test_result_id)
        .fetch_optional(self.pool.inner())
        .await
        .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        let Some((test_name, test_type, status, message, metadata, executed_at, duration_ms, dataset_urn)) = test_row else {
            return Ok(None);
        };

        if status != "failed" && status != "error" {
            return Ok(None);
        }

        let resolved = self.resolver.resolve(&dataset_urn);
        let producer: Option<(String, String, String, String, String, String)> = sqlx::query_as(
            r#"
            select le.job_run_id, jr.job_name, jr.job_namespace, jr.current_state, jr.producer_name, jr.producer_version
            from lineage_edges le
            join job_runs jr on jr.job_run_id = le.job_run_id
            where le.edge_type = 'output' and le.dataset_urn = $1
            order by le.job_run_id asc
            limit 1
            "#,
        )
        .bind(&resolved)
        .fetch_optional(self.pool.inner())
        .await
        .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        let Some((job_run_id, job_name, job_namespace, job_status, producer_name, producer_version)) = producer else {
            return Ok(None);
        };

        Ok(Some(Incident {
            test_result_id,
            test_name,
            test_type,
            dataset_urn: resolved,
            status,
            message,
            test_metadata: metadata,
            executed_at,
            duration_ms,
            job_run_id,
            job_name,
            job_namespace,
            job_status,
            producer_name,
            producer_version,
        }))
    }

    /// `QueryLineageImpact` (spec §4.2): `max_depth == -1` → direct outputs
    /// only; `0` → every depth; `>0` → capped at that depth.
    pub async fn query_lineage_impact(&self, ctx: &Context, job_run_id: &str, max_depth: i32) -> Result<Vec<ImpactRow>> {
        ctx.check()?;

        let rows: Vec<(String, i32)> = if max_depth == -1 {
            sqlx::query_as("select dataset_urn, depth from lineage_impact_analysis where origin_job_run_id = $1 and depth = 0 order by dataset_urn")
                .bind(job_run_id)
                .fetch_all(self.pool.inner())
                .await
        } else if max_depth == 0 {
            sqlx::query_as("select dataset_urn, depth from lineage_impact_analysis where origin_job_run_id = $1 order by depth, dataset_urn")
                .bind(job_run_id)
                .fetch_all(self.pool.inner())
                .await
        } else {
            sqlx::query_as(
                "select dataset_urn, depth from lineage_impact_analysis where origin_job_run_id = $1 and depth <= $2 order by depth, dataset_urn",
            )
            .bind(job_run_id)
            .bind(max_depth)
            .fetch_all(self.pool.inner())
            .await
        }
        .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        Ok(rows.into_iter().map(|(dataset_urn, depth)| ImpactRow { dataset_urn, depth }).collect())
    }

    /// `QueryDownstreamWithParents` (spec §4.2): recursive
    /// `output → input → output` traversal, skipping self-loops, strictly
    /// increasing depth, only `depth > 0` rows returned.
    pub async fn query_downstream_with_parents(&self, ctx: &Context, job_run_id: &str, max_depth: i32) -> Result<Vec<DownstreamRow>> {
        ctx.check()?;
        let cap = effective_depth_cap(max_depth);

        let rows: Vec<(String, String, String, i32, String)> = sqlx::query_as(
            r#"
            with recursive downstream(job_run_id, dataset_urn, parent_urn, depth, path) as (
                select le_out.job_run_id, le_out.dataset_urn, le_out.dataset_urn, 0, array[le_out.dataset_urn]
                from lineage_edges le_out
                where le_out.job_run_id = $1 and le_out.edge_type = 'output'

                union all

                select le_out.job_run_id, le_out.dataset_urn, downstream.dataset_urn, downstream.depth + 1,
                       downstream.path || le_out.dataset_urn
                from downstream
                join lineage_edges le_in on le_in.dataset_urn = downstream.dataset_urn and le_in.edge_type = 'input'
                join lineage_edges le_out on le_out.job_run_id = le_in.job_run_id and le_out.edge_type = 'output'
                where downstream.depth < $2
                  and le_out.dataset_urn <> downstream.dataset_urn
                  and not (le_out.dataset_urn = any(downstream.path))
            )
            select d.job_run_id, d.dataset_urn, d.parent_urn, d.depth, jr.producer_name
            from downstream d
            join job_runs jr on jr.job_run_id = d.job_run_id
            where d.depth > 0
            order by d.depth, d.dataset_urn
            "#,
        )
        .bind(job_run_id)
        .bind(cap)
        .fetch_all(self.pool.inner())
        .await
        .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        Ok(rows
            .into_iter()
            .map(|(job_run_id, dataset_urn, parent_urn, depth, producer_name)| DownstreamRow {
                job_run_id,
                dataset_urn,
                parent_urn,
                depth,
                producer_name,
            })
            .collect())
    }

    /// `QueryUpstreamWithChildren` (spec §4.2): mirror traversal, starting at
    /// the root job's inputs at depth 1 with `child_urn` set to the root
    /// dataset, then `input → output → input` backward.
    pub async fn query_upstream_with_children(&self, ctx: &Context, dataset_urn: &str, job_run_id: &str, max_depth: i32) -> Result<Vec<UpstreamRow>> {
        ctx.check()?;
        let cap = effective_depth_cap(max_depth);

        let rows: Vec<(String, String, String, i32)> = sqlx::query_as(
            r#"
            with recursive upstream(job_run_id, dataset_urn, child_urn, depth, path) as (
                select le_in.job_run_id, le_in.dataset_urn, $2::text, 1, array[le_in.dataset_urn]
                from lineage_edges le_in
                where le_in.job_run_id = $1 and le_in.edge_type = 'input'

                union all

                select le_in.job_run_id, le_in.dataset_urn, upstream.dataset_urn, upstream.depth + 1,
                       upstream.path || le_in.dataset_urn
                from upstream
                join lineage_edges le_out on le_out.dataset_urn = upstream.dataset_urn and le_out.edge_type = 'output'
                join lineage_edges le_in on le_in.job_run_id = le_out.job_run_id and le_in.edge_type = 'input'
                where upstream.depth < $3
                  and le_in.dataset_urn <> upstream.dataset_urn
                  and not (le_in.dataset_urn = any(upstream.path))
            )
            select job_run_id, dataset_urn, child_urn, depth from upstream order by depth, dataset_urn
            "#,
        )
        .bind(job_run_id)
        .bind(dataset_urn)
        .bind(cap)
        .fetch_all(self.pool.inner())
        .await
        .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        Ok(rows
            .into_iter()
            .map(|(job_run_id, dataset_urn, child_urn, depth)| UpstreamRow {
                job_run_id,
                dataset_urn,
                child_urn,
                depth,
            })
            .collect())
    }

    /// `QueryDownstreamCounts` (spec §4.2): batched distinct downstream
    /// dataset counts; empty input short-circuits without a round-trip.
    pub async fn query_downstream_counts(&self, ctx: &Context, job_run_ids: &[String]) -> Result<HashMap<String, i64>> {
        ctx.check()?;
        if job_run_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            select origin_job_run_id, count(distinct dataset_urn)
            from lineage_impact_analysis
            where origin_job_run_id = any($1) and depth > 0
            group by origin_job_run_id
            "#,
        )
        .bind(job_run_ids)
        .fetch_all(self.pool.inner())
        .await
        .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        Ok(rows.into_iter().collect())
    }

    /// `QueryRecentIncidents` (spec §4.2): the 7-day rolling summary view.
    pub async fn query_recent_incidents(&self, ctx: &Context, limit: i64) -> Result<Vec<RecentIncidentSummary>> {
        ctx.check()?;

        let rows: Vec<(String, Option<String>, Option<String>, i64, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            select dataset_urn, job_run_id, producer_name, failure_count, last_test_failure_at
            from recent_incidents_summary
            order by last_test_failure_at desc nulls last
            limit $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool.inner())
        .await
        .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        Ok(rows
            .into_iter()
            .map(|(dataset_urn, job_run_id, producer_name, failure_count, last_test_failure_at)| RecentIncidentSummary {
                dataset_urn,
                job_run_id,
                producer_name,
                failure_count,
                last_test_failure_at,
            })
            .collect())
    }

    /// `QueryOrphanDatasets` (spec §4.5): true-orphan procedure over
    /// tested-but-not-produced URNs.
    pub async fn query_orphan_datasets(&self, ctx: &Context) -> Result<Vec<OrphanDataset>> {
        ctx.check()?;

        let produced: Vec<(String,)> = sqlx::query_as("select distinct dataset_urn from lineage_edges where edge_type = 'output'")
            .fetch_all(self.pool.inner())
            .await
            .map_err(|e| Error::CorrelationQueryFailed { source: e })?;
        let produced_set: std::collections::HashSet<String> = produced.into_iter().map(|(u,)| u).collect();

        let mut produced_sorted: Vec<&String> = produced_set.iter().collect();
        produced_sorted.sort();
        let mut table_index: HashMap<String, String> = HashMap::new();
        for urn in produced_sorted {
            let table_name = table_name_from_urn(urn);
            if table_name.is_empty() {
                continue;
            }
            table_index.entry(table_name).or_insert_with(|| urn.clone());
        }

        let candidates: Vec<(String,)> = sqlx::query_as(
            r#"
            select distinct dataset_urn from test_results
            where dataset_urn <> all(coalesce($1, array[]::text[]))
            "#,
        )
        .bind(produced_set.iter().cloned().collect::<Vec<_>>())
        .fetch_all(self.pool.inner())
        .await
        .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        let orphans = candidates
            .into_iter()
            .filter_map(|(urn,)| {
                let resolved = self.resolver.resolve(&urn);
                if produced_set.contains(&resolved) {
                    return None; // resolves to a produced URN: not an orphan.
                }

                let likely_match = table_index.get(&table_name_from_urn(&urn)).map(|matched| LikelyMatch {
                    urn: matched.clone(),
                    confidence: 1.0,
                    reason: "exact_table_name".to_string(),
                });

                Some(OrphanDataset { dataset_urn: urn, likely_match })
            })
            .collect();

        Ok(orphans)
    }

    /// `QueryCorrelationHealth` (spec §4.5).
    pub async fn query_correlation_health(&self, ctx: &Context) -> Result<CorrelationHealth> {
        ctx.check()?;

        let (total_datasets,): (i64,) = sqlx::query_as("select count(*) from datasets")
            .fetch_one(self.pool.inner())
            .await
            .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        let (produced_datasets,): (i64,) =
            sqlx::query_as("select count(distinct dataset_urn) from lineage_edges where edge_type = 'output'")
                .fetch_one(self.pool.inner())
                .await
                .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        let orphans = self.query_orphan_datasets(ctx).await?;
        let suggested_patterns = self.suggester.suggest(&orphans);

        let correlation_rate = match self.compute_correlation_rate().await {
            Ok(rate) => rate,
            Err(e) => {
                tracing::warn!(error = %e, "resolver-aware correlation rate query failed, falling back to base stats");
                self.compute_base_correlation_rate().await?
            }
        };

        let correlated_datasets = (correlation_rate
            * failed_dataset_count(&self.pool)
                .await
                .unwrap_or(0) as f64)
            .round() as i64;

        Ok(CorrelationHealth {
            correlation_rate,
            total_datasets,
            produced_datasets,
            correlated_datasets,
            orphan_datasets: orphans,
            suggested_patterns,
        })
    }

    async fn compute_base_correlation_rate(&self) -> Result<f64> {
        let (total_failed,): (i64,) = sqlx::query_as(
            "select count(distinct dataset_urn) from test_results where status in ('failed', 'error')",
        )
        .fetch_one(self.pool.inner())
        .await
        .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        if total_failed == 0 {
            return Ok(1.0);
        }

        let (correlated_failed,): (i64,) = sqlx::query_as(
            r#"
            select count(distinct tr.dataset_urn)
            from test_results tr
            where tr.status in ('failed', 'error')
              and exists (select 1 from lineage_edges le where le.dataset_urn = tr.dataset_urn and le.edge_type = 'output')
            "#,
        )
        .fetch_one(self.pool.inner())
        .await
        .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        Ok(correlated_failed as f64 / total_failed as f64)
    }

    /// With a resolver configured: count distinct failed-test URNs whose
    /// resolved form is in the produced set, over the total distinct
    /// failed-test URNs (spec §4.5).
    async fn compute_correlation_rate(&self) -> Result<f64> {
        if self.resolver.get_pattern_count() == 0 {
            return self.compute_base_correlation_rate().await;
        }

        let produced: Vec<(String,)> = sqlx::query_as("select distinct dataset_urn from lineage_edges where edge_type = 'output'")
            .fetch_all(self.pool.inner())
            .await
            .map_err(|e| Error::CorrelationQueryFailed { source: e })?;
        let produced_set: std::collections::HashSet<String> = produced.into_iter().map(|(u,)| u).collect();

        let failed_urns: Vec<(String,)> = sqlx::query_as(
            "select distinct dataset_urn from test_results where status in ('failed', 'error')",
        )
        .fetch_all(self.pool.inner())
        .await
        .map_err(|e| Error::CorrelationQueryFailed { source: e })?;

        if failed_urns.is_empty() {
            return Ok(1.0);
        }

        let correlated = failed_urns
            .iter()
            .filter(|(urn,)| produced_set.contains(&self.resolver.resolve(urn)))
            .count();

        Ok(correlated as f64 / failed_urns.len() as f64)
    }
}

async fn failed_dataset_count(pool: &Pool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("select count(distinct dataset_urn) from test_results where status in ('failed', 'error')")
        .fetch_one(pool.inner())
        .await
        .map_err(|e| Error::CorrelationQueryFailed { source: e })?;
    Ok(count)
}

fn effective_depth_cap(max_depth: i32) -> i32 {
    if max_depth <= 0 {
        MAX_TRAVERSAL_DEPTH
    } else {
        max_depth.min(MAX_TRAVERSAL_DEPTH)
    }
}

struct ProducerRow {
    job_run_id: String,
    job_name: String,
    job_namespace: String,
    job_status: String,
    producer_name: String,
    producer_version: String,
}

struct TestRow {
    test_name: String,
    test_type: String,
    status: String,
    message: String,
    metadata: Value,
    executed_at: DateTime<Utc>,
    duration_ms: Option<i64>,
}

type ViewRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    Value,
    DateTime<Utc>,
    Option<i64>,
    String,
    String,
    String,
    String,
    String,
    String,
);

fn incident_from_view_row_no_total(row: ViewRow) -> Incident {
    let (
        test_result_id,
        test_name,
        test_type,
        dataset_urn,
        status,
        message,
        test_metadata,
        executed_at,
        duration_ms,
        job_run_id,
        job_name,
        job_namespace,
        job_status,
        producer_name,
        producer_version,
    ) = row;
    Incident {
        test_result_id,
        test_name,
        test_type,
        dataset_urn,
        status,
        message,
        test_metadata,
        executed_at,
        duration_ms,
        job_run_id,
        job_name,
        job_namespace,
        job_status,
        producer_name,
        producer_version,
    }
}

fn incident_from_view_row(
    row: (
        i64,
        String,
        String,
        String,
        String,
        String,
        Value,
        DateTime<Utc>,
        Option<i64>,
        String,
        String,
        String,
        String,
        String,
        String,
        i64,
    ),
) -> Incident {
    let (
        test_result_id,
        test_name,
        test_type,
        dataset_urn,
        status,
        message,
        test_metadata,
        executed_at,
        duration_ms,
        job_run_id,
        job_name,
        job_namespace,
        job_status,
        producer_name,
        producer_version,
        _total,
    ) = row;
    Incident {
        test_result_id,
        test_name,
        test_type,
        dataset_urn,
        status,
        message,
        test_metadata,
        executed_at,
        duration_ms,
        job_run_id,
        job_name,
        job_namespace,
        job_status,
        producer_name,
        producer_version,
    }
}

fn push_incident_filter(builder: &mut QueryBuilder<Postgres>, filter: &IncidentFilter, first: bool) {
    let mut any_clause = false;

    macro_rules! clause {
        ($col:expr, $val:expr) => {
            builder.push(if !any_clause { " where " } else { " and " });
            builder.push($col);
            builder.push(" = ");
            builder.push_bind($val.clone());
            any_clause = true;
        };
    }

    let _ = first;
    if let Some(v) = &filter.job_status {
        clause!("job_status", v);
    }
    if let Some(v) = &filter.producer_name {
        clause!("producer_name", v);
    }
    if let Some(v) = &filter.dataset_urn {
        clause!("dataset_urn", v);
    }
    if let Some(v) = &filter.job_run_id {
        clause!("job_run_id", v);
    }
    if let Some(tool) = &filter.tool {
        builder.push(if !any_clause { " where " } else { " and " });
        builder.push("job_run_id like ");
        builder.push_bind(format!("{tool}:%"));
        any_clause = true;
    }
    if let Some(after) = filter.test_executed_after {
        builder.push(if !any_clause { " where " } else { " and " });
        builder.push("executed_at > ");
        builder.push_bind(after);
        any_clause = true;
    }
    if let Some(before) = filter.test_executed_before {
        builder.push(if !any_clause { " where " } else { " and " });
        builder.push("executed_at < ");
        builder.push_bind(before);
    }
}
