use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use lc_pool::Pool;
use lc_types::{ChangeNotifier, Context, EdgeType, Error, NoopNotifier, Result, RunState, TestStatus};
use serde_json::{json, Value};
use sqlx::{Postgres, Transaction};

use crate::event::{DatasetRef, JobRef, LineageEvent, NewTestResult};
use crate::facets::{extract_assertions, extract_parent_info};

const IDEMPOTENCY_TTL: ChronoDuration = ChronoDuration::hours(24);

/// Outcome of a single `store_event`/`store_test_result` call (spec §4.3):
/// exactly one of `stored`, `duplicate` is true on `Ok`; failures are `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreResult {
    pub stored: bool,
    pub duplicate: bool,
}

impl StoreResult {
    fn stored() -> Self {
        Self {
            stored: true,
            duplicate: false,
        }
    }

    fn duplicate() -> Self {
        Self {
            stored: false,
            duplicate: true,
        }
    }
}

/// Per-event outcome inside a `store_events` batch. `error` is set instead
/// of aborting the batch for anything short of a catastrophic
/// (cancellation / connection-class) failure.
#[derive(Debug)]
pub struct EventOutcome {
    pub stored: bool,
    pub duplicate: bool,
    pub error: Option<Error>,
}

impl From<StoreResult> for EventOutcome {
    fn from(r: StoreResult) -> Self {
        Self {
            stored: r.stored,
            duplicate: r.duplicate,
            error: None,
        }
    }
}

/// Ingestion writer (spec §4.3, component C4): idempotent, transactional
/// upsert of runs/datasets/edges/test-result assertions, gated by the
/// idempotency table, notifying C5 on commit.
#[derive(Clone)]
pub struct IngestWriter {
    pool: Pool,
    notifier: Arc<dyn ChangeNotifier>,
}

impl IngestWriter {
    pub fn new(pool: Pool, notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self { pool, notifier }
    }

    /// Construct without a refresh debouncer wired up (tests that read base
    /// tables directly, or a caller that refreshes views out-of-band).
    pub fn without_notifier(pool: Pool) -> Self {
        Self::new(pool, Arc::new(NoopNotifier))
    }

    /// `StoreEvent` (spec §4.3): validate preconditions, check idempotency,
    /// then run the full upsert sequence in one transaction with deferred
    /// FK constraints.
    pub async fn store_event(&self, ctx: &Context, event: &LineageEvent) -> Result<StoreResult> {
        ctx.check()?;
        validate_preconditions(event)?;

        let producer_info = lc_identity::parse_producer_url(&event.producer);
        let key = lc_identity::idempotency_key(
            &event.producer,
            &event.job.namespace,
            &event.job.name,
            &event.run.run_id,
            event.event_time,
            &event.event_type,
        );

        if idempotency_record_active(&self.pool, &key).await? {
            return Ok(StoreResult::duplicate());
        }

        let job_run_id = format!("{}:{}", producer_info.name, event.run.run_id);
        let run_state = RunState::parse(&event.event_type)?;

        let mut tx = self.pool.begin_tx(ctx).await?;
        sqlx::query("set constraints all deferred")
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::from_store_event("deferring constraints failed", e))?;

        upsert_job_run(
            &mut tx,
            &job_run_id,
            event,
            &producer_info,
            run_state,
        )
        .await?;

        for dataset in event.inputs.iter().chain(event.outputs.iter()) {
            upsert_dataset(&mut tx, dataset).await?;
        }

        for input in &event.inputs {
            insert_edge(&mut tx, &job_run_id, input, EdgeType::Input).await?;
        }
        for output in &event.outputs {
            insert_edge(&mut tx, &job_run_id, output, EdgeType::Output).await?;
        }

        // Step 6: dataQualityAssertions walking is non-blocking — logged
        // and skipped on failure, never fails the surrounding transaction.
        for input in &event.inputs {
            let urn = input.urn();
            for assertion in extract_assertions(&input.facets, &urn) {
                let status = if assertion.success {
                    TestStatus::Passed
                } else {
                    TestStatus::Failed
                };
                let metadata = assertion
                    .column
                    .as_ref()
                    .map(|c| json!({ "column": c }))
                    .unwrap_or_else(|| json!({}));

                if let Err(e) = upsert_assertion_test_result(
                    &mut tx,
                    &assertion.assertion,
                    &urn,
                    &job_run_id,
                    status,
                    event.event_time,
                    &metadata,
                )
                .await
                {
                    tracing::warn!(
                        dataset_urn = %urn,
                        assertion = %assertion.assertion,
                        error = %e,
                        "failed to record dataQualityAssertions test result, continuing"
                    );
                }
            }
        }

        record_idempotency(&mut tx, &key, event).await?;

        tx.commit()
            .await
            .map_err(|e| Error::from_store_event("commit failed", e))?;

        self.notifier.notify_data_changed();

        Ok(StoreResult::stored())
    }

    /// `StoreEvents` (spec §4.3): per-event transactions so one bad event
    /// doesn't poison the batch. Stops immediately (returning a catastrophic
    /// `Err`) on context cancellation or a connection-class driver error;
    /// everything else is attributed to the offending event's `error`.
    pub async fn store_events(&self, ctx: &Context, events: &[LineageEvent]) -> Result<Vec<EventOutcome>> {
        let mut results = Vec::with_capacity(events.len());

        for event in events {
            if ctx.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match self.store_event(ctx, event).await {
                Ok(r) => results.push(r.into()),
                Err(Error::Connection { source }) => {
                    return Err(Error::Connection { source });
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => results.push(EventOutcome {
                    stored: false,
                    duplicate: false,
                    error: Some(e),
                }),
            }
        }

        Ok(results)
    }

    /// `StoreTestResult` (spec §4.3): upsert on the natural key
    /// `(test_name, dataset_urn, executed_at)`, distinguishing insert vs
    /// update via `xmax = 0`.
    pub async fn store_test_result(&self, ctx: &Context, tr: &NewTestResult) -> Result<StoreResult> {
        ctx.check()?;
        if tr.test_name.trim().is_empty() || tr.dataset_urn.trim().is_empty() {
            return Err(Error::lineage_store_failed(
                "test_name and dataset_urn must be non-empty",
            ));
        }
        let status = TestStatus::parse(&tr.status)?;

        let mut conn = self.pool.inner().acquire().await?;
        let row: (bool,) = sqlx::query_as(
            r#"
            insert into test_results (
                test_name, test_type, dataset_urn, job_run_id, status, message,
                metadata, executed_at, duration_ms
            )
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            on conflict (test_name, dataset_urn, executed_at) do update set
                test_type = excluded.test_type,
                job_run_id = excluded.job_run_id,
                status = excluded.status,
                message = excluded.message,
                metadata = excluded.metadata,
                duration_ms = excluded.duration_ms,
                updated_at = now()
            returning (xmax = 0) as inserted
            "#,
        )
        .bind(&tr.test_name)
        .bind(&tr.test_type)
        .bind(&tr.dataset_urn)
        .bind(&tr.job_run_id)
        .bind(status.as_str())
        .bind(&tr.message)
        .bind(&tr.metadata)
        .bind(tr.executed_at)
        .bind(tr.duration_ms)
        .fetch_one(&mut *conn)
        .await
        .map_err(Error::from_test_result_write)?;

        Ok(StoreResult {
            stored: row.0,
            duplicate: !row.0,
        })
    }
}

fn validate_preconditions(event: &LineageEvent) -> Result<()> {
    if event.run.run_id.trim().is_empty() {
        return Err(Error::lineage_store_failed("run.id must not be empty"));
    }
    if event.job.name.trim().is_empty() {
        return Err(Error::lineage_store_failed("job.name must not be empty"));
    }
    if event.event_time.timestamp() == 0 {
        return Err(Error::lineage_store_failed("event_time must not be zero"));
    }
    Ok(())
}

async fn idempotency_record_active(pool: &Pool, key: &str) -> Result<bool> {
    let row: Option<(bool,)> = sqlx::query_as(
        "select expires_at > now() from lineage_event_idempotency where idempotency_key = $1",
    )
    .bind(key)
    .fetch_optional(pool.inner())
    .await
    .map_err(|e| {
        if Error::is_connection_class(&e) {
            Error::Connection { source: e }
        } else {
            Error::IdempotencyCheckFailed { source: e }
        }
    })?;

    Ok(row.map(|(active,)| active).unwrap_or(false))
}

async fn upsert_job_run(
    tx: &mut Transaction<'static, Postgres>,
    job_run_id: &str,
    event: &LineageEvent,
    producer_info: &lc_identity::ProducerInfo,
    run_state: RunState,
) -> Result<()> {
    let parent_info = extract_parent_info(&event.run.facets);
    let started_at = matches!(run_state, RunState::Start).then_some(event.event_time);
    let completed_at = run_state.is_terminal().then_some(event.event_time);
    let initial_history = json!([{
        "from": Value::Null,
        "to": run_state.as_str(),
        "event_time": event.event_time,
        "updated_at": Utc::now(),
    }]);

    sqlx::query(
        r#"
        insert into job_runs (
            job_run_id, run_id, job_name, job_namespace, current_state, event_type,
            event_time, started_at, completed_at, state_history, metadata,
            producer_name, producer_version, parent_job_run_id, root_parent_job_run_id
        )
        values (
            $1, $2, $3, $4, $5, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14
        )
        on conflict (job_run_id) do update set
            current_state = case when excluded.event_time > job_runs.event_time
                then excluded.current_state else job_runs.current_state end,
            event_type = case when excluded.event_time > job_runs.event_time
                then excluded.event_type else job_runs.event_type end,
            metadata = case when excluded.event_time > job_runs.event_time
                then excluded.metadata else job_runs.metadata end,
            event_time = greatest(job_runs.event_time, excluded.event_time),
            started_at = coalesce(job_runs.started_at, excluded.started_at),
            completed_at = case when excluded.event_time > job_runs.event_time
                then coalesce(excluded.completed_at, job_runs.completed_at)
                else job_runs.completed_at end,
            parent_job_run_id = case when job_runs.parent_job_run_id = ''
                then excluded.parent_job_run_id else job_runs.parent_job_run_id end,
            root_parent_job_run_id = case when job_runs.root_parent_job_run_id = ''
                then excluded.root_parent_job_run_id else job_runs.root_parent_job_run_id end
        "#,
    )
    .bind(job_run_id)
    .bind(&event.run.run_id)
    .bind(&event.job.name)
    .bind(&event.job.namespace)
    .bind(run_state.as_str())
    .bind(event.event_time)
    .bind(started_at)
    .bind(completed_at)
    .bind(initial_history)
    .bind(&event.run.facets)
    .bind(&producer_info.name)
    .bind(&producer_info.version)
    .bind(&parent_info.parent_job_run_id)
    .bind(&parent_info.root_parent_job_run_id)
    .execute(&mut **tx)
    .await
    .map_err(|e| Error::from_store_event("job_run upsert failed", e))?;

    Ok(())
}

async fn upsert_dataset(tx: &mut Transaction<'static, Postgres>, dataset: &DatasetRef) -> Result<()> {
    let urn = dataset.urn();
    sqlx::query(
        r#"
        insert into datasets (dataset_urn, name, namespace, facets)
        values ($1, $2, $3, $4)
        on conflict (dataset_urn) do update set
            facets = datasets.facets || excluded.facets,
            updated_at = now()
        "#,
    )
    .bind(&urn)
    .bind(&dataset.name)
    .bind(&dataset.namespace)
    .bind(&dataset.facets)
    .execute(&mut **tx)
    .await
    .map_err(|e| Error::from_store_event(format!("dataset upsert failed for {urn}"), e))?;

    Ok(())
}

async fn insert_edge(
    tx: &mut Transaction<'static, Postgres>,
    job_run_id: &str,
    dataset: &DatasetRef,
    edge_type: EdgeType,
) -> Result<()> {
    let urn = dataset.urn();
    let (input_facets, output_facets) = match edge_type {
        EdgeType::Input => (&dataset.facets, &Value::Null),
        EdgeType::Output => (&Value::Null, &dataset.facets),
    };

    sqlx::query(
        r#"
        insert into lineage_edges (job_run_id, dataset_urn, edge_type, input_facets, output_facets)
        values ($1, $2, $3, coalesce($4, '{}'::jsonb), coalesce($5, '{}'::jsonb))
        on conflict (job_run_id, dataset_urn, edge_type) do nothing
        "#,
    )
    .bind(job_run_id)
    .bind(&urn)
    .bind(edge_type.as_str())
    .bind(input_facets)
    .bind(output_facets)
    .execute(&mut **tx)
    .await
    .map_err(|e| Error::from_store_event(format!("edge insert failed for {urn}"), e))?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn upsert_assertion_test_result(
    tx: &mut Transaction<'static, Postgres>,
    assertion_name: &str,
    dataset_urn: &str,
    job_run_id: &str,
    status: TestStatus,
    executed_at: chrono::DateTime<Utc>,
    metadata: &Value,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into test_results (
            test_name, test_type, dataset_urn, job_run_id, status, metadata, executed_at
        )
        values ($1, 'dataQualityAssertions', $2, $3, $4, $5, $6)
        on conflict (test_name, dataset_urn, executed_at) do update set
            status = excluded.status,
            job_run_id = excluded.job_run_id,
            metadata = excluded.metadata,
            updated_at = now()
        "#,
    )
    .bind(assertion_name)
    .bind(dataset_urn)
    .bind(job_run_id)
    .bind(status.as_str())
    .bind(metadata)
    .bind(executed_at)
    .execute(&mut **tx)
    .await
    .map_err(Error::from_test_result_write)?;

    Ok(())
}

async fn record_idempotency(
    tx: &mut Transaction<'static, Postgres>,
    key: &str,
    event: &LineageEvent,
) -> Result<()> {
    let expires_at = Utc::now() + IDEMPOTENCY_TTL;
    let metadata = json!({
        "job_name": event.job.name,
        "job_namespace": event.job.namespace,
        "run_id": event.run.run_id,
        "event_type": event.event_type,
    });

    sqlx::query(
        r#"
        insert into lineage_event_idempotency (idempotency_key, expires_at, event_metadata)
        values ($1, $2, $3)
        on conflict (idempotency_key) do update set
            expires_at = excluded.expires_at,
            event_metadata = excluded.event_metadata
        "#,
    )
    .bind(key)
    .bind(expires_at)
    .bind(metadata)
    .execute(&mut **tx)
    .await
    .map_err(|e| Error::from_store_event("idempotency record failed", e))?;

    Ok(())
}
