use chrono::{DateTime, Utc};
use lc_ingest::{DatasetRef, JobRef, LineageEvent, RunRef};
use serde_json::{json, Value};

#[allow(dead_code)]
pub fn dbt_event(
    run_id: &str,
    event_type: &str,
    event_time: DateTime<Utc>,
    output_urn: &str,
    run_facets: Value,
) -> LineageEvent {
    let (namespace, name) = output_urn.split_once('/').unwrap();
    LineageEvent {
        event_type: event_type.to_string(),
        event_time,
        run: RunRef {
            run_id: run_id.to_string(),
            facets: run_facets,
        },
        job: JobRef {
            namespace: "analytics".to_string(),
            name: "build_customers".to_string(),
        },
        producer: "https://github.com/dbt-labs/dbt-core/tree/1.7.0".to_string(),
        inputs: Vec::new(),
        outputs: vec![DatasetRef {
            namespace: namespace.to_string(),
            name: name.to_string(),
            facets: json!({}),
        }],
    }
}
