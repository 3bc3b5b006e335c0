use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single OpenLineage run event (spec §4.3), as received from a producer.
/// This is the `RunEvent` shape the glossary describes: `run`, `job`,
/// `inputs`, `outputs`, `eventType`, `eventTime`, plus typed facets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LineageEvent {
    #[serde(rename = "eventType")]
    pub event_type: String,
    #[serde(rename = "eventTime")]
    pub event_time: DateTime<Utc>,
    pub run: RunRef,
    pub job: JobRef,
    pub producer: String,
    #[serde(default)]
    pub inputs: Vec<DatasetRef>,
    #[serde(default)]
    pub outputs: Vec<DatasetRef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunRef {
    #[serde(rename = "runId")]
    pub run_id: String,
    #[serde(default)]
    pub facets: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobRef {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetRef {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub facets: Value,
}

impl DatasetRef {
    /// `namespace/name` (spec §3 `Dataset` URN, `/` delimiter).
    pub fn urn(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// A standalone data-quality test result (spec §4.3 `StoreTestResult`),
/// independent of any single lineage event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewTestResult {
    pub test_name: String,
    #[serde(default)]
    pub test_type: String,
    pub dataset_urn: String,
    pub job_run_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub metadata: Value,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: Option<i64>,
}
