use serde_json::Value;

/// Parent/root job-run ids extracted from a run's `parent` facet (spec
/// §4.3, §9). Empty strings mean "absent" — never fabricated from a
/// sibling field (design note: root is *not* defaulted to parent).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentInfo {
    pub parent_job_run_id: String,
    pub root_parent_job_run_id: String,
}

fn checked_str<'a>(obj: &'a Value, key: &str, context: &str) -> Option<&'a str> {
    match obj.get(key) {
        None => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(other) => {
            tracing::warn!(context, key, value = %other, "expected string facet field, skipping");
            None
        }
    }
}

fn checked_obj<'a>(obj: &'a Value, key: &str, context: &str) -> Option<&'a serde_json::Map<String, Value>> {
    match obj.get(key) {
        None => None,
        Some(Value::Object(m)) => Some(m),
        Some(other) => {
            tracing::warn!(context, key, value = %other, "expected object facet field, skipping");
            None
        }
    }
}

/// `{namespace}:{runId}` from a `{job: {namespace}, run: {runId}}` pair,
/// or `""` if both components are missing (never fabricated from one alone
/// producing a half-formed id is still reported, per spec: "empty/missing
/// components → empty string, do not fabricate" — only a *wholly* absent
/// parent/root object collapses to `""`).
fn job_run_id_of(container: &serde_json::Map<String, Value>, context: &str) -> String {
    let container = Value::Object(container.clone());
    let namespace = checked_obj(&container, "job", context)
        .and_then(|job| checked_str(&Value::Object(job.clone()), "namespace", context))
        .unwrap_or("")
        .to_string();
    let run_id = checked_obj(&container, "run", context)
        .and_then(|run| checked_str(&Value::Object(run.clone()), "runId", context))
        .unwrap_or("")
        .to_string();

    if namespace.is_empty() && run_id.is_empty() {
        String::new()
    } else {
        format!("{namespace}:{run_id}")
    }
}

/// Defensively walk a run's `facets.parent` object (spec §4.3/§9): a
/// malformed or absent branch at any level logs a warning and is treated as
/// absent, never panics.
pub fn extract_parent_info(run_facets: &Value) -> ParentInfo {
    let Some(parent) = checked_obj(run_facets, "parent", "parent_facet") else {
        return ParentInfo::default();
    };

    let parent_job_run_id = job_run_id_of(parent, "parent_facet.parent");

    let root_parent_job_run_id = checked_obj(&Value::Object(parent.clone()), "root", "parent_facet.root")
        .map(|root| job_run_id_of(root, "parent_facet.root"))
        .unwrap_or_default();

    ParentInfo {
        parent_job_run_id,
        root_parent_job_run_id,
    }
}

/// One `dataQualityAssertions` entry (spec §4.3 step 6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub assertion: String,
    pub success: bool,
    pub column: Option<String>,
}

/// Walk an input dataset's `facets.dataQualityAssertions.assertions` array
/// defensively. `success` missing/malformed defaults to `false` (spec:
/// "missing/malformed success → default failed, log a warning"). An entry
/// missing its `assertion` name is skipped entirely (nothing meaningful to
/// upsert a `TestResult` against).
pub fn extract_assertions(dataset_facets: &Value, context: &str) -> Vec<Assertion> {
    let Some(dqa) = checked_obj(dataset_facets, "dataQualityAssertions", context) else {
        return Vec::new();
    };
    let Some(Value::Array(items)) = dqa.get("assertions") else {
        if dqa.contains_key("assertions") {
            tracing::warn!(context, "dataQualityAssertions.assertions is not an array, skipping");
        }
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let Value::Object(_) = item else {
                tracing::warn!(context, "assertion entry is not an object, skipping");
                return None;
            };
            let assertion = checked_str(item, "assertion", context)?.to_string();
            let success = match item.get("success") {
                Some(Value::Bool(b)) => *b,
                Some(other) => {
                    tracing::warn!(context, assertion, value = %other, "assertion.success is not a bool, defaulting to failed");
                    false
                }
                None => {
                    tracing::warn!(context, assertion, "assertion.success missing, defaulting to failed");
                    false
                }
            };
            let column = checked_str(item, "column", context).map(str::to_string);
            Some(Assertion {
                assertion,
                success,
                column,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_parent_and_root() {
        let facets = json!({
            "parent": {
                "job": {"namespace": "dbt", "name": "build"},
                "run": {"runId": "run-1"},
                "root": {
                    "job": {"namespace": "airflow", "name": "dag"},
                    "run": {"runId": "run-0"}
                }
            }
        });
        let info = extract_parent_info(&facets);
        assert_eq!(info.parent_job_run_id, "dbt:run-1");
        assert_eq!(info.root_parent_job_run_id, "airflow:run-0");
    }

    #[test]
    fn root_absent_is_empty_not_defaulted_to_parent() {
        let facets = json!({
            "parent": {
                "job": {"namespace": "dbt", "name": "build"},
                "run": {"runId": "run-1"}
            }
        });
        let info = extract_parent_info(&facets);
        assert_eq!(info.parent_job_run_id, "dbt:run-1");
        assert_eq!(info.root_parent_job_run_id, "");
    }

    #[test]
    fn missing_parent_facet_is_all_empty() {
        let info = extract_parent_info(&json!({}));
        assert_eq!(info, ParentInfo::default());
    }

    #[test]
    fn malformed_parent_does_not_panic() {
        let info = extract_parent_info(&json!({"parent": "not-an-object"}));
        assert_eq!(info, ParentInfo::default());
    }

    #[test]
    fn assertions_default_missing_success_to_failed() {
        let facets = json!({
            "dataQualityAssertions": {
                "assertions": [
                    {"assertion": "not_null_id", "success": true},
                    {"assertion": "unique_id"},
                    {"assertion": "accepted_values_status", "success": "yes"}
                ]
            }
        });
        let assertions = extract_assertions(&facets, "test");
        assert_eq!(assertions.len(), 3);
        assert!(assertions[0].success);
        assert!(!assertions[1].success);
        assert!(!assertions[2].success);
    }

    #[test]
    fn assertion_column_is_optional() {
        let facets = json!({
            "dataQualityAssertions": {
                "assertions": [{"assertion": "not_null_id", "success": true, "column": "id"}]
            }
        });
        let assertions = extract_assertions(&facets, "test");
        assert_eq!(assertions[0].column.as_deref(), Some("id"));
    }

    #[test]
    fn no_dqa_facet_yields_empty_vec() {
        assert!(extract_assertions(&json!({}), "test").is_empty());
    }
}
