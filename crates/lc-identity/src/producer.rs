/// Producer name + version extracted from an OpenLineage producer URL.
/// Bundled into one struct (rather than two loose strings) so call sites
/// can't transpose them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerInfo {
    pub name: String,
    pub version: String,
}

fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}

fn looks_like_version(segment: &str) -> bool {
    segment
        .chars()
        .next()
        .map(|c| c.is_ascii_digit() || c == 'v')
        .unwrap_or(false)
}

/// Parse a producer URL into `{name, version}`:
///
/// - Strip a leading `https://`/`http://`.
/// - Split on `/`. If the first segment is `github.com` and an
///   `integration` segment is present, the name is the segment after
///   `integration`; otherwise (still under `github.com`) the name is
///   segment index 2 (the repo name).
/// - Non-GitHub: the name is the first segment.
/// - Empty input (or an empty resulting name): `"unknown"`.
///
/// Version: for GitHub URLs, the segment after `tree/` when present;
/// otherwise the last path segment, if it looks like a version (starts with
/// a digit or `v`), else empty.
pub fn parse_producer_url(url: &str) -> ProducerInfo {
    let stripped = strip_scheme(url.trim());
    if stripped.is_empty() {
        return ProducerInfo {
            name: "unknown".to_string(),
            version: String::new(),
        };
    }

    let segments: Vec<&str> = stripped.split('/').collect();
    let is_github = segments.first() == Some(&"github.com");

    let name = if is_github {
        if let Some(idx) = segments.iter().position(|s| *s == "integration") {
            segments.get(idx + 1).copied()
        } else {
            segments.get(2).copied()
        }
    } else {
        segments.first().copied()
    }
    .filter(|s| !s.is_empty())
    .unwrap_or("unknown")
    .to_string();

    let version = if is_github {
        if let Some(idx) = segments.iter().position(|s| *s == "tree") {
            segments.get(idx + 1).map(|s| s.to_string())
        } else {
            None
        }
    } else {
        None
    }
    .or_else(|| {
        segments
            .last()
            .filter(|s| looks_like_version(s))
            .map(|s| s.to_string())
    })
    .unwrap_or_default();

    ProducerInfo { name, version }
}

/// `{tool}:{run_id}`, a canonical job-run id stable across a run's
/// lifecycle since `tool` is derived purely from the producer URL, not
/// from any mutable event state.
pub fn canonical_job_run_id(producer_url: &str, run_id: &str) -> String {
    let info = parse_producer_url(producer_url);
    format!("{}:{}", info.name, run_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_integration_segment_wins() {
        let info = parse_producer_url("https://github.com/openlineage/integration/dbt/tree/1.2.3");
        assert_eq!(info.name, "dbt");
    }

    #[test]
    fn github_without_integration_uses_repo_name() {
        let info = parse_producer_url("https://github.com/OpenLineage/OpenLineage/tree/main");
        assert_eq!(info.name, "OpenLineage");
    }

    #[test]
    fn non_github_uses_first_segment() {
        let info = parse_producer_url("https://greatexpectations.io/ge/v0.18");
        assert_eq!(info.name, "greatexpectations.io");
    }

    #[test]
    fn empty_url_is_unknown() {
        let info = parse_producer_url("");
        assert_eq!(info.name, "unknown");
        assert_eq!(info.version, "");
    }

    #[test]
    fn version_prefers_tree_segment() {
        let info = parse_producer_url("https://github.com/openlineage/integration/dbt/tree/1.2.3");
        assert_eq!(info.version, "1.2.3");
    }

    #[test]
    fn version_falls_back_to_trailing_version_looking_segment() {
        let info = parse_producer_url("https://greatexpectations.io/ge/v0.18");
        assert_eq!(info.version, "v0.18");
    }

    #[test]
    fn version_empty_when_last_segment_is_not_version_shaped() {
        let info = parse_producer_url("https://airflow.apache.org/providers/standard");
        assert_eq!(info.version, "");
    }

    #[test]
    fn canonical_id_joins_tool_and_run_id() {
        let id = canonical_job_run_id("https://github.com/dbt-labs/dbt-core/tree/1.7.0", "abc-123");
        assert_eq!(id, "dbt-core:abc-123");
    }
}
