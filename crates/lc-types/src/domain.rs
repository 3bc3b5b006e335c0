use crate::error::Error;
use serde::{Deserialize, Serialize};

/// OpenLineage run state, as carried on `job_runs.current_state`.
///
/// `Complete`, `Fail`, and `Abort` are terminal (I2): the DB trigger
/// `validate_job_run_state_transition` rejects any outgoing transition from
/// one of these except to itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Start,
    Running,
    Complete,
    Fail,
    Abort,
    Other,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Start => "START",
            RunState::Running => "RUNNING",
            RunState::Complete => "COMPLETE",
            RunState::Fail => "FAIL",
            RunState::Abort => "ABORT",
            RunState::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> crate::error::Result<Self> {
        match s {
            "START" => Ok(RunState::Start),
            "RUNNING" => Ok(RunState::Running),
            "COMPLETE" => Ok(RunState::Complete),
            "FAIL" => Ok(RunState::Fail),
            "ABORT" => Ok(RunState::Abort),
            "OTHER" => Ok(RunState::Other),
            other => Err(Error::lineage_store_failed(format!(
                "invalid run state: {other}"
            ))),
        }
    }

    /// `true` for {COMPLETE, FAIL, ABORT} (I2).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Complete | RunState::Fail | RunState::Abort)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `lineage_edges.edge_type`: which side of a run a dataset sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeType {
    Input,
    Output,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Input => "input",
            EdgeType::Output => "output",
        }
    }

    pub fn parse(s: &str) -> crate::error::Result<Self> {
        match s {
            "input" => Ok(EdgeType::Input),
            "output" => Ok(EdgeType::Output),
            other => Err(Error::InvalidEdgeType(other.to_string())),
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `test_results.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    Passed,
    Failed,
    Error,
    Skipped,
    Warning,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Error => "error",
            TestStatus::Skipped => "skipped",
            TestStatus::Warning => "warning",
        }
    }

    pub fn parse(s: &str) -> crate::error::Result<Self> {
        match s {
            "passed" => Ok(TestStatus::Passed),
            "failed" => Ok(TestStatus::Failed),
            "error" => Ok(TestStatus::Error),
            "skipped" => Ok(TestStatus::Skipped),
            "warning" => Ok(TestStatus::Warning),
            other => Err(Error::lineage_store_failed(format!(
                "invalid test status: {other}"
            ))),
        }
    }

    /// `true` for {failed, error} — the statuses that make a test result an
    /// "incident" candidate when looking one up by id.
    pub fn is_failing(&self) -> bool {
        matches!(self, TestStatus::Failed | TestStatus::Error)
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
