//! Per-scenario outcome records, filed as JSON for offline review.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use agent_client::ExecutionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::failure::FailureMode;
use crate::{ScenarioError, ScenarioResult};

/// How a scenario was driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// The harness performs the task itself over plain HTTP.
    Human,
    /// The external workflow engine performs the task.
    Agent,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Human => write!(f, "human"),
            Mode::Agent => write!(f, "agent"),
        }
    }
}

/// Agent-run metrics carried into the report.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: Option<String>,
    pub workflow_name: Option<String>,
    pub input_query: Option<String>,
    pub token_total: Option<u64>,
    pub total_exec_ms: Option<f64>,
    pub tool_order: Option<Vec<String>>,
    pub tool_call_counts: Option<BTreeMap<String, usize>>,
}

impl From<&ExecutionResult> for ExecutionSummary {
    fn from(result: &ExecutionResult) -> Self {
        ExecutionSummary {
            execution_id: result.execution_id.clone(),
            workflow_name: result.workflow_name.clone(),
            input_query: result.input_query.clone(),
            token_total: result.token_total,
            total_exec_ms: result.total_exec_ms,
            tool_order: result.tool_order.clone(),
            tool_call_counts: result.tool_call_counts.clone(),
        }
    }
}

/// Outcome record for one scenario run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub run_id: Uuid,
    pub scenario_id: String,
    pub name: String,
    pub mode: Mode,
    pub passed: bool,
    /// Why the run failed, verbatim from the first failing check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Tool-level diagnosis of a failed agent run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_mode: Option<FailureMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionSummary>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ScenarioReport {
    /// Start a report for a scenario about to run.
    pub fn begin(scenario_id: &str, name: &str, mode: Mode) -> Self {
        ScenarioReport {
            run_id: Uuid::new_v4(),
            scenario_id: scenario_id.to_string(),
            name: name.to_string(),
            mode,
            passed: false,
            failure: None,
            failure_mode: None,
            execution: None,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// Close the report with the outcome and the elapsed wall clock.
    pub fn finish(&mut self, outcome: Result<(), ScenarioError>) {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        self.duration_ms = elapsed.num_milliseconds().max(0) as u64;
        match outcome {
            Ok(()) => self.passed = true,
            Err(err) => self.failure = Some(err.to_string()),
        }
    }

    pub fn file_name(&self) -> String {
        format!("task_{}_report.json", self.scenario_id)
    }

    /// Write the report as pretty JSON under `dir`, creating the
    /// directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::ReportEncode`] or
    /// [`ScenarioError::ReportWrite`] naming the target path.
    pub fn write(&self, dir: &Path) -> ScenarioResult<PathBuf> {
        let path = dir.join(self.file_name());
        let encoded = serde_json::to_string_pretty(self).map_err(|source| {
            ScenarioError::ReportEncode {
                path: path.clone(),
                source,
            }
        })?;
        fs::create_dir_all(dir).map_err(|source| ScenarioError::ReportWrite {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, encoded).map_err(|source| ScenarioError::ReportWrite {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Pass/fail tally across one invocation of the harness.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, passed: bool) {
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_records_outcome_and_duration() {
        let mut report = ScenarioReport::begin("02a", "search existing patient", Mode::Human);
        report.finish(Ok(()));
        assert!(report.passed);
        assert!(report.failure.is_none());

        let mut report = ScenarioReport::begin("02a", "search existing patient", Mode::Agent);
        report.finish(Err(ScenarioError::MissingEnv("FHIR_BASE_URL")));
        assert!(!report.passed);
        assert!(report.failure.as_deref().unwrap().contains("FHIR_BASE_URL"));
    }

    #[test]
    fn report_round_trips_through_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = ScenarioReport::begin("11", "find free slots", Mode::Human);
        report.finish(Ok(()));

        let path = report.write(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "task_11_report.json");

        let raw = std::fs::read_to_string(&path).unwrap();
        let read_back: ScenarioReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(read_back.run_id, report.run_id);
        assert_eq!(read_back.scenario_id, "11");
        assert_eq!(read_back.mode, Mode::Human);
        assert!(read_back.passed);
        // Skipped fields stay out of the file entirely.
        assert!(!raw.contains("failure"));
    }

    #[test]
    fn summary_tallies_and_judges() {
        let mut summary = RunSummary::default();
        summary.record(true);
        summary.record(true);
        assert!(summary.all_passed());

        summary.record(false);
        assert_eq!(summary.total(), 3);
        assert!(!summary.all_passed());
    }
}
