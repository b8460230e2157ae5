//! The evaluation scenario suite.
//!
//! A [`Scenario`] is one clinical task the workflow agent is graded on.
//! It seeds the server into a known state, performs or delegates the
//! task, and then asserts the resulting server state together with the
//! shape of the final answer. Every scenario runs in two modes:
//!
//! - human: [`Scenario::act`] performs the task over plain HTTP and
//!   answers the way a correct agent would
//! - agent: the prompt goes to the workflow engine and only the answer
//!   comes back
//!
//! In both modes [`Scenario::verify`] re-queries the server afterwards,
//! so a run passes only when the end state is right, never because the
//! answer merely sounds right.

pub mod checks;
pub mod config;
pub mod failure;
pub mod report;
pub mod suite;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::checks::{CheckError, CheckResult};
use crate::failure::ToolExpectations;
use fhir_client::{FhirClient, FhirError};

/// Errors surfaced while preparing, running, or reporting a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("FHIR request failed: {0}")]
    Fhir(#[from] FhirError),

    #[error("{0}")]
    Check(#[from] CheckError),

    #[error("agent run failed: {0}")]
    Agent(String),

    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("failed to write report {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode report {path}: {source}")]
    ReportEncode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Type alias for Results that can fail with a [`ScenarioError`].
pub type ScenarioResult<T> = Result<T, ScenarioError>;

/// One graded clinical task.
///
/// Implementations hold their fixture ids and know nothing about run
/// modes or report files; the runner owns sequencing and bookkeeping.
#[async_trait]
pub trait Scenario: Send + Sync {
    /// Stable id used in report file names, e.g. `02a`.
    fn id(&self) -> &'static str;

    /// Short human-readable task name.
    fn name(&self) -> &'static str;

    /// The task as handed to the workflow agent, answer format included.
    fn prompt(&self) -> String;

    /// Put the server into this scenario's starting state.
    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()>;

    /// Perform the task over plain HTTP and answer like the agent would.
    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String>;

    /// Re-query the server and assert the end state.
    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()>;

    /// Tool usage a correct agent run shows. Consulted only to classify
    /// a failure, never to pass a run.
    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations::default()
    }

    /// Assert the shape of the final answer, whichever mode produced it.
    fn check_answer(&self, _answer: &str) -> CheckResult<()> {
        Ok(())
    }
}

/// Every scenario, in suite order.
pub fn registry() -> Vec<Box<dyn Scenario>> {
    suite::all()
}
