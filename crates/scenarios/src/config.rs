//! Runtime configuration, resolved from the environment once at startup.

use std::path::{Path, PathBuf};

use crate::{ScenarioError, ScenarioResult};

/// Where the harness finds the FHIR server, the workflow engine, and the
/// report directory.
#[derive(Clone, Debug)]
pub struct EvalConfig {
    fhir_base_url: String,
    agent_webhook_url: Option<String>,
    agent_log_url: Option<String>,
    report_dir: PathBuf,
}

impl EvalConfig {
    /// Read the configuration from the environment.
    ///
    /// `FHIR_BASE_URL` is required. `AGENT_WEBHOOK_URL` and
    /// `AGENT_LOG_URL` are optional and gate agent mode. Reports land in
    /// `EVALS_REPORT_DIR`, defaulting to `reports`.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::MissingEnv`] when `FHIR_BASE_URL` is
    /// absent or blank.
    pub fn from_env() -> ScenarioResult<Self> {
        let fhir_base_url =
            optional("FHIR_BASE_URL").ok_or(ScenarioError::MissingEnv("FHIR_BASE_URL"))?;
        let report_dir = optional("EVALS_REPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("reports"));

        Ok(EvalConfig {
            fhir_base_url,
            agent_webhook_url: optional("AGENT_WEBHOOK_URL"),
            agent_log_url: optional("AGENT_LOG_URL"),
            report_dir,
        })
    }

    pub fn fhir_base_url(&self) -> &str {
        &self.fhir_base_url
    }

    pub fn agent_webhook_url(&self) -> Option<&str> {
        self.agent_webhook_url.as_deref()
    }

    pub fn agent_log_url(&self) -> Option<&str> {
        self.agent_log_url.as_deref()
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    /// Override the report directory, e.g. from a CLI flag.
    pub fn set_report_dir(&mut self, dir: PathBuf) {
        self.report_dir = dir;
    }

    /// Both agent endpoints are configured.
    pub fn agent_configured(&self) -> bool {
        self.agent_webhook_url.is_some() && self.agent_log_url.is_some()
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
