//! Webhook invocation and result capture.

use crate::log::{ExecutionLog, ToolCall};
use crate::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Response header naming the execution the webhook kicked off.
const EXECUTION_ID_HEADER: &str = "execution_id";

/// Client for one workflow agent: the webhook that runs it and the
/// endpoint that serves its execution logs.
#[derive(Clone, Debug)]
pub struct AgentClient {
    http: reqwest::Client,
    webhook_url: String,
    log_url: String,
}

/// Outcome of one agent invocation.
///
/// Always produced, successful or not: a refused webhook or an unreachable
/// engine yields `execution_success == false` with a diagnostic message,
/// and the log-derived fields stay `None` until [`AgentClient::enrich`]
/// fills them in.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_success: bool,
    /// The agent's reply, or a diagnostic when the invocation failed.
    pub message: Option<String>,
    pub execution_id: Option<String>,
    pub workflow_name: Option<String>,
    pub input_query: Option<String>,
    pub token_total: Option<u64>,
    pub total_exec_ms: Option<f64>,
    pub tool_order: Option<Vec<String>>,
    pub tool_calls: Option<BTreeMap<String, Vec<ToolCall>>>,
    pub tool_call_counts: Option<BTreeMap<String, usize>>,
}

impl ExecutionResult {
    fn failed(message: String) -> Self {
        ExecutionResult {
            execution_success: false,
            message: Some(message),
            ..ExecutionResult::default()
        }
    }

    /// Copy the parsed log metrics into this result.
    pub fn with_log(mut self, log: ExecutionLog) -> Self {
        self.workflow_name = log.workflow_name;
        self.input_query = log.input_query;
        self.token_total = Some(log.token_total);
        self.total_exec_ms = log.total_exec_ms;
        self.tool_order = Some(log.tool_order);
        self.tool_calls = Some(log.tool_calls);
        self.tool_call_counts = Some(log.tool_call_counts);
        self
    }
}

impl AgentClient {
    /// Create a client from the webhook and log-retrieval endpoints.
    pub fn new(webhook_url: &str, log_url: &str) -> Self {
        AgentClient {
            http: reqwest::Client::new(),
            webhook_url: webhook_url.to_string(),
            log_url: log_url.to_string(),
        }
    }

    /// Hand a task prompt to the agent and wait for its reply.
    ///
    /// The payload names the FHIR server the agent should work against, so
    /// the agent and the harness observe the same data set. Failures do
    /// not propagate as errors: the returned result carries the diagnostic
    /// and `execution_success == false`, and the caller files its report
    /// as usual.
    pub async fn run(&self, prompt: &str, fhir_base_url: &str) -> ExecutionResult {
        let payload = serde_json::json!({
            "prompt": prompt,
            "fhir_server_url": fhir_base_url,
        });
        tracing::debug!("POST {} ({} byte prompt)", self.webhook_url, prompt.len());

        let response = match self.http.post(&self.webhook_url).json(&payload).send().await {
            Ok(response) => response,
            Err(err) => return ExecutionResult::failed(format!("webhook unreachable: {err}")),
        };

        let status = response.status();
        let execution_id = response
            .headers()
            .get(EXECUTION_ID_HEADER)
            .and_then(|raw| raw.to_str().ok())
            .map(String::from);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return ExecutionResult {
                execution_id,
                ..ExecutionResult::failed(format!("webhook returned {status}: {body}"))
            };
        }

        // Success payload is a one-element array whose entry holds the
        // agent's textual reply under `output`.
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                return ExecutionResult {
                    execution_id,
                    ..ExecutionResult::failed(format!("webhook reply is not JSON: {err}"))
                }
            }
        };
        let message = body
            .pointer("/0/output")
            .and_then(Value::as_str)
            .map(String::from);
        match message {
            Some(message) => ExecutionResult {
                execution_success: true,
                message: Some(message),
                execution_id,
                ..ExecutionResult::default()
            },
            None => ExecutionResult {
                execution_id,
                ..ExecutionResult::failed(format!("webhook reply has no output field: {body}"))
            },
        }
    }

    /// Retrieve and parse the execution log for a given execution id.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, a non-JSON body, or a log document with
    /// no run data.
    pub async fn fetch_log(&self, execution_id: &str) -> AgentResult<ExecutionLog> {
        tracing::debug!("GET {}?executionId={execution_id}", self.log_url);
        let response = self
            .http
            .get(&self.log_url)
            .query(&[("executionId", execution_id)])
            .send()
            .await?;
        let context = format!("execution log {execution_id}");
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).map_err(|source| AgentError::Decode {
            context,
            source,
        })?;
        ExecutionLog::parse(&body)
    }

    /// Attach log metrics to an invocation result.
    ///
    /// Best-effort: when the result has no execution id, or the log cannot
    /// be fetched or parsed, the result comes back unchanged and the
    /// problem is logged. A botched agent run should still produce a
    /// report, just a thinner one.
    pub async fn enrich(&self, result: ExecutionResult) -> ExecutionResult {
        match self.try_enrich(&result).await {
            Ok(log) => result.with_log(log),
            Err(err) => {
                tracing::warn!("could not enrich execution result: {err}");
                result
            }
        }
    }

    async fn try_enrich(&self, result: &ExecutionResult) -> AgentResult<ExecutionLog> {
        let execution_id = result
            .execution_id
            .as_deref()
            .ok_or(AgentError::MissingExecutionId)?;
        self.fetch_log(execution_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_log_copies_metrics() {
        let log = ExecutionLog {
            workflow_name: Some("scheduler-agent".to_string()),
            token_total: 600,
            total_exec_ms: Some(12500.0),
            tool_order: vec!["Webhook".to_string()],
            ..ExecutionLog::default()
        };
        let result = ExecutionResult {
            execution_success: true,
            message: Some("done".to_string()),
            execution_id: Some("8231".to_string()),
            ..ExecutionResult::default()
        }
        .with_log(log);

        assert!(result.execution_success);
        assert_eq!(result.workflow_name.as_deref(), Some("scheduler-agent"));
        assert_eq!(result.token_total, Some(600));
        assert_eq!(result.total_exec_ms, Some(12500.0));
        assert_eq!(result.tool_order.as_deref(), Some(&["Webhook".to_string()][..]));
        // The invocation fields survive enrichment.
        assert_eq!(result.message.as_deref(), Some("done"));
        assert_eq!(result.execution_id.as_deref(), Some("8231"));
    }

    #[test]
    fn failed_result_has_no_metrics() {
        let result = ExecutionResult::failed("webhook unreachable: timed out".to_string());
        assert!(!result.execution_success);
        assert_eq!(result.token_total, None);
        assert_eq!(result.tool_order, None);
        assert!(result
            .message
            .as_deref()
            .is_some_and(|msg| msg.contains("unreachable")));
    }
}
