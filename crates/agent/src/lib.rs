//! Client for the workflow-automation agent boundary.
//!
//! Scenarios can be driven two ways: a deterministic human path over plain
//! FHIR HTTP, or by handing the task prompt to an external workflow agent
//! through its webhook. This crate owns the second path:
//! - [`AgentClient`]: invoke the webhook, retrieve the execution log
//! - [`ExecutionResult`]: what came back, enriched with log metrics
//! - [`ExecutionLog`] / [`ToolCall`]: the parsed run record
//!
//! The workflow engine itself is a black box. Everything here shapes one
//! request and reads one log document; engine failures degrade into an
//! unsuccessful [`ExecutionResult`] rather than aborting the run, so the
//! harness can still file a report for a run the agent botched.

pub mod client;
pub mod log;

pub use client::{AgentClient, ExecutionResult};
pub use log::{ExecutionLog, ToolCall};

/// Errors returned by the agent boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response from {context} is not valid JSON: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("execution carries no execution id")]
    MissingExecutionId,

    #[error("malformed execution log: {0}")]
    MalformedLog(String),
}

/// Type alias for Results that can fail with an [`AgentError`].
pub type AgentResult<T> = Result<T, AgentError>;
