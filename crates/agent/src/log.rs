//! Execution-log parsing.
//!
//! The engine's log is a deep, loosely shaped JSON document. The parts the
//! harness cares about live under `data.resultData.runData`: one entry per
//! workflow node, each holding a list of run blocks with timings and
//! payloads. Everything else in the document varies between engine
//! versions, so extraction is tolerant throughout: a missing or odd-shaped
//! field becomes `None` or an empty collection, never an error. Only a log
//! with no `runData` at all is rejected.

use crate::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One run of a workflow node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Engine timestamp (epoch milliseconds) when the run started.
    pub start_time: Option<i64>,
    /// Time the node spent executing, in milliseconds.
    pub execution_ms: Option<f64>,
    /// The payload handed to the node, when one could be located.
    pub input: Option<Value>,
    /// The payload the node produced, when one could be located.
    pub output: Option<Value>,
}

/// Metrics distilled from one workflow execution log.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExecutionLog {
    /// Workflow name, falling back to the workflow id.
    pub workflow_name: Option<String>,
    /// The query or prompt that started the run.
    pub input_query: Option<String>,
    /// Output of the last node that produced one.
    pub final_output: Option<String>,
    /// Chat-model tokens consumed across the whole run.
    pub token_total: u64,
    /// Wall-clock duration, from the log's startedAt/stoppedAt stamps.
    pub total_exec_ms: Option<f64>,
    /// Node names ordered by each node's first start time.
    pub tool_order: Vec<String>,
    /// Every located run, per node.
    pub tool_calls: BTreeMap<String, Vec<ToolCall>>,
    /// Number of located runs per node.
    pub tool_call_counts: BTreeMap<String, usize>,
}

impl ExecutionLog {
    /// Distill a raw execution-log document.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::MalformedLog`] when the document has no
    /// `data.resultData.runData` object; anything else degrades.
    pub fn parse(log: &Value) -> AgentResult<Self> {
        let run_data = log
            .pointer("/data/resultData/runData")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                AgentError::MalformedLog("no data.resultData.runData object".to_string())
            })?;

        let workflow_name = log
            .pointer("/workflowData/name")
            .or_else(|| log.get("workflowId"))
            .and_then(Value::as_str)
            .map(String::from);

        // Node order: first start time of each node, ascending.
        let mut node_times: Vec<(&str, i64)> = run_data
            .iter()
            .filter_map(|(name, blocks)| {
                let start = blocks.pointer("/0/startTime")?.as_i64()?;
                Some((name.as_str(), start))
            })
            .collect();
        node_times.sort_by_key(|(_, start)| *start);
        let tool_order: Vec<String> = node_times.iter().map(|(name, _)| name.to_string()).collect();

        // Final output: latest-started node whose main payload has an
        // `output` field.
        let final_output = node_times.iter().rev().find_map(|(name, _)| {
            run_data
                .get(*name)
                .and_then(|blocks| blocks.pointer("/0/data/main/0/0/json/output"))
                .map(display_value)
        });

        let mut tool_calls: BTreeMap<String, Vec<ToolCall>> = BTreeMap::new();
        for (name, blocks) in run_data {
            let calls: Vec<ToolCall> = blocks
                .as_array()
                .map(|blocks| blocks.iter().filter_map(parse_call).collect())
                .unwrap_or_default();
            if !calls.is_empty() {
                tool_calls.insert(name.clone(), calls);
            }
        }
        let tool_call_counts = tool_calls
            .iter()
            .map(|(name, calls)| (name.clone(), calls.len()))
            .collect();

        // Chat-model nodes are recognised by shape: any run block carrying
        // a language-model token usage contributes to the total.
        let token_total = run_data
            .values()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(|block| {
                block
                    .pointer("/data/ai_languageModel/0/0/json/tokenUsage/totalTokens")
                    .and_then(Value::as_u64)
            })
            .sum();

        let input_query = tool_order.iter().find_map(|node| {
            let json = run_data.get(node)?.pointer("/0/data/main/0/0/json")?;
            json.get("chatInput")
                .or_else(|| json.get("query"))
                .or_else(|| json.pointer("/body/prompt"))
                .and_then(Value::as_str)
                .map(String::from)
        });

        let total_exec_ms = wall_clock_ms(log);

        Ok(ExecutionLog {
            workflow_name,
            input_query,
            final_output,
            token_total,
            total_exec_ms,
            tool_order,
            tool_calls,
            tool_call_counts,
        })
    }
}

/// Extract one [`ToolCall`] from a run block, or `None` when the block
/// carries neither a recognisable input nor output.
fn parse_call(block: &Value) -> Option<ToolCall> {
    let start_time = block.get("startTime").and_then(Value::as_i64);
    let execution_ms = block.get("executionTime").and_then(Value::as_f64);

    // An inputOverride takes precedence over the data block, but an empty
    // override means the engine recorded nothing there.
    let raw_in = block
        .get("inputOverride")
        .filter(|v| v.as_object().is_some_and(|m| !m.is_empty()))
        .or_else(|| block.get("data"));
    let input = raw_in.and_then(extract_input);

    let output = block.get("data").and_then(extract_output);

    if input.is_none() && output.is_none() {
        return None;
    }
    Some(ToolCall {
        start_time,
        execution_ms,
        input,
        output,
    })
}

fn extract_input(raw: &Value) -> Option<Value> {
    if raw.get("ai_tool").is_some() {
        return raw.pointer("/ai_tool/0/0/json/query").cloned();
    }
    if raw.get("ai_languageModel").is_some() {
        return raw.pointer("/ai_languageModel/0/0/json/messages").cloned();
    }
    if raw.get("ai_vectorStore").is_some() {
        return raw
            .pointer("/ai_vectorStore/0/0/json/query")
            .or_else(|| raw.pointer("/ai_vectorStore/0/0/json"))
            .cloned();
    }
    if raw.get("main").is_some() {
        let json = raw.pointer("/main/0/0/json")?;
        if json.is_object() {
            return json.get("body").or(Some(json)).cloned();
        }
        return None;
    }
    // Unrecognised node kind: keep the raw payload rather than losing it.
    raw.as_object()
        .is_some_and(|m| !m.is_empty())
        .then(|| raw.clone())
}

fn extract_output(data: &Value) -> Option<Value> {
    if data.get("ai_tool").is_some() {
        return data.pointer("/ai_tool/0/0/json/response").cloned();
    }
    if data.get("ai_vectorStore").is_some() {
        return data.pointer("/ai_vectorStore/0/0/json/response").cloned();
    }
    if data.get("ai_languageModel").is_some() {
        return data
            .pointer("/ai_languageModel/0/0/json/response/generations/0/0/text")
            .or_else(|| data.pointer("/ai_languageModel/0/0/json/response"))
            .cloned();
    }
    data.pointer("/main/0/0/json")
        .filter(|json| json.is_object())
        .cloned()
}

/// stoppedAt minus startedAt, when both stamps parse.
fn wall_clock_ms(log: &Value) -> Option<f64> {
    let parse = |key: &str| {
        log.get(key)
            .and_then(Value::as_str)
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
    };
    let started = parse("startedAt")?;
    let stopped = parse("stoppedAt")?;
    Some((stopped - started).num_milliseconds() as f64)
}

fn display_value(value: &Value) -> String {
    match value.as_str() {
        Some(text) => text.to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A trimmed but structurally faithful engine log: webhook trigger,
    /// agent node, one chat-model node with two runs, one tool node called
    /// twice, and a response node carrying the final output.
    fn canned_log() -> Value {
        json!({
            "id": "8231",
            "startedAt": "2025-04-25T09:00:00.000Z",
            "stoppedAt": "2025-04-25T09:00:12.500Z",
            "workflowData": { "name": "scheduler-agent" },
            "data": { "resultData": { "runData": {
                "Webhook": [{
                    "startTime": 1745571600000i64,
                    "executionTime": 3,
                    "data": { "main": [[{ "json": {
                        "body": { "prompt": "Find free slots for immunization" }
                    }}]] }
                }],
                "AI Agent": [{
                    "startTime": 1745571600100i64,
                    "executionTime": 11900,
                    "data": { "main": [[{ "json": {
                        "output": "Found 1 free slot: SLOT001"
                    }}]] }
                }],
                "Chat Model": [
                    {
                        "startTime": 1745571600200i64,
                        "executionTime": 900,
                        "data": { "ai_languageModel": [[{ "json": {
                            "response": { "generations": [[{ "text": "call getAllResources" }]] },
                            "tokenUsage": { "totalTokens": 420 }
                        }}]] }
                    },
                    {
                        "startTime": 1745571608000i64,
                        "executionTime": 700,
                        "data": { "ai_languageModel": [[{ "json": {
                            "response": { "generations": [[{ "text": "done" }]] },
                            "tokenUsage": { "totalTokens": 180 }
                        }}]] }
                    }
                ],
                "getAllResources": [
                    {
                        "startTime": 1745571601000i64,
                        "executionTime": 250,
                        "inputOverride": { "ai_tool": [[{ "json": {
                            "query": { "resourceType": "Slot", "status": "free" }
                        }}]] },
                        "data": { "ai_tool": [[{ "json": {
                            "response": "{\"resourceType\":\"Bundle\",\"total\":1}"
                        }}]] }
                    },
                    {
                        "startTime": 1745571605000i64,
                        "executionTime": 210,
                        "inputOverride": { "ai_tool": [[{ "json": {
                            "query": { "resourceType": "Slot", "status": "busy" }
                        }}]] },
                        "data": { "ai_tool": [[{ "json": {
                            "response": "{\"resourceType\":\"Bundle\",\"total\":1}"
                        }}]] }
                    }
                ]
            }}}
        })
    }

    #[test]
    fn orders_nodes_by_first_start_time() {
        let log = ExecutionLog::parse(&canned_log()).expect("parse canned log");
        assert_eq!(
            log.tool_order,
            vec!["Webhook", "AI Agent", "Chat Model", "getAllResources"]
        );
    }

    #[test]
    fn sums_tokens_across_chat_model_runs() {
        let log = ExecutionLog::parse(&canned_log()).expect("parse canned log");
        assert_eq!(log.token_total, 600);
    }

    #[test]
    fn collects_tool_calls_with_inputs_and_outputs() {
        let log = ExecutionLog::parse(&canned_log()).expect("parse canned log");

        let calls = &log.tool_calls["getAllResources"];
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].start_time, Some(1745571601000));
        assert_eq!(calls[0].execution_ms, Some(250.0));
        assert_eq!(
            calls[0].input,
            Some(json!({ "resourceType": "Slot", "status": "free" }))
        );
        assert_eq!(
            calls[0].output,
            Some(json!("{\"resourceType\":\"Bundle\",\"total\":1}"))
        );

        assert_eq!(log.tool_call_counts["getAllResources"], 2);
        assert_eq!(log.tool_call_counts["Chat Model"], 2);
    }

    #[test]
    fn chat_model_output_prefers_generation_text() {
        let log = ExecutionLog::parse(&canned_log()).expect("parse canned log");
        let calls = &log.tool_calls["Chat Model"];
        assert_eq!(calls[0].output, Some(json!("call getAllResources")));
    }

    #[test]
    fn finds_final_output_and_input_query() {
        let log = ExecutionLog::parse(&canned_log()).expect("parse canned log");
        assert_eq!(
            log.final_output.as_deref(),
            Some("Found 1 free slot: SLOT001")
        );
        assert_eq!(
            log.input_query.as_deref(),
            Some("Find free slots for immunization")
        );
        assert_eq!(log.workflow_name.as_deref(), Some("scheduler-agent"));
    }

    #[test]
    fn computes_wall_clock_duration() {
        let log = ExecutionLog::parse(&canned_log()).expect("parse canned log");
        assert_eq!(log.total_exec_ms, Some(12500.0));
    }

    #[test]
    fn degrades_when_time_stamps_are_missing() {
        let mut raw = canned_log();
        raw.as_object_mut().expect("log object").remove("stoppedAt");
        let log = ExecutionLog::parse(&raw).expect("parse without stoppedAt");
        assert_eq!(log.total_exec_ms, None);
        // Everything else still parses.
        assert_eq!(log.token_total, 600);
    }

    #[test]
    fn tolerates_empty_run_data() {
        let log = ExecutionLog::parse(&json!({
            "data": { "resultData": { "runData": {} } }
        }))
        .expect("empty runData is a valid log");
        assert!(log.tool_order.is_empty());
        assert!(log.tool_calls.is_empty());
        assert_eq!(log.token_total, 0);
        assert_eq!(log.final_output, None);
        assert_eq!(log.workflow_name, None);
    }

    #[test]
    fn rejects_log_without_run_data() {
        let err = ExecutionLog::parse(&json!({ "data": {} })).expect_err("no runData");
        assert!(matches!(err, AgentError::MalformedLog(_)));
    }

    #[test]
    fn falls_back_to_workflow_id() {
        let log = ExecutionLog::parse(&json!({
            "workflowId": "wf-77",
            "data": { "resultData": { "runData": {} } }
        }))
        .expect("parse with workflowId only");
        assert_eq!(log.workflow_name.as_deref(), Some("wf-77"));
    }

    #[test]
    fn skips_blocks_without_payloads() {
        let log = ExecutionLog::parse(&json!({
            "data": { "resultData": { "runData": {
                "Memory": [{ "startTime": 1, "executionTime": 2 }]
            }}}
        }))
        .expect("parse payload-free node");
        // The node ran, so it appears in the order, but it produced no
        // call record.
        assert_eq!(log.tool_order, vec!["Memory"]);
        assert!(log.tool_calls.is_empty());
    }

    #[test]
    fn webhook_input_prefers_the_request_body() {
        let log = ExecutionLog::parse(&canned_log()).expect("parse canned log");
        let calls = &log.tool_calls["Webhook"];
        assert_eq!(
            calls[0].input,
            Some(json!({ "prompt": "Find free slots for immunization" }))
        );
    }
}
