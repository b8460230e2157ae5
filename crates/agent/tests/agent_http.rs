//! Agent client behaviour against an in-process engine stub.

use agent_client::{AgentClient, AgentError};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct StubState {
    /// Last payload the webhook received.
    prompts: Arc<Mutex<Vec<Value>>>,
}

/// Serve a minimal engine: a webhook answering with an output array plus
/// an `execution_id` header, and a log endpoint keyed by `executionId`.
async fn start_stub() -> (String, String, StubState) {
    let state = StubState::default();
    let app = Router::new()
        .route("/webhook/agent", post(webhook))
        .route("/webhook/executions", get(execution_log))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve stub");
    });

    (
        format!("http://{addr}/webhook/agent"),
        format!("http://{addr}/webhook/executions"),
        state,
    )
}

async fn webhook(
    State(state): State<StubState>,
    Json(payload): Json<Value>,
) -> (HeaderMap, Json<Value>) {
    state.prompts.lock().expect("stub lock").push(payload);
    let mut headers = HeaderMap::new();
    headers.insert("execution_id", HeaderValue::from_static("8231"));
    (
        headers,
        Json(json!([{ "output": "Found 1 free slot: SLOT001" }])),
    )
}

async fn execution_log(
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    if params.get("executionId").map(String::as_str) != Some("8231") {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({
        "startedAt": "2025-04-25T09:00:00Z",
        "stoppedAt": "2025-04-25T09:00:10Z",
        "workflowData": { "name": "scheduler-agent" },
        "data": { "resultData": { "runData": {
            "Webhook": [{
                "startTime": 1745571600000i64,
                "executionTime": 3,
                "data": { "main": [[{ "json": {
                    "body": { "prompt": "Find free slots" }
                }}]] }
            }],
            "getAllResources": [{
                "startTime": 1745571601000i64,
                "executionTime": 250,
                "inputOverride": { "ai_tool": [[{ "json": {
                    "query": { "resourceType": "Slot", "status": "free" }
                }}]] },
                "data": { "ai_tool": [[{ "json": { "response": "ok" } }]] }
            }]
        }}}
    })))
}

#[tokio::test]
async fn run_returns_output_and_execution_id() {
    let (webhook_url, log_url, state) = start_stub().await;
    let client = AgentClient::new(&webhook_url, &log_url);

    let result = client
        .run("Find free slots", "http://fhir.test/fhir")
        .await;
    assert!(result.execution_success);
    assert_eq!(result.message.as_deref(), Some("Found 1 free slot: SLOT001"));
    assert_eq!(result.execution_id.as_deref(), Some("8231"));

    // The webhook saw both the prompt and the server it should target.
    let prompts = state.prompts.lock().expect("stub lock");
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0]["prompt"], "Find free slots");
    assert_eq!(prompts[0]["fhir_server_url"], "http://fhir.test/fhir");
}

#[tokio::test]
async fn run_survives_unreachable_webhook() {
    // Nothing listens on this port.
    let client = AgentClient::new("http://127.0.0.1:1/webhook/agent", "http://127.0.0.1:1/log");
    let result = client.run("anything", "http://fhir.test/fhir").await;
    assert!(!result.execution_success);
    assert!(result
        .message
        .as_deref()
        .is_some_and(|msg| msg.contains("unreachable")));
    assert_eq!(result.execution_id, None);
}

#[tokio::test]
async fn fetch_log_parses_the_run_record() {
    let (webhook_url, log_url, _state) = start_stub().await;
    let client = AgentClient::new(&webhook_url, &log_url);

    let log = client.fetch_log("8231").await.expect("fetch log");
    assert_eq!(log.workflow_name.as_deref(), Some("scheduler-agent"));
    assert_eq!(log.tool_order, vec!["Webhook", "getAllResources"]);
    assert_eq!(log.total_exec_ms, Some(10000.0));
    assert_eq!(log.input_query.as_deref(), Some("Find free slots"));
}

#[tokio::test]
async fn fetch_log_rejects_unknown_execution() {
    let (webhook_url, log_url, _state) = start_stub().await;
    let client = AgentClient::new(&webhook_url, &log_url);

    // The stub answers 404 with an empty body, which is not a log.
    let err = client.fetch_log("9999").await.expect_err("unknown id");
    assert!(matches!(err, AgentError::Decode { .. }));
}

#[tokio::test]
async fn enrich_attaches_log_metrics() {
    let (webhook_url, log_url, _state) = start_stub().await;
    let client = AgentClient::new(&webhook_url, &log_url);

    let result = client.run("Find free slots", "http://fhir.test/fhir").await;
    let result = client.enrich(result).await;

    assert!(result.execution_success);
    assert_eq!(result.workflow_name.as_deref(), Some("scheduler-agent"));
    assert_eq!(result.total_exec_ms, Some(10000.0));
    assert_eq!(
        result.tool_order.as_deref(),
        Some(&["Webhook".to_string(), "getAllResources".to_string()][..])
    );
    assert_eq!(
        result
            .tool_call_counts
            .as_ref()
            .and_then(|counts| counts.get("getAllResources")),
        Some(&1)
    );
}

#[tokio::test]
async fn enrich_without_execution_id_is_a_no_op() {
    let (webhook_url, log_url, _state) = start_stub().await;
    let client = AgentClient::new(&webhook_url, &log_url);

    let bare = agent_client::ExecutionResult::default();
    let result = client.enrich(bare).await;
    assert_eq!(result.workflow_name, None);
    assert_eq!(result.tool_order, None);
}
