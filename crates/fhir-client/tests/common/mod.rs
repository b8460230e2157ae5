//! In-process FHIR stub for exercising the client over real HTTP.
//!
//! A tiny axum app backed by an in-memory map: enough REST surface for
//! upsert, create, read, delete, and search with basic parameter matching.
//! Search pages are capped at two entries so the client's paging path runs
//! even with small data sets.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

const PAGE_LIMIT: usize = 2;

#[derive(Clone)]
struct StubState {
    resources: Arc<Mutex<HashMap<String, BTreeMap<String, Value>>>>,
    counter: Arc<Mutex<u64>>,
    base: String,
}

pub struct StubServer {
    pub base_url: String,
}

/// Bind a stub on an ephemeral port and serve it in the background.
pub async fn start() -> StubServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub address");
    let base = format!("http://{addr}/fhir");

    let state = StubState {
        resources: Arc::new(Mutex::new(HashMap::new())),
        counter: Arc::new(Mutex::new(0)),
        base: base.clone(),
    };
    let app = Router::new()
        .route("/fhir/metadata", get(metadata))
        .route("/fhir/:kind", get(search).post(create))
        .route("/fhir/:kind/:id", get(read).put(upsert).delete(remove))
        .with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve stub");
    });

    StubServer { base_url: base }
}

async fn metadata() -> Json<Value> {
    Json(json!({ "resourceType": "CapabilityStatement", "status": "active" }))
}

async fn upsert(
    State(state): State<StubState>,
    Path((kind, id)): Path<(String, String)>,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    body["id"] = json!(id);
    let mut resources = state.resources.lock().expect("stub lock");
    let existed = resources
        .entry(kind)
        .or_default()
        .insert(id, body.clone())
        .is_some();
    let status = if existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (status, Json(body))
}

async fn create(
    State(state): State<StubState>,
    Path(kind): Path<String>,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let id = match body.get("id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            let mut counter = state.counter.lock().expect("stub lock");
            *counter += 1;
            format!("gen-{counter}")
        }
    };
    body["id"] = json!(id);
    state
        .resources
        .lock()
        .expect("stub lock")
        .entry(kind)
        .or_default()
        .insert(id, body.clone());
    (StatusCode::CREATED, Json(body))
}

async fn read(
    State(state): State<StubState>,
    Path((kind, id)): Path<(String, String)>,
) -> (StatusCode, Json<Value>) {
    let resources = state.resources.lock().expect("stub lock");
    match resources.get(&kind).and_then(|of_kind| of_kind.get(&id)) {
        Some(body) => (StatusCode::OK, Json(body.clone())),
        None => (StatusCode::NOT_FOUND, Json(not_found(&kind, &id))),
    }
}

async fn remove(
    State(state): State<StubState>,
    Path((kind, id)): Path<(String, String)>,
) -> StatusCode {
    let mut resources = state.resources.lock().expect("stub lock");
    match resources.get_mut(&kind).and_then(|of_kind| of_kind.remove(&id)) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn search(
    State(state): State<StubState>,
    Path(kind): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let matched: Vec<Value> = {
        let resources = state.resources.lock().expect("stub lock");
        resources
            .get(&kind)
            .map(|of_kind| {
                of_kind
                    .values()
                    .filter(|resource| matches(resource, &params))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    };

    let count = params
        .get("_count")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(PAGE_LIMIT)
        .min(PAGE_LIMIT);
    let page = params
        .get("page")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1);
    let start = (page - 1) * count;

    let entries: Vec<Value> = matched
        .iter()
        .skip(start)
        .take(count)
        .map(|resource| json!({ "resource": resource }))
        .collect();

    let mut links = Vec::new();
    if start + count < matched.len() {
        let mut query: Vec<String> = params
            .iter()
            .filter(|(key, _)| key.as_str() != "page")
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        query.push(format!("page={}", page + 1));
        links.push(json!({
            "relation": "next",
            "url": format!("{}/{}?{}", state.base, kind, query.join("&"))
        }));
    }

    Json(json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": matched.len(),
        "link": links,
        "entry": entries
    }))
}

fn matches(resource: &Value, params: &HashMap<String, String>) -> bool {
    params.iter().all(|(key, value)| match key.as_str() {
        "_count" | "page" => true,
        "family" => resource["name"][0]["family"].as_str() == Some(value),
        "given" => resource["name"][0]["given"]
            .as_array()
            .map(|given| given.iter().any(|name| name.as_str() == Some(value)))
            .unwrap_or(false),
        "birthdate" => resource["birthDate"].as_str() == Some(value),
        "address-city" => resource["address"]
            .as_array()
            .map(|addresses| {
                addresses
                    .iter()
                    .any(|address| address["city"].as_str() == Some(value))
            })
            .unwrap_or(false),
        "service-type" => resource["serviceType"]
            .as_array()
            .map(|types| types.iter().any(|t| t["text"].as_str() == Some(value)))
            .unwrap_or(false),
        "start" => instant_matches(resource["start"].as_str(), value),
        other => field_matches(resource, other, value),
    })
}

/// `le`/`ge` prefixes compare ISO instants lexicographically; bare
/// values must match exactly.
fn instant_matches(actual: Option<&str>, param: &str) -> bool {
    let Some(actual) = actual else { return false };
    if let Some(bound) = param.strip_prefix("le") {
        actual <= bound
    } else if let Some(bound) = param.strip_prefix("ge") {
        actual >= bound
    } else {
        actual == param
    }
}

/// Generic matcher: plain string equality, or reference equality for
/// object/array-of-object fields.
fn field_matches(resource: &Value, field: &str, value: &str) -> bool {
    match resource.get(field) {
        Some(Value::String(text)) => text == value,
        Some(Value::Object(map)) => {
            map.get("reference").and_then(Value::as_str) == Some(value)
        }
        Some(Value::Array(items)) => items.iter().any(|item| {
            item.get("reference").and_then(Value::as_str) == Some(value)
        }),
        _ => false,
    }
}

fn not_found(kind: &str, id: &str) -> Value {
    json!({
        "resourceType": "OperationOutcome",
        "issue": [{
            "severity": "error",
            "code": "not-found",
            "diagnostics": format!("{kind}/{id} is not known")
        }]
    })
}
