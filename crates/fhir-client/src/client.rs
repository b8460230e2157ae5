//! FHIR REST client and response capture.

use crate::bundle::Bundle;
use crate::{FhirError, FhirResult};
use evals_types::{Resource, ResourceKind};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;

const FHIR_JSON: &str = "application/fhir+json";

/// Longest body excerpt embedded in an error message.
const ERROR_BODY_LIMIT: usize = 600;

// ============================================================================
// Client
// ============================================================================

/// Async client bound to one FHIR server base URL.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone, Debug)]
pub struct FhirClient {
    http: reqwest::Client,
    base: String,
}

impl FhirClient {
    /// Create a client for the given server root, e.g.
    /// `http://localhost:7070/fhir`. A trailing slash is tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidBaseUrl`] when the URL does not parse
    /// or uses a scheme other than http/https.
    pub fn new(base_url: &str) -> FhirResult<Self> {
        let trimmed = base_url.trim_end_matches('/');
        let parsed = reqwest::Url::parse(trimmed)
            .map_err(|err| FhirError::InvalidBaseUrl(format!("{trimmed}: {err}")))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(FhirError::InvalidBaseUrl(format!(
                    "unsupported scheme '{other}' in {trimmed}"
                )))
            }
        }
        Ok(FhirClient {
            http: reqwest::Client::new(),
            base: trimmed.to_string(),
        })
    }

    /// The server root this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn type_url(&self, kind: ResourceKind) -> String {
        format!("{}/{}", self.base, kind)
    }

    fn instance_url(&self, kind: ResourceKind, id: &str) -> String {
        format!("{}/{}/{}", self.base, kind, id)
    }

    /// Create or replace a resource at `PUT /{type}/{id}`.
    ///
    /// The HTTP status is captured, not judged; callers that require a 2xx
    /// chain [`ServerResponse::ensure_success`].
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingId`] when the resource has no id, or a
    /// transport error if the request cannot complete.
    pub async fn upsert(&self, resource: &Resource) -> FhirResult<ServerResponse> {
        let id = resource.id().ok_or_else(|| FhirError::MissingId {
            kind: resource.kind().to_string(),
        })?;
        let context = format!("PUT {}/{}", resource.kind(), id);
        tracing::debug!("{context}");
        let response = self
            .http
            .put(self.instance_url(resource.kind(), id))
            .header(CONTENT_TYPE, FHIR_JSON)
            .header(ACCEPT, FHIR_JSON)
            .json(resource.json())
            .send()
            .await?;
        ServerResponse::read(context, response).await
    }

    /// Create a resource at `POST /{type}`, leaving id assignment to the
    /// server unless the body carries one.
    pub async fn create(&self, resource: &Resource) -> FhirResult<ServerResponse> {
        let context = format!("POST {}", resource.kind());
        tracing::debug!("{context}");
        let response = self
            .http
            .post(self.type_url(resource.kind()))
            .header(CONTENT_TYPE, FHIR_JSON)
            .header(ACCEPT, FHIR_JSON)
            .json(resource.json())
            .send()
            .await?;
        ServerResponse::read(context, response).await
    }

    /// Search a resource type: `GET /{type}?param=value&...`.
    pub async fn search(
        &self,
        kind: ResourceKind,
        params: &[(&str, &str)],
    ) -> FhirResult<ServerResponse> {
        let context = format!("GET {kind}?{}", format_query(params));
        tracing::debug!("{context}");
        let response = self
            .http
            .get(self.type_url(kind))
            .query(params)
            .header(ACCEPT, FHIR_JSON)
            .send()
            .await?;
        ServerResponse::read(context, response).await
    }

    /// Fetch a single resource: `GET /{type}/{id}`.
    pub async fn read(&self, kind: ResourceKind, id: &str) -> FhirResult<ServerResponse> {
        let context = format!("GET {kind}/{id}");
        tracing::debug!("{context}");
        let response = self
            .http
            .get(self.instance_url(kind, id))
            .header(ACCEPT, FHIR_JSON)
            .send()
            .await?;
        ServerResponse::read(context, response).await
    }

    /// Delete a single resource: `DELETE /{type}/{id}`.
    pub async fn delete(&self, kind: ResourceKind, id: &str) -> FhirResult<ServerResponse> {
        let context = format!("DELETE {kind}/{id}");
        tracing::debug!("{context}");
        let response = self
            .http
            .delete(self.instance_url(kind, id))
            .header(ACCEPT, FHIR_JSON)
            .send()
            .await?;
        ServerResponse::read(context, response).await
    }

    /// Fetch the server capability statement: `GET /metadata`.
    pub async fn metadata(&self) -> FhirResult<ServerResponse> {
        let context = "GET metadata".to_string();
        tracing::debug!("{context}");
        let response = self
            .http
            .get(format!("{}/metadata", self.base))
            .header(ACCEPT, FHIR_JSON)
            .send()
            .await?;
        ServerResponse::read(context, response).await
    }

    /// List every id of a resource type, following bundle paging links
    /// until the server stops offering a next page.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, non-2xx pages, or a page that does not
    /// decode as a bundle.
    pub async fn resource_ids(&self, kind: ResourceKind) -> FhirResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut url = format!("{}?_count=1000", self.type_url(kind));
        loop {
            let context = format!("GET {url}");
            let response = self.http.get(&url).header(ACCEPT, FHIR_JSON).send().await?;
            let response = ServerResponse::read(context, response)
                .await?
                .ensure_success()?;
            let bundle = response.bundle()?;
            ids.extend(
                bundle
                    .resources()
                    .filter_map(|resource| resource.get("id").and_then(Value::as_str))
                    .map(String::from),
            );
            match bundle.next_link() {
                Some(next) => url = next.to_string(),
                None => break,
            }
        }
        Ok(ids)
    }

    /// Delete every resource of every managed kind, in dependency order.
    ///
    /// Individual delete failures are logged and counted rather than
    /// aborting the purge; a failure to list a kind aborts, since the rest
    /// of the purge would be flying blind.
    pub async fn delete_all(&self) -> FhirResult<PurgeReport> {
        let mut report = PurgeReport::default();
        for kind in ResourceKind::ALL {
            let ids = self.resource_ids(kind).await?;
            let mut purge = KindPurge {
                kind,
                deleted: 0,
                failed: 0,
            };
            for id in ids {
                let response = self.delete(kind, &id).await?;
                if response.is_success() {
                    purge.deleted += 1;
                } else {
                    tracing::warn!(
                        "failed to delete {kind}/{id}: status {} {}",
                        response.status(),
                        excerpt(response.body())
                    );
                    purge.failed += 1;
                }
            }
            report.kinds.push(purge);
        }
        Ok(report)
    }
}

fn format_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

// ============================================================================
// Response capture
// ============================================================================

/// An HTTP response as observed: status and raw body, plus the request
/// context it answers (`"PUT Patient/PAT001"`).
#[derive(Clone, Debug)]
pub struct ServerResponse {
    context: String,
    status: u16,
    body: String,
}

impl ServerResponse {
    async fn read(context: String, response: reqwest::Response) -> FhirResult<Self> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ServerResponse {
            context,
            status,
            body,
        })
    }

    /// The request this response answers, e.g. `GET Patient?family=Doe`.
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The raw response body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The body capped for embedding in diagnostics.
    pub fn body_excerpt(&self) -> String {
        excerpt(&self.body)
    }

    /// Pass the response through only if the status is 2xx.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::UnexpectedStatus`] carrying the status and a
    /// body excerpt.
    pub fn ensure_success(self) -> FhirResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FhirError::UnexpectedStatus {
                context: self.context.clone(),
                status: self.status,
                body: excerpt(&self.body),
            })
        }
    }

    /// Decode the body as JSON.
    pub fn json(&self) -> FhirResult<Value> {
        serde_json::from_str(&self.body).map_err(|source| FhirError::Decode {
            context: self.context.clone(),
            source,
        })
    }

    /// Decode the body as a search [`Bundle`].
    pub fn bundle(&self) -> FhirResult<Bundle> {
        serde_json::from_str(&self.body).map_err(|source| FhirError::Decode {
            context: self.context.clone(),
            source,
        })
    }
}

fn excerpt(body: &str) -> String {
    if body.len() <= ERROR_BODY_LIMIT {
        return body.to_string();
    }
    let mut cut = ERROR_BODY_LIMIT;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &body[..cut])
}

// ============================================================================
// Purge report
// ============================================================================

/// Per-kind outcome of a full purge.
#[derive(Clone, Copy, Debug)]
pub struct KindPurge {
    pub kind: ResourceKind,
    pub deleted: usize,
    pub failed: usize,
}

/// Outcome of [`FhirClient::delete_all`] across all kinds.
#[derive(Clone, Debug, Default)]
pub struct PurgeReport {
    pub kinds: Vec<KindPurge>,
}

impl PurgeReport {
    pub fn deleted(&self) -> usize {
        self.kinds.iter().map(|kind| kind.deleted).sum()
    }

    pub fn failed(&self) -> usize {
        self.kinds.iter().map(|kind| kind.failed).sum()
    }

    /// True when every listed resource was deleted.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }
}
