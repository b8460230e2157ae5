//! HTTP client for a FHIR REST server.
//!
//! This crate is the single place the workspace talks FHIR transport:
//! - [`FhirClient`]: upsert, create, search, read, delete, and bulk purge
//! - [`ServerResponse`]: status plus body, captured before any judgement
//! - [`Bundle`]: the slice of the search envelope the harness asserts on
//!
//! Requests negotiate `application/fhir+json` both ways. Transport
//! failures surface as [`FhirError`]; HTTP status codes deliberately do
//! not. Scenario code decides what status is acceptable per step, so the
//! client hands back the response as observed and offers
//! [`ServerResponse::ensure_success`] for callers that do want to fail on
//! non-2xx.

pub mod bundle;
pub mod client;

pub use bundle::{Bundle, BundleEntry, BundleLink};
pub use client::{FhirClient, KindPurge, PurgeReport, ServerResponse};

/// Errors returned by the FHIR transport crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {context}: {body}")]
    UnexpectedStatus {
        context: String,
        status: u16,
        body: String,
    },

    #[error("response from {context} is not valid JSON: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot upsert a {kind} without an id")]
    MissingId { kind: String },
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
