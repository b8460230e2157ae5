//! Assertion helpers shared by every scenario.
//!
//! Each helper either hands the value back or returns a [`CheckError`]
//! that already reads as a failure report, naming the request context
//! and the expected versus observed state.

use evals_types::{parse_reference, reference, Resource, ResourceKind};
use fhir_client::{Bundle, ServerResponse};
use serde_json::Value;

/// A failed scenario assertion.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("{context}: expected status {expected}, got {actual}: {body}")]
    Status {
        context: String,
        expected: String,
        actual: u16,
        body: String,
    },

    #[error("{context}: expected {expected} matching resource(s), found {actual}: {body}")]
    BundleSize {
        context: String,
        expected: usize,
        actual: usize,
        body: String,
    },

    #[error("{context}: {detail}: {body}")]
    Malformed {
        context: String,
        detail: String,
        body: String,
    },

    #[error("{context}: field {pointer} is {actual}, expected {expected}")]
    Field {
        context: String,
        pointer: String,
        expected: String,
        actual: String,
    },

    #[error("answer check failed: {detail}; answer was: {answer}")]
    Answer { detail: String, answer: String },
}

/// Type alias for Results that can fail with a [`CheckError`].
pub type CheckResult<T> = Result<T, CheckError>;

/// Require an exact status code.
pub fn expect_status(response: &ServerResponse, expected: u16) -> CheckResult<()> {
    if response.status() == expected {
        Ok(())
    } else {
        Err(status_error(response, expected.to_string()))
    }
}

/// Require 201 Created.
pub fn expect_created(response: &ServerResponse) -> CheckResult<()> {
    expect_status(response, 201)
}

/// Require any 2xx.
pub fn expect_success(response: &ServerResponse) -> CheckResult<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(status_error(response, "2xx".to_string()))
    }
}

fn status_error(response: &ServerResponse, expected: String) -> CheckError {
    CheckError::Status {
        context: response.context().to_string(),
        expected,
        actual: response.status(),
        body: response.body_excerpt(),
    }
}

/// Decode a searchset and require an exact number of entries.
pub fn expect_bundle_size(response: &ServerResponse, expected: usize) -> CheckResult<Bundle> {
    let bundle = decode_bundle(response)?;
    if bundle.entry_count() == expected {
        Ok(bundle)
    } else {
        Err(CheckError::BundleSize {
            context: response.context().to_string(),
            expected,
            actual: bundle.entry_count(),
            body: response.body_excerpt(),
        })
    }
}

/// Require a searchset with no entries at all.
pub fn expect_empty_bundle(response: &ServerResponse) -> CheckResult<()> {
    expect_bundle_size(response, 0).map(|_| ())
}

fn decode_bundle(response: &ServerResponse) -> CheckResult<Bundle> {
    serde_json::from_str(response.body()).map_err(|err| CheckError::Malformed {
        context: response.context().to_string(),
        detail: format!("body is not a searchset bundle ({err})"),
        body: response.body_excerpt(),
    })
}

/// The resource in the first bundle entry.
pub fn first_resource<'a>(response: &ServerResponse, bundle: &'a Bundle) -> CheckResult<&'a Value> {
    bundle.resource(0).ok_or_else(|| CheckError::Malformed {
        context: response.context().to_string(),
        detail: "bundle entry 0 carries no resource".to_string(),
        body: response.body_excerpt(),
    })
}

/// Compare a field, addressed by JSON pointer, against an expected value.
///
/// Non-string scalars are compared through their JSON rendering, so
/// `expect_field(ctx, doc, "/total", "1")` works for numbers too.
pub fn expect_field(context: &str, document: &Value, pointer: &str, expected: &str) -> CheckResult<()> {
    let actual = field_text(document, pointer);
    if actual.as_deref() == Some(expected) {
        Ok(())
    } else {
        Err(CheckError::Field {
            context: context.to_string(),
            pointer: pointer.to_string(),
            expected: expected.to_string(),
            actual: actual.unwrap_or_else(|| "(absent)".to_string()),
        })
    }
}

/// Require a reference field to point at `kind/id`.
pub fn expect_reference(
    context: &str,
    document: &Value,
    pointer: &str,
    kind: ResourceKind,
    id: &str,
) -> CheckResult<()> {
    expect_field(context, document, pointer, &reference(kind, id))
}

fn field_text(document: &Value, pointer: &str) -> Option<String> {
    let value = document.pointer(pointer)?;
    match value.as_str() {
        Some(text) => Some(text.to_string()),
        None => Some(value.to_string()),
    }
}

/// Extract a string field, failing loudly when it is absent.
pub fn string_at(context: &str, document: &Value, pointer: &str) -> CheckResult<String> {
    match document.pointer(pointer) {
        Some(Value::String(text)) => Ok(text.clone()),
        other => Err(CheckError::Field {
            context: context.to_string(),
            pointer: pointer.to_string(),
            expected: "a string".to_string(),
            actual: other.map_or_else(|| "(absent)".to_string(), |value| value.to_string()),
        }),
    }
}

/// The id the server assigned on a create.
pub fn created_id(response: &ServerResponse) -> CheckResult<String> {
    let body = decode_json(response)?;
    string_at(response.context(), &body, "/id")
}

/// Adopt a response body as a typed resource, ready to modify and send
/// back whole.
pub fn response_resource(response: &ServerResponse) -> CheckResult<Resource> {
    let body = decode_json(response)?;
    Resource::try_from(body).map_err(|err| CheckError::Malformed {
        context: response.context().to_string(),
        detail: err.to_string(),
        body: response.body_excerpt(),
    })
}

fn decode_json(response: &ServerResponse) -> CheckResult<Value> {
    serde_json::from_str(response.body()).map_err(|err| CheckError::Malformed {
        context: response.context().to_string(),
        detail: format!("body is not JSON ({err})"),
        body: response.body_excerpt(),
    })
}

/// Resolve a `Type/id` reference into its parts.
pub fn reference_target(context: &str, value: &str) -> CheckResult<(ResourceKind, String)> {
    parse_reference(value).map_err(|err| CheckError::Malformed {
        context: context.to_string(),
        detail: err.to_string(),
        body: value.to_string(),
    })
}

/// Extract the value of a `<tag>...</tag>` marker from an answer.
pub fn answer_tag(answer: &str, tag: &str) -> CheckResult<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = answer.find(&open).ok_or_else(|| CheckError::Answer {
        detail: format!("missing {open} tag"),
        answer: answer.to_string(),
    })?;
    let rest = &answer[start + open.len()..];
    let end = rest.find(&close).ok_or_else(|| CheckError::Answer {
        detail: format!("unterminated {open} tag"),
        answer: answer.to_string(),
    })?;
    let value = rest[..end].trim();
    if value.is_empty() {
        return Err(CheckError::Answer {
            detail: format!("empty {open} tag"),
            answer: answer.to_string(),
        });
    }
    Ok(value.to_string())
}

/// Require a tag to hold an exact value.
pub fn expect_tag(answer: &str, tag: &str, expected: &str) -> CheckResult<()> {
    let value = answer_tag(answer, tag)?;
    if value == expected {
        Ok(())
    } else {
        Err(CheckError::Answer {
            detail: format!("<{tag}> holds {value:?}, expected {expected:?}"),
            answer: answer.to_string(),
        })
    }
}

/// Require a phrase somewhere in the answer, case-insensitively.
pub fn expect_answer_contains(answer: &str, phrase: &str) -> CheckResult<()> {
    if answer.to_lowercase().contains(&phrase.to_lowercase()) {
        Ok(())
    } else {
        Err(CheckError::Answer {
            detail: format!("does not mention {phrase:?}"),
            answer: answer.to_string(),
        })
    }
}
