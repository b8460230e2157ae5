//! Shared resource model for the evaluation workspace.
//!
//! Every crate in the workspace moves FHIR resources around as schemaless
//! JSON. This crate provides the small shared vocabulary for doing that
//! safely:
//! - [`ResourceKind`]: the closed set of resource types the harness manages
//! - [`Resource`]: a JSON body tagged with its kind and optional id
//! - [`reference`] / [`parse_reference`]: literal reference helpers
//!
//! Resource bodies stay `serde_json::Value` on purpose. The harness asserts
//! on individual fields of server responses rather than binding the full
//! FHIR schema, so a typed model would only get in the way.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors returned by the shared types crate.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    #[error("resource JSON has no resourceType field")]
    MissingResourceType,

    #[error("unsupported resource type '{0}'")]
    UnknownResourceType(String),
}

/// Type alias for Results that can fail with a [`TypesError`].
pub type TypesResult<T> = Result<T, TypesError>;

// ============================================================================
// Resource kinds
// ============================================================================

/// The resource types the harness seeds, queries, and purges.
///
/// Variant order is deletion order: a kind only appears after every kind
/// that references it has already been listed. Purging in [`ResourceKind::ALL`]
/// order therefore never deletes a resource while a referrer still exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// References Patient, Practitioner, Location, and Slot.
    Appointment,
    /// References Schedule.
    Slot,
    /// References Practitioner.
    Schedule,
    /// References Patient, Organization, and DocumentReference.
    Consent,
    /// References Patient and Practitioner.
    DocumentReference,
    /// References Patient and RelatedPerson.
    Account,
    /// References Patient.
    RelatedPerson,
    /// References Patient and Organization.
    Coverage,
    /// References Patient.
    Procedure,
    /// References Patient.
    Condition,
    /// Referenced by Appointment.
    Location,
    /// Referenced by Coverage and Consent.
    Organization,
    /// Referenced by most clinical resources.
    Patient,
    /// Referenced by Schedule, DocumentReference, and Appointment.
    Practitioner,
}

impl ResourceKind {
    /// Every managed kind, in deletion-safe order.
    pub const ALL: [ResourceKind; 14] = [
        ResourceKind::Appointment,
        ResourceKind::Slot,
        ResourceKind::Schedule,
        ResourceKind::Consent,
        ResourceKind::DocumentReference,
        ResourceKind::Account,
        ResourceKind::RelatedPerson,
        ResourceKind::Coverage,
        ResourceKind::Procedure,
        ResourceKind::Condition,
        ResourceKind::Location,
        ResourceKind::Organization,
        ResourceKind::Patient,
        ResourceKind::Practitioner,
    ];

    /// The wire name of the kind, as it appears in `resourceType` and URLs.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Appointment => "Appointment",
            ResourceKind::Slot => "Slot",
            ResourceKind::Schedule => "Schedule",
            ResourceKind::Consent => "Consent",
            ResourceKind::DocumentReference => "DocumentReference",
            ResourceKind::Account => "Account",
            ResourceKind::RelatedPerson => "RelatedPerson",
            ResourceKind::Coverage => "Coverage",
            ResourceKind::Procedure => "Procedure",
            ResourceKind::Condition => "Condition",
            ResourceKind::Location => "Location",
            ResourceKind::Organization => "Organization",
            ResourceKind::Patient => "Patient",
            ResourceKind::Practitioner => "Practitioner",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TypesError::UnknownResourceType(s.to_string()))
    }
}

// ============================================================================
// Resource
// ============================================================================

/// A resource body tagged with its kind.
///
/// The kind is carried outside the JSON so that request routing never
/// depends on callers keeping the `resourceType` field intact. The body
/// always contains a matching `resourceType` when built through
/// [`Resource::build`].
#[derive(Clone, Debug, PartialEq)]
pub struct Resource {
    kind: ResourceKind,
    body: Value,
}

impl Resource {
    /// Build a resource from a JSON object body.
    ///
    /// Stamps `resourceType` into the body, overwriting any value already
    /// present. A non-object body is replaced with an empty object before
    /// stamping, so the result is always a well-formed resource.
    pub fn build(kind: ResourceKind, body: Value) -> Self {
        let mut map = match body {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        map.insert(
            "resourceType".to_string(),
            Value::String(kind.as_str().to_string()),
        );
        Resource {
            kind,
            body: Value::Object(map),
        }
    }

    /// The kind of this resource.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The `id` field, when one is set.
    ///
    /// Resources posted for server-side id assignment have no id yet.
    pub fn id(&self) -> Option<&str> {
        self.body.get("id").and_then(Value::as_str)
    }

    /// Literal reference to this resource, e.g. `Patient/PAT001`.
    ///
    /// Returns `None` when the resource has no id.
    pub fn local_reference(&self) -> Option<String> {
        self.id().map(|id| reference(self.kind, id))
    }

    /// Shared view of the JSON body.
    pub fn json(&self) -> &Value {
        &self.body
    }

    /// Mutable view of the JSON body, for targeted field updates.
    pub fn json_mut(&mut self) -> &mut Value {
        &mut self.body
    }

    /// Consume the resource, returning the JSON body.
    pub fn into_json(self) -> Value {
        self.body
    }
}

impl TryFrom<Value> for Resource {
    type Error = TypesError;

    /// Adopt externally sourced JSON as a [`Resource`].
    ///
    /// Fails when `resourceType` is missing, blank, or not one of the
    /// managed kinds.
    fn try_from(body: Value) -> Result<Self, Self::Error> {
        let kind_str = body
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or(TypesError::MissingResourceType)?;
        if kind_str.trim().is_empty() {
            return Err(TypesError::MissingResourceType);
        }
        let kind = kind_str.parse::<ResourceKind>()?;
        Ok(Resource { kind, body })
    }
}

// ============================================================================
// Reference helpers
// ============================================================================

/// Format a literal reference, e.g. `reference(Patient, "PAT001")` ->
/// `"Patient/PAT001"`.
pub fn reference(kind: ResourceKind, id: &str) -> String {
    format!("{}/{}", kind.as_str(), id)
}

/// Split a literal reference back into kind and id.
pub fn parse_reference(text: &str) -> TypesResult<(ResourceKind, String)> {
    let (kind_str, id) = text
        .split_once('/')
        .ok_or_else(|| TypesError::UnknownResourceType(text.to_string()))?;
    let kind = kind_str.parse::<ResourceKind>()?;
    Ok((kind, id.to_string()))
}
