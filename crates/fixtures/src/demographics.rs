//! Person and organisation fixtures.
//!
//! Responsibilities:
//! - Provide the demographic records the scenario prompts talk about
//! - Keep names, birth dates, and contact details fixed so searches by
//!   those fields are reproducible
//!
//! The patient and the practitioner are the anchors of the suite: most
//! clinical fixtures reference the patient, and the scheduling fixtures
//! hang off the practitioner.

use evals_types::{reference, Resource, ResourceKind};
use serde_json::json;

/// John Doe, the patient every clinical scenario revolves around.
///
/// Searchable by `family=Doe`, `given=John`, and `birthdate=1990-06-15`.
pub fn patient(id: &str) -> Resource {
    Resource::build(
        ResourceKind::Patient,
        json!({
            "id": id,
            "name": [{ "use": "official", "family": "Doe", "given": ["John"] }],
            "birthDate": "1990-06-15",
            "telecom": [{ "system": "phone", "value": "123-456-7890" }],
            "address": [{ "line": ["123 Main St"], "city": "Boston", "state": "MA" }]
        }),
    )
}

/// Jane Doe, a second patient with no clinical or billing records.
/// The empty-result scenarios search against this id.
pub fn second_patient(id: &str) -> Resource {
    Resource::build(
        ResourceKind::Patient,
        json!({
            "id": id,
            "name": [{ "use": "official", "family": "Doe", "given": ["Jane"] }],
            "birthDate": "1990-06-15",
            "telecom": [{ "system": "phone", "value": "123-456-7890" }],
            "address": [{ "line": ["123 Main St"], "city": "Boston", "state": "MA" }]
        }),
    )
}

/// Alice Doe, the patient's mother. Guarantor scenarios look her up
/// through `RelatedPerson?patient=`.
pub fn related_person(id: &str, patient_id: &str) -> Resource {
    Resource::build(
        ResourceKind::RelatedPerson,
        json!({
            "id": id,
            "patient": { "reference": reference(ResourceKind::Patient, patient_id) },
            "relationship": [{ "text": "Mother" }],
            "name": [{ "use": "official", "family": "Doe", "given": ["Alice"] }],
            "gender": "female",
            "birthDate": "1960-03-01"
        }),
    )
}

/// Dr. Jane Smith. The provider-chain scenario finds her by gender and
/// work address city, then walks Schedule and Slot from her id.
pub fn practitioner(id: &str) -> Resource {
    Resource::build(
        ResourceKind::Practitioner,
        json!({
            "id": id,
            "name": [{ "family": "Smith", "given": ["Jane"] }],
            "address": [{
                "use": "work",
                "line": ["9 Main Ave"],
                "city": "Boston",
                "state": "MA",
                "postalCode": "02115",
                "country": "US"
            }],
            "gender": "female",
            "birthDate": "1959-03-11",
            "communication": [{
                "language": { "text": "English" }
            }]
        }),
    )
}

/// XYZ Insurance, the insurer behind the coverage fixture.
pub fn organization(id: &str) -> Resource {
    Resource::build(
        ResourceKind::Organization,
        json!({
            "id": id,
            "name": "XYZ Insurance"
        }),
    )
}
