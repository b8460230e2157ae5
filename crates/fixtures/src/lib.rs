//! Deterministic fixture builders for the evaluation scenarios.
//!
//! Each builder is a pure function from explicit parameters to a
//! [`Resource`]: same inputs, same JSON, every time. Cross-resource
//! references are parameters rather than constants baked into the builder,
//! so a scenario that needs a second patient or a different insurer passes
//! different ids instead of editing fixture code.
//!
//! [`FixtureIds`] carries the canonical id set the scenario suite shares,
//! and [`baseline`] produces the full seed population in upsert-safe order.

pub mod billing;
pub mod clinical;
pub mod demographics;
pub mod scheduling;

pub use billing::{account, coverage};
pub use clinical::{condition, consent, document_reference, procedure};
pub use demographics::{organization, patient, practitioner, related_person, second_patient};
pub use scheduling::{appointment, busy_slot, free_slot, location, schedule};

use evals_types::Resource;

/// Canonical fixture ids shared across the scenario suite.
///
/// Defaults match the ids the scenario prompts talk about, so an agent
/// reading "patient PAT001" finds exactly that record on the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixtureIds {
    pub patient: String,
    pub second_patient: String,
    pub related_person: String,
    pub condition: String,
    pub procedure: String,
    pub coverage: String,
    pub organization: String,
    pub practitioner: String,
    pub schedule: String,
    pub location: String,
    pub free_slot: String,
    pub busy_slot: String,
    pub appointment: String,
    pub consent: String,
    pub document: String,
    pub account: String,
}

impl Default for FixtureIds {
    fn default() -> Self {
        FixtureIds {
            patient: "PAT001".to_string(),
            second_patient: "PAT002".to_string(),
            related_person: "REL001".to_string(),
            condition: "COND001".to_string(),
            procedure: "PROC001".to_string(),
            coverage: "COV001".to_string(),
            organization: "ORG001".to_string(),
            practitioner: "PRACT001".to_string(),
            schedule: "SCH001".to_string(),
            location: "LOC001".to_string(),
            free_slot: "SLOT001".to_string(),
            busy_slot: "SLOT002".to_string(),
            appointment: "APPT001".to_string(),
            consent: "CONSENT001".to_string(),
            document: "DOC001".to_string(),
            account: "ACC001".to_string(),
        }
    }
}

/// The full seed population, ordered so every referenced resource is
/// upserted before its first referrer.
///
/// Covers everything the scenario suite can query. Scenarios that only
/// need a slice of it seed their own subset instead.
pub fn baseline(ids: &FixtureIds) -> Vec<Resource> {
    vec![
        organization(&ids.organization),
        practitioner(&ids.practitioner),
        patient(&ids.patient),
        second_patient(&ids.second_patient),
        location(&ids.location),
        related_person(&ids.related_person, &ids.patient),
        condition(&ids.condition, &ids.patient),
        procedure(&ids.procedure, &ids.patient),
        coverage(&ids.coverage, &ids.patient, &ids.organization),
        document_reference(&ids.document, &ids.patient, &ids.practitioner),
        consent(&ids.consent, &ids.patient, &ids.organization, &ids.document),
        schedule(&ids.schedule, &ids.practitioner),
        free_slot(&ids.free_slot, &ids.schedule),
        busy_slot(&ids.busy_slot, &ids.schedule),
        appointment(
            &ids.appointment,
            &ids.patient,
            &ids.practitioner,
            &ids.location,
            &ids.busy_slot,
        ),
    ]
}
