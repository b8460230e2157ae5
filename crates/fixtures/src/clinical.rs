//! Clinical record fixtures: condition, procedure, consent, and the
//! document the consent points at.

use evals_types::{reference, Resource, ResourceKind};
use serde_json::json;

/// Hypertension diagnosis for the given patient.
pub fn condition(id: &str, patient_id: &str) -> Resource {
    Resource::build(
        ResourceKind::Condition,
        json!({
            "id": id,
            "code": { "text": "Hypertension" },
            "subject": { "reference": reference(ResourceKind::Patient, patient_id) }
        }),
    )
}

/// Planned appendectomy for the given patient.
pub fn procedure(id: &str, patient_id: &str) -> Resource {
    Resource::build(
        ResourceKind::Procedure,
        json!({
            "id": id,
            "status": "in-progress",
            "subject": { "reference": reference(ResourceKind::Patient, patient_id) },
            "code": { "text": "Appendectomy" }
        }),
    )
}

/// Active consent: the patient permits record sharing under the policy
/// document, controlled by the organisation.
pub fn consent(id: &str, patient_id: &str, organization_id: &str, document_id: &str) -> Resource {
    Resource::build(
        ResourceKind::Consent,
        json!({
            "id": id,
            "status": "active",
            "subject": { "reference": reference(ResourceKind::Patient, patient_id) },
            "date": "2025-03-24",
            "controller": [{
                "reference": reference(ResourceKind::Organization, organization_id)
            }],
            "sourceAttachment": [{ "title": "The terms of the consent." }],
            "policyText": {
                "reference": reference(ResourceKind::DocumentReference, document_id)
            },
            "decision": "permit"
        }),
    )
}

/// Outpatient note (LOINC 34108-1) authored by the practitioner.
///
/// The attachment fields are fixed constants so repeated seeding writes an
/// identical resource.
pub fn document_reference(id: &str, patient_id: &str, author_id: &str) -> Resource {
    Resource::build(
        ResourceKind::DocumentReference,
        json!({
            "id": id,
            "status": "current",
            "type": {
                "coding": [{
                    "system": "http://loinc.org",
                    "code": "34108-1",
                    "display": "Outpatient Note"
                }]
            },
            "subject": { "reference": reference(ResourceKind::Patient, patient_id) },
            "date": "2025-01-01",
            "author": [{
                "reference": reference(ResourceKind::Practitioner, author_id)
            }],
            "content": [{
                "attachment": {
                    "contentType": "application/pdf",
                    "url": "http://example.com/documents/outpatient-note-0001.pdf",
                    "size": 2048,
                    "hash": "8a2f55327bbe9f24e5e4d06dbfeb0a3e",
                    "title": "Patient Outpatient Note",
                    "creation": "2025-01-01"
                }
            }]
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_subject_points_at_patient() {
        let resource = condition("COND001", "PAT001");
        assert_eq!(resource.kind(), ResourceKind::Condition);
        assert_eq!(resource.json()["code"]["text"], "Hypertension");
        assert_eq!(resource.json()["subject"]["reference"], "Patient/PAT001");
    }

    #[test]
    fn procedure_is_the_planned_appendectomy() {
        let resource = procedure("PROC001", "PAT001");
        assert_eq!(resource.json()["status"], "in-progress");
        assert_eq!(resource.json()["code"]["text"], "Appendectomy");
        assert_eq!(resource.json()["subject"]["reference"], "Patient/PAT001");
    }

    #[test]
    fn consent_wires_all_three_references() {
        let resource = consent("CONSENT001", "PAT001", "ORG001", "DOC001");
        let json = resource.json();
        assert_eq!(json["subject"]["reference"], "Patient/PAT001");
        assert_eq!(json["controller"][0]["reference"], "Organization/ORG001");
        assert_eq!(json["policyText"]["reference"], "DocumentReference/DOC001");
        assert_eq!(json["decision"], "permit");
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn document_reference_is_idempotent() {
        // The attachment must not vary between calls.
        assert_eq!(
            document_reference("DOC001", "PAT001", "PRACT001"),
            document_reference("DOC001", "PAT001", "PRACT001")
        );
    }

    #[test]
    fn document_reference_carries_loinc_coding() {
        let resource = document_reference("DOC001", "PAT001", "PRACT001");
        let coding = &resource.json()["type"]["coding"][0];
        assert_eq!(coding["system"], "http://loinc.org");
        assert_eq!(coding["code"], "34108-1");
        assert_eq!(coding["display"], "Outpatient Note");
        assert_eq!(
            resource.json()["author"][0]["reference"],
            "Practitioner/PRACT001"
        );
    }
}
