//! Billing fixtures: insurance coverage and the guarantor account.

use evals_types::{reference, Resource, ResourceKind};
use serde_json::json;

/// Active insurance coverage. Subscriber and beneficiary are both the
/// patient; the insurer must be a seeded organisation so the reference
/// resolves on servers that enforce integrity.
pub fn coverage(id: &str, patient_id: &str, insurer_id: &str) -> Resource {
    let patient = reference(ResourceKind::Patient, patient_id);
    Resource::build(
        ResourceKind::Coverage,
        json!({
            "id": id,
            "status": "active",
            "kind": "insurance",
            "subscriber": { "reference": patient },
            "beneficiary": { "reference": patient },
            "insurer": { "reference": reference(ResourceKind::Organization, insurer_id) }
        }),
    )
}

/// Guarantor account naming a RelatedPerson as the responsible party.
pub fn account(id: &str, patient_id: &str, guarantor_id: &str) -> Resource {
    Resource::build(
        ResourceKind::Account,
        json!({
            "id": id,
            "status": "active",
            "type": {
                "coding": [{
                    "system": "http://terminology.hl7.org/CodeSystem/account-type",
                    "code": "guarantor",
                    "display": "Guarantor"
                }]
            },
            "name": "Guarantor Account",
            "subject": { "reference": reference(ResourceKind::Patient, patient_id) },
            "guarantor": [{
                "party": { "reference": reference(ResourceKind::RelatedPerson, guarantor_id) },
                "onHold": false
            }]
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_names_patient_as_subscriber_and_beneficiary() {
        let resource = coverage("COV001", "PAT001", "ORG001");
        let json = resource.json();
        assert_eq!(json["status"], "active");
        assert_eq!(json["kind"], "insurance");
        assert_eq!(json["subscriber"]["reference"], "Patient/PAT001");
        assert_eq!(json["beneficiary"]["reference"], "Patient/PAT001");
    }

    #[test]
    fn coverage_insurer_is_a_parameter() {
        // The insurer must point at whatever organisation the caller seeded.
        let resource = coverage("COV001", "PAT001", "ORG042");
        assert_eq!(resource.json()["insurer"]["reference"], "Organization/ORG042");
    }

    #[test]
    fn account_holds_the_guarantor_party() {
        let resource = account("ACC001", "PAT001", "REL001");
        let json = resource.json();
        assert_eq!(json["type"]["coding"][0]["code"], "guarantor");
        assert_eq!(json["name"], "Guarantor Account");
        assert_eq!(json["subject"]["reference"], "Patient/PAT001");
        assert_eq!(
            json["guarantor"][0]["party"]["reference"],
            "RelatedPerson/REL001"
        );
        assert_eq!(json["guarantor"][0]["onHold"], false);
    }
}
