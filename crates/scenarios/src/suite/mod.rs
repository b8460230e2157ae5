//! The scenario inventory, grouped by clinical workflow.
//!
//! Each scenario owns its [`FixtureIds`] and seeds exactly the records
//! its workflow needs, so suite order never matters for correctness.

mod booking;
mod guarantor;
mod history;
mod insurance;
mod patients;
mod slots;
mod surgery;

pub use booking::{BookAppointment, CancelAppointment};
pub use guarantor::{AddGuarantor, SearchGuarantor};
pub use history::{RecordCondition, SearchConditions, SearchConditionsEmpty};
pub use insurance::{RecordCoverage, SearchCoverage, SearchCoverageEmpty};
pub use patients::{RegisterPatient, SearchPatient, SearchPatientMissing};
pub use slots::{FindFreeSlots, FindPatientFromSlot};
pub use surgery::{RecordProcedure, SearchProcedures, SearchProceduresEmpty};

use evals_fixtures::{busy_slot, free_slot, location, patient, practitioner, schedule, FixtureIds};
use evals_types::Resource;
use fhir_client::FhirClient;

use crate::{Scenario, ScenarioResult};

/// Every scenario, in suite order.
pub fn all() -> Vec<Box<dyn Scenario>> {
    vec![
        Box::new(RegisterPatient::new(FixtureIds::default())),
        Box::new(SearchPatient::new(FixtureIds::default())),
        Box::new(SearchPatientMissing::new(FixtureIds::default())),
        Box::new(RecordCondition::new(FixtureIds::default())),
        Box::new(SearchConditions::new(FixtureIds::default())),
        Box::new(SearchConditionsEmpty::new(FixtureIds::default())),
        Box::new(RecordProcedure::new(FixtureIds::default())),
        Box::new(SearchProcedures::new(FixtureIds::default())),
        Box::new(SearchProceduresEmpty::new(FixtureIds::default())),
        Box::new(RecordCoverage::new(FixtureIds::default())),
        Box::new(SearchCoverage::new(FixtureIds::default())),
        Box::new(SearchCoverageEmpty::new(FixtureIds::default())),
        Box::new(AddGuarantor::new(FixtureIds::default())),
        Box::new(SearchGuarantor::new(FixtureIds::default())),
        Box::new(FindFreeSlots::new(FixtureIds::default())),
        Box::new(FindPatientFromSlot::new(FixtureIds::default())),
        Box::new(BookAppointment::new(FixtureIds::default())),
        Box::new(CancelAppointment::new(FixtureIds::default())),
    ]
}

/// Purge the server, then upsert the given seeds in order.
pub(crate) async fn reset(fhir: &FhirClient, seeds: &[Resource]) -> ScenarioResult<()> {
    let purge = fhir.delete_all().await?;
    tracing::debug!("purged {} resources before seeding", purge.deleted());
    for seed in seeds {
        fhir.upsert(seed).await?.ensure_success()?;
    }
    Ok(())
}

/// Drop the id so the server assigns one on create.
pub(crate) fn without_id(mut resource: Resource) -> Resource {
    if let Some(body) = resource.json_mut().as_object_mut() {
        body.remove("id");
    }
    resource
}

/// Provider, patient, clinic, schedule, and both morning slots.
pub(crate) fn scheduling_seeds(ids: &FixtureIds) -> Vec<Resource> {
    vec![
        practitioner(&ids.practitioner),
        patient(&ids.patient),
        location(&ids.location),
        schedule(&ids.schedule, &ids.practitioner),
        free_slot(&ids.free_slot, &ids.schedule),
        busy_slot(&ids.busy_slot, &ids.schedule),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn suite_ids_are_unique_and_ordered() {
        let scenarios = all();
        assert_eq!(scenarios.len(), 18);

        let ids: Vec<&str> = scenarios.iter().map(|s| s.id()).collect();
        let unique: BTreeSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted, "suite order should follow scenario ids");
    }

    #[test]
    fn every_prompt_names_its_answer_format() {
        for scenario in all() {
            let prompt = scenario.prompt();
            assert!(
                prompt.contains('<') && prompt.contains('>'),
                "scenario {} prompt lacks an answer tag",
                scenario.id()
            );
        }
    }

    #[test]
    fn without_id_strips_only_the_id() {
        let seeded = patient("PAT001");
        let stripped = without_id(patient("PAT001"));
        assert!(stripped.id().is_none());
        assert_eq!(stripped.json()["name"], seeded.json()["name"]);
    }
}
