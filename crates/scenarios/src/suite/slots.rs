//! Slot discovery scenarios over the scheduling graph.

use async_trait::async_trait;
use evals_fixtures::{appointment, FixtureIds};
use evals_types::{reference, ResourceKind};
use fhir_client::FhirClient;

use crate::checks::{
    expect_bundle_size, expect_empty_bundle, expect_field, expect_reference, expect_status,
    expect_tag, first_resource, reference_target, string_at, CheckResult,
};
use crate::failure::ToolExpectations;
use crate::{Scenario, ScenarioResult};

/// Scenario 11: enumerate free slots four ways.
///
/// Beyond the plain status search, the scenario exercises the
/// service-type filter, the provider chain (practitioner to schedule to
/// slot), and a time window that must come back empty.
pub struct FindFreeSlots {
    ids: FixtureIds,
}

impl FindFreeSlots {
    pub fn new(ids: FixtureIds) -> Self {
        FindFreeSlots { ids }
    }
}

#[async_trait]
impl Scenario for FindFreeSlots {
    fn id(&self) -> &'static str {
        "11"
    }

    fn name(&self) -> &'static str {
        "find free slots"
    }

    fn prompt(&self) -> String {
        "Task: Find available appointment slots\n\
         \n\
         Find the free slots currently on offer. Check in particular:\n\
         - free slots for the Immunization service\n\
         - free slots with Dr. Jane Smith, the female practitioner based in Boston\n\
         - free slots starting before 2025-04-11\n\
         \n\
         After searching, return the total number of free slots using the following format:\n\
         <SLOT_COUNT>number</SLOT_COUNT>\n\
         If none are free, return the exact sentence: No available slots found"
            .to_string()
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(fhir, &super::scheduling_seeds(&self.ids)).await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let free = fhir.search(ResourceKind::Slot, &[("status", "free")]).await?;
        expect_status(&free, 200)?;
        let total = free.bundle()?.entry_count();
        if total == 0 {
            return Ok("No available slots found".to_string());
        }

        let by_service = fhir
            .search(
                ResourceKind::Slot,
                &[("service-type", "Immunization"), ("status", "free")],
            )
            .await?;
        expect_status(&by_service, 200)?;
        let service_count = by_service.bundle()?.entry_count();

        // Provider chain: the practitioner, then her schedule, then its
        // free slots.
        let providers = fhir
            .search(
                ResourceKind::Practitioner,
                &[("gender", "female"), ("address-city", "Boston")],
            )
            .await?;
        expect_status(&providers, 200)?;
        let bundle = expect_bundle_size(&providers, 1)?;
        let provider_id = string_at(
            providers.context(),
            first_resource(&providers, &bundle)?,
            "/id",
        )?;

        let actor = reference(ResourceKind::Practitioner, &provider_id);
        let schedules = fhir
            .search(ResourceKind::Schedule, &[("actor", actor.as_str())])
            .await?;
        expect_status(&schedules, 200)?;
        let bundle = expect_bundle_size(&schedules, 1)?;
        let schedule_id = string_at(
            schedules.context(),
            first_resource(&schedules, &bundle)?,
            "/id",
        )?;

        let schedule_ref = reference(ResourceKind::Schedule, &schedule_id);
        let by_provider = fhir
            .search(
                ResourceKind::Slot,
                &[("schedule", schedule_ref.as_str()), ("status", "free")],
            )
            .await?;
        expect_status(&by_provider, 200)?;
        let provider_count = by_provider.bundle()?.entry_count();

        let early = fhir
            .search(
                ResourceKind::Slot,
                &[("status", "free"), ("start", "le2025-04-11T00:00:00Z")],
            )
            .await?;
        expect_status(&early, 200)?;
        let early_count = early.bundle()?.entry_count();

        Ok(format!(
            "<SLOT_COUNT>{total}</SLOT_COUNT> free slot(s) in total: {service_count} for \
             Immunization, {provider_count} with Dr. Jane Smith, {early_count} before 2025-04-11."
        ))
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let free = fhir.search(ResourceKind::Slot, &[("status", "free")]).await?;
        expect_status(&free, 200)?;
        let bundle = expect_bundle_size(&free, 1)?;
        let slot = first_resource(&free, &bundle)?;
        expect_field(free.context(), slot, "/id", &self.ids.free_slot)?;
        expect_field(free.context(), slot, "/status", "free")?;

        let by_service = fhir
            .search(
                ResourceKind::Slot,
                &[("service-type", "Immunization"), ("status", "free")],
            )
            .await?;
        expect_status(&by_service, 200)?;
        let bundle = expect_bundle_size(&by_service, 1)?;
        let slot = first_resource(&by_service, &bundle)?;
        expect_field(by_service.context(), slot, "/id", &self.ids.free_slot)?;

        let providers = fhir
            .search(
                ResourceKind::Practitioner,
                &[("gender", "female"), ("address-city", "Boston")],
            )
            .await?;
        expect_status(&providers, 200)?;
        let bundle = expect_bundle_size(&providers, 1)?;
        let provider = first_resource(&providers, &bundle)?;
        expect_field(providers.context(), provider, "/id", &self.ids.practitioner)?;

        let actor = reference(ResourceKind::Practitioner, &self.ids.practitioner);
        let schedules = fhir
            .search(ResourceKind::Schedule, &[("actor", actor.as_str())])
            .await?;
        expect_status(&schedules, 200)?;
        let bundle = expect_bundle_size(&schedules, 1)?;
        let schedule = first_resource(&schedules, &bundle)?;
        expect_field(schedules.context(), schedule, "/id", &self.ids.schedule)?;

        let schedule_ref = reference(ResourceKind::Schedule, &self.ids.schedule);
        let by_provider = fhir
            .search(
                ResourceKind::Slot,
                &[("schedule", schedule_ref.as_str()), ("status", "free")],
            )
            .await?;
        expect_status(&by_provider, 200)?;
        let bundle = expect_bundle_size(&by_provider, 1)?;
        let slot = first_resource(&by_provider, &bundle)?;
        expect_field(by_provider.context(), slot, "/id", &self.ids.free_slot)?;

        // Nothing opens before the planning horizon.
        let early = fhir
            .search(
                ResourceKind::Slot,
                &[("status", "free"), ("start", "le2025-04-11T00:00:00Z")],
            )
            .await?;
        expect_status(&early, 200)?;
        expect_empty_bundle(&early)?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![vec!["getAllResources"]],
            resource_types: vec!["Slot"],
            prohibited_tools: vec!["createResource", "updateResource", "deleteResource"],
            ..ToolExpectations::default()
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        expect_tag(answer, "SLOT_COUNT", "1")
    }
}

/// Scenario 12: a slot is taken; name the patient who holds it.
pub struct FindPatientFromSlot {
    ids: FixtureIds,
}

impl FindPatientFromSlot {
    pub fn new(ids: FixtureIds) -> Self {
        FindPatientFromSlot { ids }
    }
}

#[async_trait]
impl Scenario for FindPatientFromSlot {
    fn id(&self) -> &'static str {
        "12"
    }

    fn name(&self) -> &'static str {
        "find patient from slot"
    }

    fn prompt(&self) -> String {
        format!(
            "Task: Find the patient who booked a slot\n\
             \n\
             The 09:00 slot on 2025-04-25 (id={}) is already taken. Find the\n\
             appointment holding that slot and identify the booked patient.\n\
             \n\
             After finding, return the patient ID using the following format: <PATIENT_ID>patient_id</PATIENT_ID>",
            self.ids.busy_slot
        )
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let mut seeds = super::scheduling_seeds(&self.ids);
        seeds.push(appointment(
            &self.ids.appointment,
            &self.ids.patient,
            &self.ids.practitioner,
            &self.ids.location,
            &self.ids.busy_slot,
        ));
        super::reset(fhir, &seeds).await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let slot_ref = reference(ResourceKind::Slot, &self.ids.busy_slot);
        let response = fhir
            .search(ResourceKind::Appointment, &[("slot", slot_ref.as_str())])
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let booked = first_resource(&response, &bundle)?;
        let patient_ref = string_at(response.context(), booked, "/participant/0/actor/reference")?;
        let (_, patient_id) = reference_target(response.context(), &patient_ref)?;
        Ok(format!(
            "The slot is booked by <PATIENT_ID>{patient_id}</PATIENT_ID>"
        ))
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let slot_ref = reference(ResourceKind::Slot, &self.ids.busy_slot);
        let response = fhir
            .search(ResourceKind::Appointment, &[("slot", slot_ref.as_str())])
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let booked = first_resource(&response, &bundle)?;
        expect_field(response.context(), booked, "/status", "booked")?;
        expect_reference(
            response.context(),
            booked,
            "/participant/0/actor/reference",
            ResourceKind::Patient,
            &self.ids.patient,
        )?;
        expect_reference(
            response.context(),
            booked,
            "/slot/0/reference",
            ResourceKind::Slot,
            &self.ids.busy_slot,
        )?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![vec!["getAllResources"], vec!["getResourceById"]],
            resource_types: vec!["Appointment"],
            prohibited_tools: vec!["createResource", "updateResource", "deleteResource"],
            ..ToolExpectations::default()
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        expect_tag(answer, "PATIENT_ID", &self.ids.patient)
    }
}
