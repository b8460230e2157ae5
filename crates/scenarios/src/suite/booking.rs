//! Booking scenarios: take a slot, release a slot.

use async_trait::async_trait;
use evals_fixtures::{appointment, FixtureIds};
use evals_types::{reference, ResourceKind};
use fhir_client::FhirClient;
use serde_json::json;

use crate::checks::{
    answer_tag, created_id, expect_bundle_size, expect_created, expect_field, expect_reference,
    expect_status, expect_success, expect_tag, first_resource, reference_target,
    response_resource, string_at, CheckResult,
};
use crate::failure::ToolExpectations;
use crate::{Scenario, ScenarioResult};

/// Scenario 13: book the free slot and mark it busy.
///
/// Both writes are full-body: the appointment is created whole, and the
/// slot is read, modified, and sent back complete rather than patched
/// with a sparse document.
pub struct BookAppointment {
    ids: FixtureIds,
}

impl BookAppointment {
    pub fn new(ids: FixtureIds) -> Self {
        BookAppointment { ids }
    }
}

#[async_trait]
impl Scenario for BookAppointment {
    fn id(&self) -> &'static str {
        "13"
    }

    fn name(&self) -> &'static str {
        "book appointment"
    }

    fn prompt(&self) -> String {
        format!(
            "Task: Make an appointment for the patient John Doe (id={}) with\n\
             Dr. Jane Smith for the free 09:15 slot (id={}) on 2025-04-25.\n\
             \n\
             After creating the appointment and updating the slot, return the new\n\
             Appointment ID using the following format: <APPOINTMENT>appointment_id</APPOINTMENT>",
            self.ids.patient, self.ids.free_slot
        )
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(fhir, &super::scheduling_seeds(&self.ids)).await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let response = fhir
            .create(&super::without_id(appointment(
                &self.ids.appointment,
                &self.ids.patient,
                &self.ids.practitioner,
                &self.ids.location,
                &self.ids.free_slot,
            )))
            .await?;
        expect_created(&response)?;
        let appointment_id = created_id(&response)?;

        // Mark the slot busy with a full-body update.
        let read = fhir
            .read(ResourceKind::Slot, &self.ids.free_slot)
            .await?
            .ensure_success()?;
        let mut slot = response_resource(&read)?;
        slot.json_mut()["status"] = json!("busy");
        let update = fhir.upsert(&slot).await?;
        expect_success(&update)?;

        Ok(format!(
            "Appointment booked: <APPOINTMENT>{appointment_id}</APPOINTMENT>"
        ))
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let slot_ref = reference(ResourceKind::Slot, &self.ids.free_slot);
        let appointments = fhir
            .search(ResourceKind::Appointment, &[("slot", slot_ref.as_str())])
            .await?;
        expect_status(&appointments, 200)?;
        let bundle = expect_bundle_size(&appointments, 1)?;
        let booked = first_resource(&appointments, &bundle)?;
        expect_field(appointments.context(), booked, "/status", "booked")?;
        expect_reference(
            appointments.context(),
            booked,
            "/participant/0/actor/reference",
            ResourceKind::Patient,
            &self.ids.patient,
        )?;
        string_at(appointments.context(), booked, "/id")?;

        let slot = fhir.read(ResourceKind::Slot, &self.ids.free_slot).await?;
        expect_status(&slot, 200)?;
        let body = slot.json()?;
        expect_field(slot.context(), &body, "/status", "busy")?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![vec!["createResource", "updateResource"]],
            required_order: vec![("createResource", "updateResource")],
            resource_types: vec!["Appointment", "Slot"],
            prohibited_tools: vec!["deleteResource"],
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        answer_tag(answer, "APPOINTMENT").map(|_| ())
    }
}

/// Scenario 14: cancel the booked appointment and free its slot.
///
/// The slot to release is read off the appointment itself, not assumed,
/// so the scenario also proves the booking linkage survived.
pub struct CancelAppointment {
    ids: FixtureIds,
}

impl CancelAppointment {
    pub fn new(ids: FixtureIds) -> Self {
        CancelAppointment { ids }
    }
}

#[async_trait]
impl Scenario for CancelAppointment {
    fn id(&self) -> &'static str {
        "14"
    }

    fn name(&self) -> &'static str {
        "cancel appointment"
    }

    fn prompt(&self) -> String {
        format!(
            "Task: Cancel an appointment\n\
             \n\
             Cancel the appointment id={} and release the slot it was holding so\n\
             the time can be booked again.\n\
             \n\
             After cancelling, return the appointment ID using the following format:\n\
             <APPOINTMENT>appointment_id</APPOINTMENT>",
            self.ids.appointment
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
        let read = fhir
            .read(ResourceKind::Appointment, &self.ids.appointment)
            .await?
            .ensure_success()?;
        let mut booked = response_resource(&read)?;
        let slot_ref = string_at(read.context(), booked.json(), "/slot/0/reference")?;

        booked.json_mut()["status"] = json!("cancelled");
        let update = fhir.upsert(&booked).await?;
        expect_status(&update, 200)?;

        // Release the slot the appointment was holding.
        let (slot_kind, slot_id) = reference_target(read.context(), &slot_ref)?;
        let slot_read = fhir.read(slot_kind, &slot_id).await?.ensure_success()?;
        let mut slot = response_resource(&slot_read)?;
        slot.json_mut()["status"] = json!("free");
        let slot_update = fhir.upsert(&slot).await?;
        expect_status(&slot_update, 200)?;

        Ok(format!(
            "Appointment cancelled: <APPOINTMENT>{}</APPOINTMENT>",
            self.ids.appointment
        ))
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let response = fhir
            .read(ResourceKind::Appointment, &self.ids.appointment)
            .await?;
        expect_status(&response, 200)?;
        let body = response.json()?;
        expect_field(response.context(), &body, "/status", "cancelled")?;

        let slot = fhir.read(ResourceKind::Slot, &self.ids.busy_slot).await?;
        expect_status(&slot, 200)?;
        let body = slot.json()?;
        expect_field(slot.context(), &body, "/status", "free")?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![
                vec!["getResourceById", "updateResource"],
                vec!["getAllResources", "updateResource"],
            ],
            required_order: vec![("getResourceById", "updateResource")],
            resource_types: vec!["Appointment", "Slot"],
            prohibited_tools: vec!["createResource", "deleteResource"],
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        expect_tag(answer, "APPOINTMENT", &self.ids.appointment)
    }
}
