//! Surgery-plan scenarios, the procedure mirror of the history group.

use async_trait::async_trait;
use evals_fixtures::{patient, procedure, second_patient, FixtureIds};
use evals_types::{reference, ResourceKind};
use fhir_client::FhirClient;

use crate::checks::{
    answer_tag, created_id, expect_answer_contains, expect_bundle_size, expect_created,
    expect_empty_bundle, expect_field, expect_reference, expect_status, expect_tag,
    first_resource, string_at, CheckResult,
};
use crate::failure::ToolExpectations;
use crate::{Scenario, ScenarioResult};

/// Scenario 05: record a planned appendectomy.
pub struct RecordProcedure {
    ids: FixtureIds,
}

impl RecordProcedure {
    pub fn new(ids: FixtureIds) -> Self {
        RecordProcedure { ids }
    }
}

#[async_trait]
impl Scenario for RecordProcedure {
    fn id(&self) -> &'static str {
        "05"
    }

    fn name(&self) -> &'static str {
        "record surgery plan"
    }

    fn prompt(&self) -> String {
        format!(
            "Task: Record a surgery plan\n\
             \n\
             Record a surgery plan for patient id={} for an Appendectomy surgery.\n\
             \n\
             Once done, return the surgery plan ID in the following format: <surgery_plan>surgeryPlan</surgery_plan>",
            self.ids.patient
        )
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(fhir, &[patient(&self.ids.patient)]).await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let response = fhir
            .create(&super::without_id(procedure(
                &self.ids.procedure,
                &self.ids.patient,
            )))
            .await?;
        expect_created(&response)?;
        let id = created_id(&response)?;
        Ok(format!(
            "Surgery plan recorded: <surgery_plan>{id}</surgery_plan>"
        ))
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let subject = reference(ResourceKind::Patient, &self.ids.patient);
        let response = fhir
            .search(ResourceKind::Procedure, &[("subject", subject.as_str())])
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let found = first_resource(&response, &bundle)?;
        expect_field(response.context(), found, "/code/text", "Appendectomy")?;
        expect_field(response.context(), found, "/status", "in-progress")?;
        expect_reference(
            response.context(),
            found,
            "/subject/reference",
            ResourceKind::Patient,
            &self.ids.patient,
        )?;
        string_at(response.context(), found, "/id")?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![
                vec!["createResource"],
                vec!["getResourceById", "updateResource"],
                vec!["getAllResources", "createResource"],
            ],
            required_order: vec![
                ("getResourceById", "updateResource"),
                ("getAllResources", "createResource"),
            ],
            resource_types: vec!["Procedure"],
            prohibited_tools: vec!["deleteResource"],
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        answer_tag(answer, "surgery_plan").map(|_| ())
    }
}

/// Scenario 06a: the plan exists; find it.
pub struct SearchProcedures {
    ids: FixtureIds,
}

impl SearchProcedures {
    pub fn new(ids: FixtureIds) -> Self {
        SearchProcedures { ids }
    }
}

#[async_trait]
impl Scenario for SearchProcedures {
    fn id(&self) -> &'static str {
        "06a"
    }

    fn name(&self) -> &'static str {
        "search surgery plan"
    }

    fn prompt(&self) -> String {
        format!(
            "Task: Search for surgery plan\n\
             \n\
             Search and find if patient id={} has any surgery plan on record.\n\
             \n\
             If found, return the surgery plan's ID using the following format: <SURGERY_PLAN>plan_id</SURGERY_PLAN>",
            self.ids.patient
        )
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(
            fhir,
            &[
                patient(&self.ids.patient),
                procedure(&self.ids.procedure, &self.ids.patient),
            ],
        )
        .await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let subject = reference(ResourceKind::Patient, &self.ids.patient);
        let response = fhir
            .search(ResourceKind::Procedure, &[("subject", subject.as_str())])
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let found = first_resource(&response, &bundle)?;
        let id = string_at(response.context(), found, "/id")?;
        Ok(format!("Surgery plan found: <SURGERY_PLAN>{id}</SURGERY_PLAN>"))
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let subject = reference(ResourceKind::Patient, &self.ids.patient);
        let response = fhir
            .search(ResourceKind::Procedure, &[("subject", subject.as_str())])
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let found = first_resource(&response, &bundle)?;
        expect_field(response.context(), found, "/id", &self.ids.procedure)?;
        expect_field(response.context(), found, "/code/text", "Appendectomy")?;
        expect_reference(
            response.context(),
            found,
            "/subject/reference",
            ResourceKind::Patient,
            &self.ids.patient,
        )?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![vec!["getAllResources"], vec!["getResourceById"]],
            resource_types: vec!["Procedure"],
            prohibited_tools: vec!["createResource", "updateResource", "deleteResource"],
            ..ToolExpectations::default()
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        expect_tag(answer, "SURGERY_PLAN", &self.ids.procedure)
    }
}

/// Scenario 06b: no plan for the second patient.
pub struct SearchProceduresEmpty {
    ids: FixtureIds,
}

impl SearchProceduresEmpty {
    pub fn new(ids: FixtureIds) -> Self {
        SearchProceduresEmpty { ids }
    }
}

#[async_trait]
impl Scenario for SearchProceduresEmpty {
    fn id(&self) -> &'static str {
        "06b"
    }

    fn name(&self) -> &'static str {
        "search empty surgery plan"
    }

    fn prompt(&self) -> String {
        format!(
            "Task: Search for surgery plan\n\
             \n\
             Search and find if patient id={} has any surgery plan on record.\n\
             \n\
             If found, return the surgery plan's ID using the following format: <SURGERY_PLAN>plan_id</SURGERY_PLAN>.\n\
             If none found, return the exact sentence: No surgery plan found.",
            self.ids.second_patient
        )
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(
            fhir,
            &[
                patient(&self.ids.patient),
                second_patient(&self.ids.second_patient),
                procedure(&self.ids.procedure, &self.ids.patient),
            ],
        )
        .await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let subject = reference(ResourceKind::Patient, &self.ids.second_patient);
        let response = fhir
            .search(ResourceKind::Procedure, &[("subject", subject.as_str())])
            .await?;
        expect_status(&response, 200)?;
        let bundle = response.bundle()?;
        if bundle.is_empty() {
            Ok("No surgery plan found.".to_string())
        } else {
            let id = bundle.resource_id(0).unwrap_or("unknown");
            Ok(format!("Surgery plan found: <SURGERY_PLAN>{id}</SURGERY_PLAN>"))
        }
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let subject = reference(ResourceKind::Patient, &self.ids.second_patient);
        let response = fhir
            .search(ResourceKind::Procedure, &[("subject", subject.as_str())])
            .await?;
        expect_status(&response, 200)?;
        expect_empty_bundle(&response)?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![vec!["getAllResources"], vec!["getResourceById"]],
            resource_types: vec!["Procedure"],
            prohibited_tools: vec!["createResource", "updateResource", "deleteResource"],
            ..ToolExpectations::default()
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        expect_answer_contains(answer, "No surgery plan found")
    }
}
