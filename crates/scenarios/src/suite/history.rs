//! Medical-history scenarios: recording and reading conditions.

use async_trait::async_trait;
use evals_fixtures::{condition, patient, second_patient, FixtureIds};
use evals_types::{reference, ResourceKind};
use fhir_client::FhirClient;

use crate::checks::{
    answer_tag, created_id, expect_answer_contains, expect_bundle_size, expect_created,
    expect_empty_bundle, expect_field, expect_reference, expect_status, expect_tag,
    first_resource, string_at, CheckResult,
};
use crate::failure::ToolExpectations;
use crate::{Scenario, ScenarioResult};

/// Scenario 03: add a hypertension diagnosis to the patient's history.
pub struct RecordCondition {
    ids: FixtureIds,
}

impl RecordCondition {
    pub fn new(ids: FixtureIds) -> Self {
        RecordCondition { ids }
    }
}

#[async_trait]
impl Scenario for RecordCondition {
    fn id(&self) -> &'static str {
        "03"
    }

    fn name(&self) -> &'static str {
        "record medical condition"
    }

    fn prompt(&self) -> String {
        format!(
            "Task: Record a medical condition\n\
             \n\
             Record a medical condition for the patient id={} in his medical history\n\
             that he has a hypertension.\n\
             \n\
             Return the recorded condition's ID using the following format: <CONDITION>condition_id</CONDITION>",
            self.ids.patient
        )
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(fhir, &[patient(&self.ids.patient)]).await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let response = fhir
            .create(&super::without_id(condition(
                &self.ids.condition,
                &self.ids.patient,
            )))
            .await?;
        expect_created(&response)?;
        let id = created_id(&response)?;
        Ok(format!("Condition recorded: <CONDITION>{id}</CONDITION>"))
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let subject = reference(ResourceKind::Patient, &self.ids.patient);
        let response = fhir
            .search(ResourceKind::Condition, &[("subject", subject.as_str())])
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let found = first_resource(&response, &bundle)?;
        expect_field(response.context(), found, "/code/text", "Hypertension")?;
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
            resource_types: vec!["Condition"],
            prohibited_tools: vec!["deleteResource"],
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        answer_tag(answer, "CONDITION").map(|_| ())
    }
}

/// Scenario 04a: the patient has history on file; find it.
pub struct SearchConditions {
    ids: FixtureIds,
}

impl SearchConditions {
    pub fn new(ids: FixtureIds) -> Self {
        SearchConditions { ids }
    }
}

#[async_trait]
impl Scenario for SearchConditions {
    fn id(&self) -> &'static str {
        "04a"
    }

    fn name(&self) -> &'static str {
        "search medical history"
    }

    fn prompt(&self) -> String {
        format!(
            "Task: Search for patient medical history\n\
             \n\
             Search for the existing patient id={} to see if he has any medical history.\n\
             \n\
             If found, return the condition's ID using the following format: <CONDITION>condition_id</CONDITION>",
            self.ids.patient
        )
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(
            fhir,
            &[
                patient(&self.ids.patient),
                condition(&self.ids.condition, &self.ids.patient),
            ],
        )
        .await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let subject = reference(ResourceKind::Patient, &self.ids.patient);
        let response = fhir
            .search(ResourceKind::Condition, &[("subject", subject.as_str())])
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let found = first_resource(&response, &bundle)?;
        let id = string_at(response.context(), found, "/id")?;
        Ok(format!("Medical history found: <CONDITION>{id}</CONDITION>"))
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let subject = reference(ResourceKind::Patient, &self.ids.patient);
        let response = fhir
            .search(ResourceKind::Condition, &[("subject", subject.as_str())])
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let found = first_resource(&response, &bundle)?;
        expect_field(response.context(), found, "/id", &self.ids.condition)?;
        expect_field(response.context(), found, "/code/text", "Hypertension")?;
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
            resource_types: vec!["Condition"],
            prohibited_tools: vec!["createResource", "updateResource", "deleteResource"],
            ..ToolExpectations::default()
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        expect_tag(answer, "CONDITION", &self.ids.condition)
    }
}

/// Scenario 04b: a different patient with no history; the answer must
/// say so.
pub struct SearchConditionsEmpty {
    ids: FixtureIds,
}

impl SearchConditionsEmpty {
    pub fn new(ids: FixtureIds) -> Self {
        SearchConditionsEmpty { ids }
    }
}

#[async_trait]
impl Scenario for SearchConditionsEmpty {
    fn id(&self) -> &'static str {
        "04b"
    }

    fn name(&self) -> &'static str {
        "search empty medical history"
    }

    fn prompt(&self) -> String {
        format!(
            "Task: Search for patient medical history\n\
             \n\
             Search for the existing patient id={} to see if there is any medical history\n\
             on record.\n\
             \n\
             If found, return the condition's ID using the following format: <CONDITION>condition_id</CONDITION>\n\
             If not, return this exact sentence: \"No medical history found\"",
            self.ids.second_patient
        )
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(
            fhir,
            &[
                patient(&self.ids.patient),
                second_patient(&self.ids.second_patient),
                condition(&self.ids.condition, &self.ids.patient),
            ],
        )
        .await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let subject = reference(ResourceKind::Patient, &self.ids.second_patient);
        let response = fhir
            .search(ResourceKind::Condition, &[("subject", subject.as_str())])
            .await?;
        expect_status(&response, 200)?;
        let bundle = response.bundle()?;
        if bundle.is_empty() {
            Ok("No medical history found".to_string())
        } else {
            let id = bundle.resource_id(0).unwrap_or("unknown");
            Ok(format!("Medical history found: <CONDITION>{id}</CONDITION>"))
        }
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let subject = reference(ResourceKind::Patient, &self.ids.second_patient);
        let response = fhir
            .search(ResourceKind::Condition, &[("subject", subject.as_str())])
            .await?;
        expect_status(&response, 200)?;
        expect_empty_bundle(&response)?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![vec!["getAllResources"], vec!["getResourceById"]],
            resource_types: vec!["Condition"],
            prohibited_tools: vec!["createResource", "updateResource", "deleteResource"],
            ..ToolExpectations::default()
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        expect_answer_contains(answer, "No medical history found")
    }
}
