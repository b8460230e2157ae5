//! Insurance coverage scenarios.

use async_trait::async_trait;
use evals_fixtures::{coverage, organization, patient, second_patient, FixtureIds};
use evals_types::{reference, ResourceKind};
use fhir_client::FhirClient;
use serde_json::json;

use crate::checks::{
    answer_tag, created_id, expect_answer_contains, expect_bundle_size, expect_created,
    expect_empty_bundle, expect_field, expect_reference, expect_status, expect_tag,
    first_resource, string_at, CheckResult,
};
use crate::failure::ToolExpectations;
use crate::{Scenario, ScenarioResult};

const POLICY_START: &str = "2024-05-23";
const POLICY_END: &str = "2025-05-23";

/// Scenario 07: enter the patient's insurance coverage.
pub struct RecordCoverage {
    ids: FixtureIds,
}

impl RecordCoverage {
    pub fn new(ids: FixtureIds) -> Self {
        RecordCoverage { ids }
    }
}

#[async_trait]
impl Scenario for RecordCoverage {
    fn id(&self) -> &'static str {
        "07"
    }

    fn name(&self) -> &'static str {
        "record insurance coverage"
    }

    fn prompt(&self) -> String {
        format!(
            "Task: Add insurance information for patient {}\n\
             - Insurance provider: XYZ Insurance (Organization/{})\n\
             - Policy period: {POLICY_START} to {POLICY_END}\n\
             - Subscriber and beneficiary: the patient\n\
             \n\
             After creating the coverage, return the newly created Coverage ID using the following format:\n\
             <COVERAGE>coverage_id</COVERAGE>",
            self.ids.patient, self.ids.organization
        )
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(
            fhir,
            &[
                organization(&self.ids.organization),
                patient(&self.ids.patient),
            ],
        )
        .await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let mut resource = super::without_id(coverage(
            &self.ids.coverage,
            &self.ids.patient,
            &self.ids.organization,
        ));
        resource.json_mut()["period"] = json!({ "start": POLICY_START, "end": POLICY_END });

        let response = fhir.create(&resource).await?;
        expect_created(&response)?;
        let id = created_id(&response)?;
        Ok(format!("Insurance recorded: <COVERAGE>{id}</COVERAGE>"))
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let beneficiary = reference(ResourceKind::Patient, &self.ids.patient);
        let response = fhir
            .search(
                ResourceKind::Coverage,
                &[("beneficiary", beneficiary.as_str()), ("status", "active")],
            )
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let found = first_resource(&response, &bundle)?;
        expect_field(response.context(), found, "/status", "active")?;
        expect_reference(
            response.context(),
            found,
            "/subscriber/reference",
            ResourceKind::Patient,
            &self.ids.patient,
        )?;
        expect_reference(
            response.context(),
            found,
            "/beneficiary/reference",
            ResourceKind::Patient,
            &self.ids.patient,
        )?;
        expect_reference(
            response.context(),
            found,
            "/insurer/reference",
            ResourceKind::Organization,
            &self.ids.organization,
        )?;
        expect_field(response.context(), found, "/period/start", POLICY_START)?;
        expect_field(response.context(), found, "/period/end", POLICY_END)?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![
                vec!["createResource"],
                vec!["getAllResources", "createResource"],
            ],
            required_order: vec![("getAllResources", "createResource")],
            resource_types: vec!["Coverage"],
            prohibited_tools: vec!["deleteResource"],
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        answer_tag(answer, "COVERAGE").map(|_| ())
    }
}

/// Scenario 08a: coverage is on file; find it by beneficiary.
pub struct SearchCoverage {
    ids: FixtureIds,
}

impl SearchCoverage {
    pub fn new(ids: FixtureIds) -> Self {
        SearchCoverage { ids }
    }
}

#[async_trait]
impl Scenario for SearchCoverage {
    fn id(&self) -> &'static str {
        "08a"
    }

    fn name(&self) -> &'static str {
        "search insurance coverage"
    }

    fn prompt(&self) -> String {
        format!(
            "Task: Search for patient insurance information\n\
             \n\
             Search if patient insurance information has been entered in the system for:\n\
             - Beneficiary: John Doe (id={})\n\
             \n\
             If found, return the coverage ID using the following format: <COVERAGE>coverage_id</COVERAGE>",
            self.ids.patient
        )
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(
            fhir,
            &[
                organization(&self.ids.organization),
                patient(&self.ids.patient),
                coverage(&self.ids.coverage, &self.ids.patient, &self.ids.organization),
            ],
        )
        .await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let beneficiary = reference(ResourceKind::Patient, &self.ids.patient);
        let response = fhir
            .search(
                ResourceKind::Coverage,
                &[("beneficiary", beneficiary.as_str()), ("status", "active")],
            )
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let found = first_resource(&response, &bundle)?;
        let id = string_at(response.context(), found, "/id")?;
        Ok(format!("Coverage found: <COVERAGE>{id}</COVERAGE>"))
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let beneficiary = reference(ResourceKind::Patient, &self.ids.patient);
        let response = fhir
            .search(
                ResourceKind::Coverage,
                &[("beneficiary", beneficiary.as_str()), ("status", "active")],
            )
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let found = first_resource(&response, &bundle)?;
        expect_field(response.context(), found, "/id", &self.ids.coverage)?;
        expect_field(response.context(), found, "/status", "active")?;
        expect_reference(
            response.context(),
            found,
            "/beneficiary/reference",
            ResourceKind::Patient,
            &self.ids.patient,
        )?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![vec!["getAllResources"], vec!["getResourceById"]],
            resource_types: vec!["Coverage"],
            prohibited_tools: vec!["createResource", "updateResource", "deleteResource"],
            ..ToolExpectations::default()
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        expect_tag(answer, "COVERAGE", &self.ids.coverage)
    }
}

/// Scenario 08b: the second patient carries no coverage.
pub struct SearchCoverageEmpty {
    ids: FixtureIds,
}

impl SearchCoverageEmpty {
    pub fn new(ids: FixtureIds) -> Self {
        SearchCoverageEmpty { ids }
    }
}

#[async_trait]
impl Scenario for SearchCoverageEmpty {
    fn id(&self) -> &'static str {
        "08b"
    }

    fn name(&self) -> &'static str {
        "search missing insurance coverage"
    }

    fn prompt(&self) -> String {
        format!(
            "Task: Search for patient ({}) insurance information\n\
             \n\
             Search if patient insurance information has been entered in the system for:\n\
             - Beneficiary: Jane Doe (id={})\n\
             \n\
             If found, return the coverage ID using the following format: <COVERAGE>coverage_id</COVERAGE>\n\
             If none found, return the exact sentence: No insurance coverage found",
            self.ids.second_patient, self.ids.second_patient
        )
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(
            fhir,
            &[
                organization(&self.ids.organization),
                patient(&self.ids.patient),
                second_patient(&self.ids.second_patient),
                coverage(&self.ids.coverage, &self.ids.patient, &self.ids.organization),
            ],
        )
        .await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let beneficiary = reference(ResourceKind::Patient, &self.ids.second_patient);
        let response = fhir
            .search(
                ResourceKind::Coverage,
                &[("beneficiary", beneficiary.as_str()), ("status", "active")],
            )
            .await?;
        expect_status(&response, 200)?;
        let bundle = response.bundle()?;
        if bundle.is_empty() {
            Ok("No insurance coverage found".to_string())
        } else {
            let id = bundle.resource_id(0).unwrap_or("unknown");
            Ok(format!("Coverage found: <COVERAGE>{id}</COVERAGE>"))
        }
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let beneficiary = reference(ResourceKind::Patient, &self.ids.second_patient);
        let response = fhir
            .search(
                ResourceKind::Coverage,
                &[("beneficiary", beneficiary.as_str()), ("status", "active")],
            )
            .await?;
        expect_status(&response, 200)?;
        expect_empty_bundle(&response)?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![vec!["getAllResources"], vec!["getResourceById"]],
            resource_types: vec!["Coverage"],
            prohibited_tools: vec!["createResource", "updateResource", "deleteResource"],
            ..ToolExpectations::default()
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        expect_answer_contains(answer, "No insurance coverage found")
    }
}
