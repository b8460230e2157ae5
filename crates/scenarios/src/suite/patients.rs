//! Patient registration and lookup.

use async_trait::async_trait;
use evals_fixtures::{patient, FixtureIds};
use evals_types::ResourceKind;
use fhir_client::FhirClient;

use crate::checks::{
    answer_tag, created_id, expect_answer_contains, expect_bundle_size, expect_created,
    expect_empty_bundle, expect_field, expect_status, expect_tag, first_resource, string_at,
    CheckResult,
};
use crate::failure::ToolExpectations;
use crate::{Scenario, ScenarioResult};

/// Scenario 01: register a brand-new patient and report the server id.
pub struct RegisterPatient {
    ids: FixtureIds,
}

impl RegisterPatient {
    pub fn new(ids: FixtureIds) -> Self {
        RegisterPatient { ids }
    }
}

#[async_trait]
impl Scenario for RegisterPatient {
    fn id(&self) -> &'static str {
        "01"
    }

    fn name(&self) -> &'static str {
        "register new patient"
    }

    fn prompt(&self) -> String {
        "Task: Create a new patient record\n\
         \n\
         You need to create a new patient with the following information:\n\
         - Full Name: John Doe\n\
         - Birth Date: June 15, 1990\n\
         - Phone Number: 123-456-7890\n\
         - Address: 123 Main St, Boston, MA\n\
         \n\
         Return the created patient's ID from the FHIR server using the following format:\n\
         <patient_id>PATIENTID</patient_id>"
            .to_string()
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(fhir, &[]).await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let response = fhir
            .create(&super::without_id(patient(&self.ids.patient)))
            .await?;
        expect_created(&response)?;
        let id = created_id(&response)?;
        Ok(format!(
            "Created patient John Doe with ID <patient_id>{id}</patient_id>"
        ))
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let response = fhir
            .search(
                ResourceKind::Patient,
                &[
                    ("family", "Doe"),
                    ("given", "John"),
                    ("birthdate", "1990-06-15"),
                ],
            )
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let found = first_resource(&response, &bundle)?;
        expect_field(response.context(), found, "/name/0/family", "Doe")?;
        expect_field(response.context(), found, "/name/0/given/0", "John")?;
        expect_field(response.context(), found, "/birthDate", "1990-06-15")?;
        string_at(response.context(), found, "/id")?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![vec!["createResource"]],
            resource_types: vec!["Patient"],
            prohibited_tools: vec!["deleteResource"],
            ..ToolExpectations::default()
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        answer_tag(answer, "patient_id").map(|_| ())
    }
}

/// Scenario 02a: the patient is on file; find them by name and birth date.
pub struct SearchPatient {
    ids: FixtureIds,
}

impl SearchPatient {
    pub fn new(ids: FixtureIds) -> Self {
        SearchPatient { ids }
    }
}

#[async_trait]
impl Scenario for SearchPatient {
    fn id(&self) -> &'static str {
        "02a"
    }

    fn name(&self) -> &'static str {
        "search existing patient"
    }

    fn prompt(&self) -> String {
        "Task: Search for an existing patient\n\
         \n\
         Search the FHIR server for the following patient:\n\
         - Full Name: John Doe\n\
         - Birth Date: June 15, 1990\n\
         \n\
         If the patient exists, return the patient's ID using the following format:\n\
         <patient_id>PATIENTID</patient_id>"
            .to_string()
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(fhir, &[patient(&self.ids.patient)]).await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let response = fhir
            .search(
                ResourceKind::Patient,
                &[
                    ("family", "Doe"),
                    ("given", "John"),
                    ("birthdate", "1990-06-15"),
                ],
            )
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let found = first_resource(&response, &bundle)?;
        let id = string_at(response.context(), found, "/id")?;
        Ok(format!("Found the patient: <patient_id>{id}</patient_id>"))
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let response = fhir
            .search(
                ResourceKind::Patient,
                &[
                    ("family", "Doe"),
                    ("given", "John"),
                    ("birthdate", "1990-06-15"),
                ],
            )
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let found = first_resource(&response, &bundle)?;
        expect_field(response.context(), found, "/id", &self.ids.patient)?;
        expect_field(response.context(), found, "/name/0/family", "Doe")?;
        expect_field(response.context(), found, "/birthDate", "1990-06-15")?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![vec!["getAllResources"], vec!["getResourceById"]],
            resource_types: vec!["Patient"],
            prohibited_tools: vec!["createResource", "updateResource", "deleteResource"],
            ..ToolExpectations::default()
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        expect_tag(answer, "patient_id", &self.ids.patient)
    }
}

/// Scenario 02b: nobody matches the search; the answer must say so
/// instead of inventing a record.
pub struct SearchPatientMissing {
    ids: FixtureIds,
}

impl SearchPatientMissing {
    pub fn new(ids: FixtureIds) -> Self {
        SearchPatientMissing { ids }
    }
}

#[async_trait]
impl Scenario for SearchPatientMissing {
    fn id(&self) -> &'static str {
        "02b"
    }

    fn name(&self) -> &'static str {
        "search nonexistent patient"
    }

    fn prompt(&self) -> String {
        "Task: Search for an existing patient\n\
         \n\
         Search the FHIR server for the following patient:\n\
         - Full Name: John Doe\n\
         - Birth Date: June 15, 1991\n\
         \n\
         If the patient exists, return the patient's ID using the following format:\n\
         <patient_id>PATIENTID</patient_id>\n\
         If the patient doesn't exist, return this exact sentence: \"This is a new patient\""
            .to_string()
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(fhir, &[patient(&self.ids.patient)]).await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let response = fhir
            .search(
                ResourceKind::Patient,
                &[
                    ("family", "Doe"),
                    ("given", "John"),
                    ("birthdate", "1991-06-15"),
                ],
            )
            .await?;
        expect_status(&response, 200)?;
        let bundle = response.bundle()?;
        if bundle.is_empty() {
            Ok("This is a new patient".to_string())
        } else {
            let id = bundle.resource_id(0).unwrap_or("unknown");
            Ok(format!("Found the patient: <patient_id>{id}</patient_id>"))
        }
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let response = fhir
            .search(
                ResourceKind::Patient,
                &[
                    ("family", "Doe"),
                    ("given", "John"),
                    ("birthdate", "1991-06-15"),
                ],
            )
            .await?;
        expect_status(&response, 200)?;
        expect_empty_bundle(&response)?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![vec!["getAllResources"], vec!["getResourceById"]],
            resource_types: vec!["Patient"],
            prohibited_tools: vec!["createResource", "updateResource", "deleteResource"],
            ..ToolExpectations::default()
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        expect_answer_contains(answer, "new patient")
    }
}
