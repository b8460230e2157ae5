//! Guarantor scenarios: the related person behind the patient's account.

use async_trait::async_trait;
use evals_fixtures::{account, patient, related_person, FixtureIds};
use evals_types::{reference, ResourceKind};
use fhir_client::FhirClient;

use crate::checks::{
    answer_tag, created_id, expect_bundle_size, expect_created, expect_field, expect_reference,
    expect_status, expect_tag, first_resource, string_at, CheckResult,
};
use crate::failure::ToolExpectations;
use crate::{Scenario, ScenarioResult};

/// Scenario 09: register the guarantor and open an account naming her
/// as the responsible party.
///
/// The related person is created without an id so the account ends up
/// referencing whatever id the server assigned, not a guessed one.
pub struct AddGuarantor {
    ids: FixtureIds,
}

impl AddGuarantor {
    pub fn new(ids: FixtureIds) -> Self {
        AddGuarantor { ids }
    }
}

#[async_trait]
impl Scenario for AddGuarantor {
    fn id(&self) -> &'static str {
        "09"
    }

    fn name(&self) -> &'static str {
        "add guarantor account"
    }

    fn prompt(&self) -> String {
        format!(
            "Task: Add a guarantor for patient {}\n\
             \n\
             Register Alice Doe, the patient's mother, as a related person, then\n\
             create a guarantor account for the patient naming her as the\n\
             responsible party.\n\
             \n\
             After creating the account, return the account ID using the following format:\n\
             <ACCOUNT>account_id</ACCOUNT>",
            self.ids.patient
        )
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(fhir, &[patient(&self.ids.patient)]).await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let response = fhir
            .create(&super::without_id(related_person(
                &self.ids.related_person,
                &self.ids.patient,
            )))
            .await?;
        expect_created(&response)?;
        let guarantor_id = created_id(&response)?;

        let record = super::without_id(account(
            &self.ids.account,
            &self.ids.patient,
            &guarantor_id,
        ));
        let response = fhir.create(&record).await?;
        expect_created(&response)?;
        let account_id = created_id(&response)?;
        Ok(format!("Guarantor linked: <ACCOUNT>{account_id}</ACCOUNT>"))
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let patient_ref = reference(ResourceKind::Patient, &self.ids.patient);

        let related = fhir
            .search(ResourceKind::RelatedPerson, &[("patient", patient_ref.as_str())])
            .await?;
        expect_status(&related, 200)?;
        let bundle = expect_bundle_size(&related, 1)?;
        let person = first_resource(&related, &bundle)?;
        expect_field(related.context(), person, "/relationship/0/text", "Mother")?;
        let guarantor_id = string_at(related.context(), person, "/id")?;

        let accounts = fhir
            .search(ResourceKind::Account, &[("subject", patient_ref.as_str())])
            .await?;
        expect_status(&accounts, 200)?;
        let bundle = expect_bundle_size(&accounts, 1)?;
        let found = first_resource(&accounts, &bundle)?;
        expect_field(accounts.context(), found, "/status", "active")?;
        expect_reference(
            accounts.context(),
            found,
            "/subject/reference",
            ResourceKind::Patient,
            &self.ids.patient,
        )?;
        expect_reference(
            accounts.context(),
            found,
            "/guarantor/0/party/reference",
            ResourceKind::RelatedPerson,
            &guarantor_id,
        )?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![
                vec!["createResource"],
                vec!["getAllResources", "createResource"],
                vec!["getAllResources", "deleteResource", "createResource"],
            ],
            required_order: vec![("getAllResources", "createResource")],
            resource_types: vec!["RelatedPerson", "Account"],
            ..ToolExpectations::default()
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        answer_tag(answer, "ACCOUNT").map(|_| ())
    }
}

/// Scenario 10: identify the guarantor already on file.
pub struct SearchGuarantor {
    ids: FixtureIds,
}

impl SearchGuarantor {
    pub fn new(ids: FixtureIds) -> Self {
        SearchGuarantor { ids }
    }
}

#[async_trait]
impl Scenario for SearchGuarantor {
    fn id(&self) -> &'static str {
        "10"
    }

    fn name(&self) -> &'static str {
        "search guarantor"
    }

    fn prompt(&self) -> String {
        format!(
            "Task: Search for patient's guarantor\n\
             \n\
             Identify and confirm the guarantor responsible for this patient's account.\n\
             Patient's details:\n\
             - Name: John Doe\n\
             - ID: {}\n\
             \n\
             If found, return the guarantor's ID using the following format: <GUARANTOR>guarantor_id</GUARANTOR>",
            self.ids.patient
        )
    }

    async fn prepare(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        super::reset(
            fhir,
            &[
                patient(&self.ids.patient),
                related_person(&self.ids.related_person, &self.ids.patient),
                account(&self.ids.account, &self.ids.patient, &self.ids.related_person),
            ],
        )
        .await
    }

    async fn act(&self, fhir: &FhirClient) -> ScenarioResult<String> {
        let patient_ref = reference(ResourceKind::Patient, &self.ids.patient);
        let response = fhir
            .search(ResourceKind::RelatedPerson, &[("patient", patient_ref.as_str())])
            .await?;
        expect_status(&response, 200)?;
        let bundle = expect_bundle_size(&response, 1)?;
        let person = first_resource(&response, &bundle)?;
        let id = string_at(response.context(), person, "/id")?;
        Ok(format!("The guarantor on file is <GUARANTOR>{id}</GUARANTOR>"))
    }

    async fn verify(&self, fhir: &FhirClient) -> ScenarioResult<()> {
        let patient_ref = reference(ResourceKind::Patient, &self.ids.patient);

        let related = fhir
            .search(ResourceKind::RelatedPerson, &[("patient", patient_ref.as_str())])
            .await?;
        expect_status(&related, 200)?;
        let bundle = expect_bundle_size(&related, 1)?;
        let person = first_resource(&related, &bundle)?;
        expect_field(related.context(), person, "/id", &self.ids.related_person)?;
        expect_field(related.context(), person, "/name/0/given/0", "Alice")?;
        expect_field(related.context(), person, "/relationship/0/text", "Mother")?;
        expect_reference(
            related.context(),
            person,
            "/patient/reference",
            ResourceKind::Patient,
            &self.ids.patient,
        )?;

        let accounts = fhir
            .search(ResourceKind::Account, &[("subject", patient_ref.as_str())])
            .await?;
        expect_status(&accounts, 200)?;
        let bundle = expect_bundle_size(&accounts, 1)?;
        let found = first_resource(&accounts, &bundle)?;
        expect_reference(
            accounts.context(),
            found,
            "/guarantor/0/party/reference",
            ResourceKind::RelatedPerson,
            &self.ids.related_person,
        )?;
        Ok(())
    }

    fn expected_tools(&self) -> ToolExpectations {
        ToolExpectations {
            required_tools: vec![vec!["getAllResources"], vec!["getResourceById"]],
            resource_types: vec!["RelatedPerson", "Account"],
            prohibited_tools: vec!["createResource", "updateResource", "deleteResource"],
            ..ToolExpectations::default()
        }
    }

    fn check_answer(&self, answer: &str) -> CheckResult<()> {
        expect_tag(answer, "GUARANTOR", &self.ids.related_person)
    }
}
