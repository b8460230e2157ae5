//! Scenario suite exercised end-to-end against the in-process stub.
//!
//! Every test drives scenarios the way the runner does in human mode:
//! prepare, act, check the answer, verify.

#[path = "../../fhir-client/tests/common/mod.rs"]
mod stub;

use evals_fixtures::FixtureIds;
use evals_scenarios::suite::{
    BookAppointment, CancelAppointment, SearchCoverage, SearchCoverageEmpty, SearchPatient,
    SearchPatientMissing,
};
use evals_scenarios::{registry, Scenario};
use evals_types::ResourceKind;
use fhir_client::FhirClient;

async fn client() -> (stub::StubServer, FhirClient) {
    let server = stub::start().await;
    let fhir = FhirClient::new(&server.base_url).expect("client");
    (server, fhir)
}

async fn run_human(scenario: &dyn Scenario, fhir: &FhirClient) -> String {
    scenario
        .prepare(fhir)
        .await
        .unwrap_or_else(|err| panic!("scenario {} prepare failed: {err}", scenario.id()));
    let answer = scenario
        .act(fhir)
        .await
        .unwrap_or_else(|err| panic!("scenario {} act failed: {err}", scenario.id()));
    scenario
        .check_answer(&answer)
        .unwrap_or_else(|err| panic!("scenario {} rejected its own answer: {err}", scenario.id()));
    scenario
        .verify(fhir)
        .await
        .unwrap_or_else(|err| panic!("scenario {} verify failed: {err}", scenario.id()));
    answer
}

#[tokio::test]
async fn the_whole_suite_passes_in_human_mode() {
    let (_server, fhir) = client().await;

    for scenario in registry() {
        run_human(scenario.as_ref(), &fhir).await;
    }
}

#[tokio::test]
async fn patient_search_distinguishes_hit_and_miss() {
    let (_server, fhir) = client().await;

    let hit = SearchPatient::new(FixtureIds::default());
    let answer = run_human(&hit, &fhir).await;
    assert!(answer.contains("<patient_id>PAT001</patient_id>"));

    let miss = SearchPatientMissing::new(FixtureIds::default());
    let answer = run_human(&miss, &fhir).await;
    assert_eq!(answer, "This is a new patient");
}

#[tokio::test]
async fn coverage_search_distinguishes_hit_and_miss() {
    let (_server, fhir) = client().await;

    let hit = SearchCoverage::new(FixtureIds::default());
    let answer = run_human(&hit, &fhir).await;
    assert!(answer.contains("<COVERAGE>COV001</COVERAGE>"));

    let miss = SearchCoverageEmpty::new(FixtureIds::default());
    let answer = run_human(&miss, &fhir).await;
    assert_eq!(answer, "No insurance coverage found");
}

#[tokio::test]
async fn booking_takes_the_slot_and_cancelling_releases_it() {
    let (_server, fhir) = client().await;
    let ids = FixtureIds::default();

    let book = BookAppointment::new(ids.clone());
    run_human(&book, &fhir).await;
    let slot = fhir
        .read(ResourceKind::Slot, &ids.free_slot)
        .await
        .expect("read slot");
    assert_eq!(slot.json().expect("slot body")["status"], "busy");

    let cancel = CancelAppointment::new(ids.clone());
    run_human(&cancel, &fhir).await;
    let slot = fhir
        .read(ResourceKind::Slot, &ids.busy_slot)
        .await
        .expect("read slot");
    assert_eq!(slot.json().expect("slot body")["status"], "free");
    let appointment = fhir
        .read(ResourceKind::Appointment, &ids.appointment)
        .await
        .expect("read appointment");
    assert_eq!(
        appointment.json().expect("appointment body")["status"],
        "cancelled"
    );
}

#[tokio::test]
async fn verify_fails_loudly_when_the_end_state_is_wrong() {
    let (_server, fhir) = client().await;
    let ids = FixtureIds::default();

    let scenario = SearchPatient::new(ids.clone());
    scenario.prepare(&fhir).await.expect("prepare");

    // Someone else empties the server between act and verify.
    fhir.delete(ResourceKind::Patient, &ids.patient)
        .await
        .expect("delete patient");

    let err = scenario.verify(&fhir).await.expect_err("verify must fail");
    let report = err.to_string();
    assert!(report.contains("expected 1"), "unhelpful failure: {report}");
}

#[test]
fn wrong_answers_are_rejected_without_a_server() {
    let scenario = SearchPatient::new(FixtureIds::default());
    assert!(scenario.check_answer("<patient_id>PAT001</patient_id>").is_ok());
    assert!(scenario.check_answer("<patient_id>PAT999</patient_id>").is_err());
    assert!(scenario.check_answer("no tag at all").is_err());

    let scenario = SearchPatientMissing::new(FixtureIds::default());
    assert!(scenario.check_answer("This is a new patient").is_ok());
    assert!(scenario.check_answer("<patient_id>PAT001</patient_id>").is_err());
}
