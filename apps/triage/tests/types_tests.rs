//! Tests for the API request/response types.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use triage::api::{
    ClassifyRequest, ErrorResponse, FlowResponse, HealthResponse, IntakeRequest, PatientSummary,
    ProtocolResponse, StepView,
};
use triage_core::{
    ClinicalObservation, Group, Measure, PatientFlow, PatientId, PatientRecord, Protocol, Sex,
    StepId, TriageError,
};

fn intake(id: &str) -> IntakeRequest {
    IntakeRequest {
        id: id.to_string(),
        age: None,
        weight: None,
        gender: None,
        birth_date: None,
        allergies: Vec::new(),
    }
}

fn admitted(id: &str) -> PatientFlow {
    let today = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    PatientFlow::admit(PatientRecord::new(PatientId::new(id)), today)
}

// =============================================================================
// HEALTH / ERROR
// =============================================================================

#[test]
fn test_health_response_serialization() {
    let response = HealthResponse::new("dengue");
    let json = serde_json::to_string(&response).unwrap();

    assert!(json.contains("\"status\":\"ok\""));
    assert!(json.contains("\"protocol\":\"dengue\""));
    assert!(json.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_error_response_is_never_success() {
    let response = ErrorResponse::new("Patient not found: p-1");
    assert!(!response.success);

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["success"], false);
    assert_eq!(value["error"], "Patient not found: p-1");
}

// =============================================================================
// INTAKE
// =============================================================================

#[test]
fn test_intake_request_defaults() {
    let request: IntakeRequest = serde_json::from_str(r#"{"id": "p-1"}"#).unwrap();
    assert_eq!(request.id, "p-1");
    assert!(request.age.is_none());
    assert!(request.allergies.is_empty());
}

#[test]
fn test_intake_request_camel_case() {
    let request: IntakeRequest = serde_json::from_str(
        r#"{"id": "p-1", "age": 34, "weight": "62.5", "gender": "female",
            "birthDate": "1990-05-14", "allergies": ["penicillin"]}"#,
    )
    .unwrap();

    let record = request.into_record().unwrap();
    assert_eq!(record.id.as_str(), "p-1");
    assert_eq!(record.age, Some(34));
    assert_eq!(record.weight, Some("62.5".parse::<Measure>().unwrap()));
    assert_eq!(record.gender, Sex::Female);
    assert_eq!(
        record.birth_date,
        chrono::NaiveDate::from_ymd_opt(1990, 5, 14)
    );
    assert_eq!(record.allergies, vec!["penicillin".to_string()]);
}

#[test]
fn test_intake_unknown_gender_is_unknown() {
    let mut request = intake("p-1");
    request.gender = Some("other".to_string());
    assert_eq!(request.into_record().unwrap().gender, Sex::Unknown);
}

#[test]
fn test_intake_trims_id() {
    let record = intake("  p-9 ").into_record().unwrap();
    assert_eq!(record.id.as_str(), "p-9");
}

#[test]
fn test_intake_validation() {
    assert!(matches!(
        intake("   ").into_record(),
        Err(TriageError::InvalidInput(_))
    ));
    assert!(matches!(
        intake(&"x".repeat(129)).into_record(),
        Err(TriageError::InvalidInput(_))
    ));

    let mut too_old = intake("p-1");
    too_old.age = Some(151);
    assert!(too_old.into_record().is_err());

    let mut weightless = intake("p-1");
    weightless.weight = Some(Measure::from_whole(0));
    assert!(weightless.into_record().is_err());

    let mut blank_allergy = intake("p-1");
    blank_allergy.allergies = vec![" ".to_string()];
    assert!(blank_allergy.into_record().is_err());

    let mut many = intake("p-1");
    many.allergies = (0..65).map(|i| format!("a{}", i)).collect();
    assert!(many.into_record().is_err());
}

// =============================================================================
// PROTOCOL VIEWS
// =============================================================================

#[test]
fn test_step_view_joins_presentation() {
    let protocol = Protocol::dengue().unwrap();
    let step = protocol.graph.lookup(&StepId::new("alarm_check")).unwrap();
    let view = StepView::new(step, &protocol);

    assert_eq!(view.title, "Alarm signs");
    assert!(!view.description.is_empty());
    assert!(!view.automatic);
    assert_eq!(view.options[0].value.as_deref(), Some("absent"));

    let value = serde_json::to_value(&view).unwrap();
    assert_eq!(value["requiresLabs"], false);
}

#[test]
fn test_protocol_response_covers_graph() {
    let protocol = Protocol::dengue().unwrap();
    let response = ProtocolResponse::new(&protocol);

    assert_eq!(response.steps.len(), protocol.graph.len());
    assert_eq!(response.start, StepId::new("start"));
}

// =============================================================================
// FLOWS
// =============================================================================

#[test]
fn test_flow_response_from_fresh_flow() {
    let protocol = Protocol::dengue().unwrap();
    let response = FlowResponse::from_flow(admitted("p-1"), &protocol);

    assert!(response.success);
    assert!(!response.completed);
    assert!(response.readings.is_empty());
    assert!(response.escalation.is_none());
    assert_eq!(response.step.unwrap().id, StepId::new("start"));

    let value = serde_json::to_value(FlowResponse::from_flow(admitted("p-1"), &protocol)).unwrap();
    assert_eq!(value["state"]["currentStep"], "start");
    assert!(value.get("escalation").is_some());
}

#[test]
fn test_flow_response_classifies_observation() {
    let protocol = Protocol::dengue().unwrap();
    let mut flow = admitted("p-1");
    flow.observation = ClinicalObservation {
        heart_rate: Some(Measure::from_whole(80)),
        ..Default::default()
    };

    let response = FlowResponse::from_flow(flow, &protocol);
    assert_eq!(response.readings.len(), 1);
}

#[test]
fn test_patient_summary() {
    let protocol = Protocol::dengue().unwrap();
    let flow = admitted("p-1");
    let summary = PatientSummary::new(&flow, &protocol);

    assert_eq!(summary.id, PatientId::new("p-1"));
    assert_eq!(summary.title, "Suspected dengue");
    assert_eq!(summary.group, None::<Group>);
    assert!(!summary.complete);
    assert!(!summary.pending);

    let value = serde_json::to_value(&summary).unwrap();
    assert_eq!(value["currentStep"], "start");
}

// =============================================================================
// CLASSIFY
// =============================================================================

#[test]
fn test_classify_request_defaults() {
    let request: ClassifyRequest = serde_json::from_str("{}").unwrap();
    assert!(request.metric.is_none());
    assert!(request.value.is_none());
    assert_eq!(request.observation, ClinicalObservation::default());
}

#[test]
fn test_classify_request_with_context() {
    let request: ClassifyRequest = serde_json::from_str(
        r#"{"metric": "hemoglobin", "value": "10", "context": {"ageMonths": 18}}"#,
    )
    .unwrap();
    assert_eq!(request.metric.as_deref(), Some("hemoglobin"));
    assert_eq!(request.context.age_months, Some(18));
}
