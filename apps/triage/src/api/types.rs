//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API. Field names are
//! camelCase, like the core types they embed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use triage_core::{
    AutoResolution, ClassifierContext, ClinicalObservation, Escalation, FlowState, FlowUpdate,
    Group, Measure, MetricReading, PatientFlow, PatientId, PatientRecord, PendingAuto, Protocol,
    Sex, Step, StepId, StepKind, TriageError, classify_all,
    primitives::{MAX_ANSWER_LENGTH, MAX_PATIENT_ID_LENGTH},
};

/// Maximum number of allergies accepted at intake.
pub const MAX_ALLERGIES: usize = 64;

/// Oldest accepted declared age, in years.
pub const MAX_AGE_YEARS: u32 = 150;

// =============================================================================
// HEALTH / ERROR
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol: String,
}

impl HealthResponse {
    #[must_use]
    pub fn new(protocol: &str) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol: protocol.to_string(),
        }
    }
}

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

// =============================================================================
// PROTOCOL
// =============================================================================

/// A selectable option, with the index `advance` expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionView {
    pub index: usize,
    pub text: String,
    pub next: StepId,
    #[serde(default)]
    pub value: Option<String>,
}

/// A step joined with its presentation text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub id: StepId,
    pub kind: StepKind,
    pub title: String,
    pub description: String,
    pub group: Option<Group>,
    pub requires_labs: bool,
    /// Whether the step resolves on its own instead of by choice.
    pub automatic: bool,
    pub options: Vec<OptionView>,
}

impl StepView {
    #[must_use]
    pub fn new(step: &Step, protocol: &Protocol) -> Self {
        let text = protocol.presentation.text(&step.id);
        Self {
            id: step.id.clone(),
            kind: step.kind,
            title: text
                .map(|t| t.title.clone())
                .unwrap_or_else(|| step.id.to_string()),
            description: text.map(|t| t.description.clone()).unwrap_or_default(),
            group: step.group,
            requires_labs: step.requires_labs,
            automatic: step.is_auto(),
            options: step
                .options
                .iter()
                .enumerate()
                .map(|(index, option)| OptionView {
                    index,
                    text: option.text.clone(),
                    next: option.next.clone(),
                    value: option.value.clone(),
                })
                .collect(),
        }
    }
}

/// The whole loaded protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolResponse {
    pub name: String,
    pub start: StepId,
    pub steps: Vec<StepView>,
}

impl ProtocolResponse {
    #[must_use]
    pub fn new(protocol: &Protocol) -> Self {
        Self {
            name: protocol.name.clone(),
            start: protocol.graph.start().id.clone(),
            steps: protocol
                .graph
                .steps()
                .map(|step| StepView::new(step, protocol))
                .collect(),
        }
    }
}

// =============================================================================
// INTAKE
// =============================================================================

/// Patient intake request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRequest {
    pub id: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub weight: Option<Measure>,
    /// Free text: `"M"`, `"female"` ... Anything else is unknown.
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

impl IntakeRequest {
    /// Validate the request and build the patient record.
    pub fn into_record(self) -> Result<PatientRecord, TriageError> {
        let id = self.id.trim();
        if id.is_empty() || id.len() > MAX_PATIENT_ID_LENGTH {
            return Err(TriageError::InvalidInput(format!(
                "id must be 1 to {} bytes",
                MAX_PATIENT_ID_LENGTH
            )));
        }
        if self.age.is_some_and(|age| age > MAX_AGE_YEARS) {
            return Err(TriageError::InvalidInput(format!(
                "age exceeds {} years",
                MAX_AGE_YEARS
            )));
        }
        if self.weight.is_some_and(|w| !w.is_positive()) {
            return Err(TriageError::InvalidInput("weight must be positive".to_string()));
        }
        if self.allergies.len() > MAX_ALLERGIES {
            return Err(TriageError::InvalidInput(format!(
                "at most {} allergies",
                MAX_ALLERGIES
            )));
        }
        if self
            .allergies
            .iter()
            .any(|a| a.trim().is_empty() || a.len() > MAX_ANSWER_LENGTH)
        {
            return Err(TriageError::InvalidInput(format!(
                "allergies must be 1 to {} bytes",
                MAX_ANSWER_LENGTH
            )));
        }

        let mut record = PatientRecord::new(PatientId::new(id));
        record.age = self.age;
        record.weight = self.weight;
        record.gender = self.gender.as_deref().map(Sex::parse).unwrap_or_default();
        record.birth_date = self.birth_date;
        record.allergies = self.allergies;
        Ok(record)
    }
}

// =============================================================================
// NAVIGATION
// =============================================================================

/// Choose an option on the current step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceRequest {
    pub option: usize,
}

/// A patient's flow as returned by every patient endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowResponse {
    pub success: bool,
    pub patient: PatientRecord,
    pub state: FlowState,
    /// The current step, `None` only if the protocol lost it.
    pub step: Option<StepView>,
    pub observation: ClinicalObservation,
    /// Live classification of every measured metric.
    pub readings: Vec<MetricReading>,
    pub pending: Option<PendingAuto>,
    /// The transition just applied moved the patient onto `end`.
    pub completed: bool,
    pub escalation: Option<Escalation>,
    pub resolution: Option<AutoResolution>,
}

impl FlowResponse {
    #[must_use]
    pub fn from_flow(flow: PatientFlow, protocol: &Protocol) -> Self {
        let step = protocol
            .graph
            .get(flow.state.current_step.as_str())
            .map(|step| StepView::new(step, protocol));
        let readings = classify_all(&flow.observation, &flow.context);
        Self {
            success: true,
            patient: flow.patient,
            state: flow.state,
            step,
            observation: flow.observation,
            readings,
            pending: flow.pending,
            completed: false,
            escalation: None,
            resolution: None,
        }
    }

    #[must_use]
    pub fn from_update(update: FlowUpdate, protocol: &Protocol) -> Self {
        let mut response = Self::from_flow(update.flow, protocol);
        response.completed = update.completed;
        response.escalation = update.escalation;
        response.resolution = update.resolution;
        response
    }
}

/// One row of the patient list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub id: PatientId,
    pub current_step: StepId,
    pub title: String,
    pub progress: u8,
    pub group: Option<Group>,
    pub complete: bool,
    pub pending: bool,
}

impl PatientSummary {
    #[must_use]
    pub fn new(flow: &PatientFlow, protocol: &Protocol) -> Self {
        Self {
            id: flow.id().clone(),
            current_step: flow.state.current_step.clone(),
            title: protocol
                .presentation
                .title(&flow.state.current_step)
                .to_string(),
            progress: flow.state.progress,
            group: flow.state.group,
            complete: flow.state.is_complete(),
            pending: flow.pending.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientListResponse {
    pub count: usize,
    pub patients: Vec<PatientSummary>,
}

// =============================================================================
// CLASSIFY / DETECT
// =============================================================================

/// Classification request.
///
/// With `metric` and `value`, one raw form value is classified (`"120"`,
/// `"90/60"`, `"HI"`). Otherwise every metric of `observation` is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyRequest {
    pub metric: Option<String>,
    pub value: Option<String>,
    pub observation: ClinicalObservation,
    pub context: ClassifierContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub readings: Vec<MetricReading>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub escalation: Option<Escalation>,
}
