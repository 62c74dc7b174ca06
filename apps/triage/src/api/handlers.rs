//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Core errors map to status codes in one place, [`ApiError`]:
//! unknown patient or step → 404, rejected input → 400, duplicate
//! admission → 409, storage or codec failure → 500.

use super::{
    AppState,
    types::{
        AdvanceRequest, ClassifyRequest, ClassifyResponse, DetectResponse, ErrorResponse,
        FlowResponse, HealthResponse, IntakeRequest, PatientListResponse, PatientSummary,
        ProtocolResponse, StepView,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use triage_core::{
    ClinicalObservation, Metric, MetricReading, PatientId, StepId, TriageError, classify_all,
    classify_input, detect,
};

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// A core error on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub TriageError);

impl From<TriageError> for ApiError {
    fn from(e: TriageError) -> Self {
        Self(e)
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            TriageError::PatientNotFound(_) | TriageError::StepNotFound(_) => StatusCode::NOT_FOUND,
            TriageError::InvalidOption { .. }
            | TriageError::NotAutoStep(_)
            | TriageError::LabsPending(_)
            | TriageError::InvalidInput(_)
            | TriageError::InvalidProtocol(_) => StatusCode::BAD_REQUEST,
            TriageError::DuplicatePatient(_) => StatusCode::CONFLICT,
            TriageError::SerializationError(_) | TriageError::IoError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (status, Json(ErrorResponse::new(self.0.to_string()))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse::new(&state.service.protocol().name))
}

// =============================================================================
// PROTOCOL HANDLERS
// =============================================================================

/// The loaded protocol, every step with its presentation.
pub async fn protocol_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(ProtocolResponse::new(state.service.protocol()))
}

/// One step of the loaded protocol.
pub async fn step_handler(
    State(state): State<AppState>,
    Path(step): Path<String>,
) -> ApiResult<StepView> {
    let protocol = state.service.protocol();
    let step = protocol.graph.lookup(&StepId::new(step))?;
    Ok(Json(StepView::new(step, protocol)))
}

// =============================================================================
// PATIENT HANDLERS
// =============================================================================

/// Admit a patient at `start`.
pub async fn intake_handler(
    State(state): State<AppState>,
    Json(request): Json<IntakeRequest>,
) -> Result<(StatusCode, Json<FlowResponse>), ApiError> {
    let record = request.into_record()?;
    let update = state.service.admit(record).await?;
    Ok((
        StatusCode::CREATED,
        Json(FlowResponse::from_update(update, state.service.protocol())),
    ))
}

/// Every admitted patient, ordered by id.
pub async fn list_handler(State(state): State<AppState>) -> ApiResult<PatientListResponse> {
    let flows = state.service.list().await?;
    let protocol = state.service.protocol();
    let patients: Vec<PatientSummary> = flows
        .iter()
        .map(|flow| PatientSummary::new(flow, protocol))
        .collect();
    Ok(Json(PatientListResponse {
        count: patients.len(),
        patients,
    }))
}

pub async fn show_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<FlowResponse> {
    let flow = state.service.load(&PatientId::new(id)).await?;
    Ok(Json(FlowResponse::from_flow(flow, state.service.protocol())))
}

pub async fn advance_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AdvanceRequest>,
) -> ApiResult<FlowResponse> {
    let update = state
        .service
        .advance(&PatientId::new(id), request.option)
        .await?;
    Ok(Json(FlowResponse::from_update(update, state.service.protocol())))
}

pub async fn back_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<FlowResponse> {
    let update = state.service.go_back(&PatientId::new(id)).await?;
    Ok(Json(FlowResponse::from_update(update, state.service.protocol())))
}

pub async fn restart_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<FlowResponse> {
    let update = state.service.restart(&PatientId::new(id)).await?;
    Ok(Json(FlowResponse::from_update(update, state.service.protocol())))
}

/// Resolve the current automatic step now.
pub async fn resolve_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<FlowResponse> {
    let update = state.service.resolve(&PatientId::new(id)).await?;
    Ok(Json(FlowResponse::from_update(update, state.service.protocol())))
}

/// Merge new measurements into the patient's snapshot.
pub async fn observe_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(observation): Json<ClinicalObservation>,
) -> ApiResult<FlowResponse> {
    let update = state
        .service
        .observe(&PatientId::new(id), &observation)
        .await?;
    Ok(Json(FlowResponse::from_update(update, state.service.protocol())))
}

// =============================================================================
// STATELESS HANDLERS
// =============================================================================

/// Classify one raw value or a whole observation. No state changes.
pub async fn classify_handler(Json(request): Json<ClassifyRequest>) -> ApiResult<ClassifyResponse> {
    let readings = match (request.metric.as_deref(), request.value.as_deref()) {
        (Some(metric), Some(value)) => {
            let metric: Metric = metric.parse()?;
            vec![MetricReading {
                metric,
                classification: classify_input(metric, value, &request.context),
            }]
        }
        (None, None) => classify_all(&request.observation, &request.context),
        _ => {
            return Err(ApiError(TriageError::InvalidInput(
                "metric and value must be given together".to_string(),
            )));
        }
    };
    Ok(Json(ClassifyResponse { readings }))
}

/// Run the escalation detector over an observation.
pub async fn detect_handler(Json(observation): Json<ClinicalObservation>) -> impl IntoResponse {
    Json(DetectResponse {
        escalation: detect(&observation),
    })
}
