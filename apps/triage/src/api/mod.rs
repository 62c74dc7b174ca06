//! # Triage HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /protocol` - Every step of the loaded protocol
//! - `GET /protocol/{step}` - One step
//! - `POST /patients` - Admit a patient
//! - `GET /patients` - List patients
//! - `GET /patients/{id}` - A patient's flow
//! - `POST /patients/{id}/advance` - Choose an option
//! - `POST /patients/{id}/back` - Go back one step
//! - `POST /patients/{id}/restart` - Restart the protocol
//! - `POST /patients/{id}/resolve` - Resolve the automatic step now
//! - `POST /patients/{id}/observations` - Record measurements
//! - `POST /classify` - Classify values (stateless)
//! - `POST /detect` - Run the escalation detector (stateless)
//!
//! ## Security
//!
//! Authentication, rate limiting and CORS come from [`crate::config::SecurityConfig`].

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{ApiKey, keys_match};
pub use handlers::ApiError;
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    AdvanceRequest, ClassifyRequest, ClassifyResponse, DetectResponse, ErrorResponse,
    FlowResponse, HealthResponse, IntakeRequest, OptionView, PatientListResponse, PatientSummary,
    ProtocolResponse, StepView,
};

use crate::config::SecurityConfig;
use crate::service::TriageService;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use triage_core::TriageError;

/// Maximum accepted request body.
const MAX_BODY_BYTES: usize = 64 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: TriageService,
}

impl AppState {
    #[must_use]
    pub fn new(service: TriageService) -> Self {
        Self { service }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer.
///
/// - `None`: localhost only
/// - `["*"]`: every origin (development only)
/// - otherwise the listed origins; if none parse, localhost only
fn build_cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        tracing::info!("CORS: No origins configured, defaulting to localhost only");
        return build_localhost_cors();
    };

    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => {
                tracing::info!("CORS: Allowing origin: {}", origin);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
        return build_localhost_cors();
    }
    restricted_cors(allowed)
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse().ok())
    .collect();
    restricted_cors(origins)
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting (if enabled)
/// 4. Authentication (if an API key is configured)
pub fn create_router(state: AppState, security: &SecurityConfig) -> Router {
    let cors = build_cors_layer(security.cors_origins.as_deref());

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/protocol", get(handlers::protocol_handler))
        .route("/protocol/{step}", get(handlers::step_handler))
        .route(
            "/patients",
            get(handlers::list_handler).post(handlers::intake_handler),
        )
        .route("/patients/{id}", get(handlers::show_handler))
        .route("/patients/{id}/advance", post(handlers::advance_handler))
        .route("/patients/{id}/back", post(handlers::back_handler))
        .route("/patients/{id}/restart", post(handlers::restart_handler))
        .route("/patients/{id}/resolve", post(handlers::resolve_handler))
        .route("/patients/{id}/observations", post(handlers::observe_handler))
        .route("/classify", post(handlers::classify_handler))
        .route("/detect", post(handlers::detect_handler));

    match security.api_key.as_deref() {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            let key: ApiKey = Arc::from(key);
            router = router.layer(axum_middleware::from_fn_with_state(
                key,
                auth::api_key_auth_middleware,
            ));
        }
        None => {
            tracing::warn!(
                "API key authentication DISABLED - all endpoints are publicly accessible! \
                 Set TRIAGE_API_KEY or [security] api_key to enable authentication."
            );
        }
    }

    match create_rate_limiter(security.rate_limit) {
        Some(limiter) => {
            tracing::info!("Rate limiting enabled: {} requests/second", security.rate_limit);
            router = router.layer(axum_middleware::from_fn_with_state(
                limiter,
                middleware::rate_limit_middleware,
            ));
        }
        None => tracing::info!("Rate limiting disabled"),
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and block until it stops.
pub async fn run_server(
    addr: &str,
    service: TriageService,
    security: &SecurityConfig,
) -> Result<(), TriageError> {
    service.resume_pending().await?;
    let router = create_router(AppState::new(service), security);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TriageError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Triage HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| TriageError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
