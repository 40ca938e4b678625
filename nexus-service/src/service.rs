use axum::{
    Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Query, State},
    http::{HeaderMap, HeaderValue, Request, StatusCode, header::CONTENT_TYPE},
    middleware::{Next, from_fn},
    response::{Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, info, warn};
use uuid::Uuid;

use crate::{
    analysis::AnalysisClient,
    config::ServiceConfig,
    error::OrchestratorError,
    models::{StateResponse, UploadFile, UploadParams},
    orchestrator::{Orchestrator, StateSnapshot},
    reader::DocumentReader,
    workflow::build_ingestion_workflow,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn conflict_error(message: &str, phase: &str) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error": message,
            "phase": phase
        })),
    )
}

fn orchestrator_error(err: &OrchestratorError) -> ApiError {
    match err {
        OrchestratorError::UnsupportedFormat { name, mime_type } => (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(json!({
                "error": err.to_string(),
                "name": name,
                "mime_type": mime_type
            })),
        ),
        OrchestratorError::Busy { phase } | OrchestratorError::InvalidTransition { phase, .. } => {
            conflict_error(&err.to_string(), phase)
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// Wire the reader, analysis backend and orchestrator from `config`
pub fn create_app(config: &ServiceConfig) -> Router {
    let client = AnalysisClient::new(
        config.build_backend(),
        config.validation,
        config.analysis_timeout,
    );
    let graph = build_ingestion_workflow(Arc::new(DocumentReader::default()), Arc::new(client));
    let orchestrator = Orchestrator::new(graph, config.failure_reset);

    build_router(AppState { orchestrator }, config.max_upload_bytes)
}

/// Tag every request with a correlation id and run it inside a span carrying it
async fn correlation_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

pub fn build_router(app_state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/documents", post(upload_document))
        .route("/state", get(get_state))
        .route("/state/back", post(go_back))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "NEXUS Document Ingestion & Analysis Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Upload a PDF, DOCX, TXT or MD paper and receive a structured analysis for the dashboard",
        "endpoints": {
            "POST /documents?name=<filename>": "Upload raw file bytes and start an analysis run",
            "GET /state": "Current phase, progress and, once ready, the analysis",
            "POST /state/back": "Leave the dashboard and return to upload",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn upload_document(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Some(name) = params.name.filter(|n| !n.trim().is_empty()) else {
        return Err(bad_request_error("Query parameter 'name' is required"));
    };
    let mime_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    info!(file = %name, mime_type = ?mime_type, bytes = body.len(), "Received document upload");

    let upload = UploadFile::new(name, mime_type, body);
    let run_id = state.orchestrator.select_file(upload).map_err(|e| {
        warn!(error = %e, "Upload rejected");
        orchestrator_error(&e)
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "run_id": run_id,
            "status": "started"
        })),
    ))
}

async fn get_state(State(state): State<AppState>) -> ApiResult<StateResponse> {
    Ok(Json(state_response(&state.orchestrator.snapshot())))
}

async fn go_back(State(state): State<AppState>) -> ApiResult<StateResponse> {
    state.orchestrator.go_back().map_err(|e| orchestrator_error(&e))?;
    info!("Returned to upload");
    Ok(Json(state_response(&state.orchestrator.snapshot())))
}

fn state_response(snapshot: &StateSnapshot) -> StateResponse {
    StateResponse {
        run_id: snapshot.run_id.clone(),
        phase: snapshot.phase.name().to_string(),
        progress: snapshot.progress.clone(),
        message: snapshot.message.clone(),
        analysis: snapshot.phase.analysis().map(|a| a.as_ref().clone()),
    }
}
