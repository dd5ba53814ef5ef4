//! HTTP request handlers for the matching and backlog REST API.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::backlog::{self, IngestRequest};
use crate::error::ErrorKind;
use crate::matcher::{InteractiveMatcher, DEFAULT_TOP_K, DEFAULT_TOP_N};
use crate::types::{Session, SessionResponse};

use super::AppState;

/// Build the axum router with all routes
pub(super) fn router(state: Arc<AppState>) -> axum::Router {
    use axum::routing::{get, post};
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    axum::Router::new()
        .route("/match/interactive/start", post(start))
        .route("/match/interactive/continue", post(continue_session))
        .route("/match/interactive/finalize", post(finalize))
        .route("/backlog/ingest", post(ingest))
        .route("/backlog/health", get(backlog_health))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error response body
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

/// Map an error to its status class, logging by severity.
fn error_response(err: anyhow::Error) -> (StatusCode, Json<ErrorBody>) {
    let kind = ErrorKind::classify(&err);
    match kind {
        ErrorKind::InvalidInput => tracing::debug!("rejected request: {:#}", err),
        ErrorKind::ExternalService | ErrorKind::MalformedResponse => {
            tracing::warn!("upstream failure: {:#}", err)
        }
        ErrorKind::Storage | ErrorKind::Internal => tracing::error!("internal error: {:#}", err),
    }
    (
        kind.status_code(),
        Json(ErrorBody {
            error: format!("{err:#}"),
            kind: kind.as_str(),
        }),
    )
}

// -- /match/interactive/start --

#[derive(Deserialize)]
struct StartRequest {
    prompt_text: String,
}

async fn start(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> Result<Json<SessionResponse>, (StatusCode, Json<ErrorBody>)> {
    let matcher = InteractiveMatcher::new(
        &state.gateway,
        &state.catalog,
        state.config.thresholds,
    );

    let response = matcher
        .start(&request.prompt_text)
        .await
        .map_err(error_response)?;

    Ok(Json(response))
}

// -- /match/interactive/continue --

#[derive(Deserialize)]
struct ContinueRequest {
    session: Session,
    answer_text: String,
}

async fn continue_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ContinueRequest>,
) -> Result<Json<SessionResponse>, (StatusCode, Json<ErrorBody>)> {
    let matcher = InteractiveMatcher::new(
        &state.gateway,
        &state.catalog,
        state.config.thresholds,
    );

    let response = matcher
        .continue_session(request.session, &request.answer_text)
        .await
        .map_err(error_response)?;

    Ok(Json(response))
}

// -- /match/interactive/finalize --

#[derive(Deserialize)]
struct FinalizeRequest {
    session: Session,
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default = "default_top_n")]
    top_n: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

async fn finalize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FinalizeRequest>,
) -> Result<Json<SessionResponse>, (StatusCode, Json<ErrorBody>)> {
    let matcher = InteractiveMatcher::new(
        &state.gateway,
        &state.catalog,
        state.config.thresholds,
    );

    let response = matcher
        .finalize(&request.session, request.top_k, request.top_n)
        .await
        .map_err(error_response)?;

    Ok(Json(response))
}

// -- /backlog/ingest --

#[derive(Deserialize)]
struct BacklogIngestRequest {
    prompt_text: String,
    #[serde(default)]
    comment_text: Option<String>,
}

async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BacklogIngestRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    let ingest_request = IngestRequest {
        prompt_text: request.prompt_text,
        comment_text: request.comment_text,
    };

    backlog::ingest(
        &state.gateway,
        &state.catalog,
        &ingest_request,
        state.config.backlog_match_threshold,
        None,
    )
    .await
    .map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

// -- health probes --

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "marketmatch",
    })
}

async fn backlog_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "backlog",
    })
}
