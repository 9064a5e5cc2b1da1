//! # API Endpoint Handlers
//!
//! Every workflow handler takes the registry write lock, runs one session
//! operation and answers with the resulting events. Engine errors map to:
//!
//! - 400: validation and input errors
//! - 404: unknown request, task or approval row
//! - 409: out-of-order transitions and terminal requests
//! - 500: document encoding failures

use super::{
    AppState,
    types::{
        ActionRequest, AnnotateRequest, ApprovalRequest, CompleteRequest, CreateRequest,
        DocumentResponse, EventsResponse, HealthResponse, ImportRequest, ListResponse,
        RejectRequest, ReopenRequest, RequestResponse, RequestSummary, RiskRequest, RiskResponse,
        TransitionResponse,
    },
};
use crate::progress::TracingSink;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use moc_core::{
    MocError, RequestId, SideAction, WorkflowEvent, WorkflowSession, assess_risk,
    document_from_bytes, document_to_bytes,
};
use std::sync::Arc;

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// HTTP status for an engine error.
#[must_use]
pub fn error_status(error: &MocError) -> StatusCode {
    match error {
        MocError::TaskNotFound(_) | MocError::UnknownApprovalRow(_) => StatusCode::NOT_FOUND,
        MocError::OutOfOrderCompletion(_)
        | MocError::NotRejected(_)
        | MocError::TerminalRequest(..) => StatusCode::CONFLICT,
        MocError::SerializationError(_) | MocError::IoError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

fn unknown_request(id: &str) -> String {
    format!("Unknown request: {}", id)
}

/// Run one operation against a session and render the outcome.
async fn transition(
    state: &AppState,
    id: &str,
    operation: impl FnOnce(&mut WorkflowSession) -> Result<Vec<WorkflowEvent>, MocError>,
) -> (StatusCode, Json<TransitionResponse>) {
    let mut registry = state.registry.write().await;
    let Some(session) = registry.get_mut(&RequestId::new(id)) else {
        return (
            StatusCode::NOT_FOUND,
            Json(TransitionResponse::error(unknown_request(id))),
        );
    };

    match operation(session) {
        Ok(events) => (
            StatusCode::OK,
            Json(TransitionResponse::success(session.request(), events)),
        ),
        Err(e) => {
            tracing::debug!(request = id, "Operation refused: {}", e);
            (error_status(&e), Json(TransitionResponse::error(e.to_string())))
        }
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// REQUEST HANDLERS
// =============================================================================

/// List all requests.
pub async fn list_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.registry.read().await;
    let requests = registry
        .iter()
        .map(|session| RequestSummary::from(session.request()))
        .collect();

    (StatusCode::OK, Json(ListResponse { requests }))
}

/// Open a request from intake data.
pub async fn create_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateRequest>,
) -> impl IntoResponse {
    let mut registry = state.registry.write().await;

    let id = match body.id {
        Some(id) => RequestId::new(id),
        None => registry.next_id(),
    };
    if registry.contains(&id) {
        return (
            StatusCode::CONFLICT,
            Json(RequestResponse::error(format!("Request {} already exists", id))),
        );
    }

    match WorkflowSession::open(
        id,
        body.intake,
        &state.catalog,
        Arc::clone(&state.engine),
        Arc::clone(&state.directory),
    ) {
        Ok(mut session) => {
            session.add_sink(Arc::new(TracingSink));
            let response = RequestResponse::success(session.request());
            tracing::info!(
                request = %session.request().id(),
                risk_before = session.request().risk_before().risk_code(),
                risk_after = session.request().risk_after().risk_code(),
                "Request opened"
            );
            registry.insert(session);
            (StatusCode::CREATED, Json(response))
        }
        Err(e) => (error_status(&e), Json(RequestResponse::error(e.to_string()))),
    }
}

/// Restore a request from a persisted document.
pub async fn import_handler(
    State(state): State<AppState>,
    Json(body): Json<ImportRequest>,
) -> impl IntoResponse {
    let request = match body.decode().and_then(|bytes| document_from_bytes(&bytes)) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(RequestResponse::error(e.to_string())),
            );
        }
    };

    let mut registry = state.registry.write().await;
    if registry.contains(request.id()) {
        return (
            StatusCode::CONFLICT,
            Json(RequestResponse::error(format!(
                "Request {} already exists",
                request.id()
            ))),
        );
    }

    let mut session = WorkflowSession::new(
        request,
        Arc::clone(&state.engine),
        Arc::clone(&state.directory),
    );
    session.add_sink(Arc::new(TracingSink));
    let response = RequestResponse::success(session.request());
    tracing::info!(request = %session.request().id(), "Request imported");
    registry.insert(session);

    (StatusCode::CREATED, Json(response))
}

/// Request snapshot.
pub async fn request_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let registry = state.registry.read().await;
    match registry.get(&RequestId::new(&id)) {
        Some(session) => (
            StatusCode::OK,
            Json(RequestResponse::success(session.request())),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(RequestResponse::error(unknown_request(&id))),
        ),
    }
}

// =============================================================================
// TASK HANDLERS
// =============================================================================

/// Complete the in-progress task.
pub async fn complete_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CompleteRequest>,
) -> impl IntoResponse {
    let slot = body.slot();
    transition(&state, &id, |session| {
        let payload = match body.payload {
            Some(payload) => payload,
            None => session
                .request()
                .task(slot)
                .map(|task| task.payload.clone())
                .ok_or(MocError::TaskNotFound(slot))?,
        };
        session.complete_task(slot, payload)
    })
    .await
}

/// Reject the in-progress task.
pub async fn reject_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RejectRequest>,
) -> impl IntoResponse {
    transition(&state, &id, |session| {
        session.reject_task(body.slot(), &body.remark)
    })
    .await
}

/// Reopen a rejected task.
pub async fn reopen_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReopenRequest>,
) -> impl IntoResponse {
    transition(&state, &id, |session| session.reopen_task(body.slot())).await
}

/// Append a comment and attachments to the active task.
pub async fn annotate_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AnnotateRequest>,
) -> impl IntoResponse {
    transition(&state, &id, |session| {
        session.annotate_task(body.slot(), &body.comment, &body.attachments)
    })
    .await
}

/// Record an approval row decision.
pub async fn approval_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ApprovalRequest>,
) -> impl IntoResponse {
    transition(&state, &id, |session| {
        session.update_approval_row(&body.row_id, body.status, &body.remark)
    })
    .await
}

/// Apply a request-level side action.
pub async fn action_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActionRequest>,
) -> impl IntoResponse {
    let action = SideAction::from(body);
    transition(&state, &id, |session| session.apply_side_action(&action)).await
}

// =============================================================================
// EVENTS & DOCUMENT HANDLERS
// =============================================================================

/// Session event log.
pub async fn events_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let registry = state.registry.read().await;
    match registry.get(&RequestId::new(&id)) {
        Some(session) => (
            StatusCode::OK,
            Json(EventsResponse::success(session.events().cloned().collect())),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(EventsResponse::error(unknown_request(&id))),
        ),
    }
}

/// Persisted document of a request.
pub async fn document_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let registry = state.registry.read().await;
    let Some(session) = registry.get(&RequestId::new(&id)) else {
        return (
            StatusCode::NOT_FOUND,
            Json(DocumentResponse::error(unknown_request(&id))),
        );
    };

    match document_to_bytes(session.request()) {
        Ok(data) => (StatusCode::OK, Json(DocumentResponse::success(data))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(DocumentResponse::error(format!("Export failed: {}", e))),
        ),
    }
}

// =============================================================================
// RISK HANDLER
// =============================================================================

/// Assess a severity/probability pair.
pub async fn risk_handler(Json(body): Json<RiskRequest>) -> impl IntoResponse {
    match assess_risk(body.severity, body.probability) {
        Ok(assessment) => (StatusCode::OK, Json(RiskResponse::success(&assessment))),
        Err(e) => (StatusCode::BAD_REQUEST, Json(RiskResponse::error(e.to_string()))),
    }
}
