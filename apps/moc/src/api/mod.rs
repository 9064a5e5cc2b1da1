//! # MOC HTTP API Module
//!
//! REST API over an in-memory registry of workflow sessions, one per request.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /requests` - List requests
//! - `POST /requests` - Open a request from intake data
//! - `POST /requests/import` - Restore a request from a base64 document
//! - `GET /requests/{id}` - Request snapshot with stage progress
//! - `POST /requests/{id}/tasks/complete` - Complete the in-progress task
//! - `POST /requests/{id}/tasks/reject` - Reject the in-progress task
//! - `POST /requests/{id}/tasks/reopen` - Reopen a rejected task
//! - `POST /requests/{id}/tasks/annotate` - Comment on / attach to the active task
//! - `POST /requests/{id}/approvals` - Record an approval row decision
//! - `POST /requests/{id}/actions` - Cancel, change champion/team, extend
//! - `GET /requests/{id}/events` - Session event log
//! - `GET /requests/{id}/document` - Base64 persisted document
//! - `POST /risk` - Assess a severity/probability pair
//!
//! ## Configuration (Environment Variables)
//!
//! - `MOC_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `MOC_RATE_LIMIT`: Requests per second (default: config file, then 100; 0 to disable)

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env, resolve_rate_limit};
pub use types::*;

use crate::config::{MocConfig, ServerConfig};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use moc_core::{Discipline, MocError, PersonDirectory, RequestId, WorkflowEngine, WorkflowSession};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// REQUEST REGISTRY
// =============================================================================

/// Open sessions keyed by request id.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    sessions: BTreeMap<RequestId, WorkflowSession>,
    next_seq: u64,
}

impl RequestRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &RequestId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn get(&self, id: &RequestId) -> Option<&WorkflowSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &RequestId) -> Option<&mut WorkflowSession> {
        self.sessions.get_mut(id)
    }

    /// Insert a session under its request id, replacing any previous one.
    pub fn insert(&mut self, session: WorkflowSession) {
        self.sessions
            .insert(session.request().id().clone(), session);
    }

    /// Sessions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkflowSession> {
        self.sessions.values()
    }

    /// Next unused `MOC-nnnn` id.
    pub fn next_id(&mut self) -> RequestId {
        loop {
            self.next_seq = self.next_seq.saturating_add(1);
            let id = RequestId::new(format!("MOC-{:04}", self.next_seq));
            if !self.contains(&id) {
                return id;
            }
        }
    }
}

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RwLock<RequestRegistry>>,
    pub engine: Arc<WorkflowEngine>,
    pub directory: Arc<dyn PersonDirectory>,
    pub catalog: Arc<Vec<Discipline>>,
    pub server: ServerConfig,
}

impl AppState {
    /// Build state from configuration with the default workflow rules.
    #[must_use]
    pub fn new(config: &MocConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(RequestRegistry::new())),
            engine: Arc::new(WorkflowEngine::default()),
            directory: Arc::new(config.directory()),
            catalog: Arc::new(config.catalog().to_vec()),
            server: config.server.clone(),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `MOC_CORS_ORIGINS`.
///
/// - `*`: allows all origins
/// - unset or no valid origin: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("MOC_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (MOC_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in MOC_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::info!("CORS: No MOC_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - from `[server] body_limit`
/// 4. Rate Limiting - if enabled
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = resolve_rate_limit(state.server.rate_limit);
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let body_limit = state.server.body_limit;

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/requests",
            get(handlers::list_handler).post(handlers::create_handler),
        )
        .route("/requests/import", post(handlers::import_handler))
        .route("/requests/{id}", get(handlers::request_handler))
        .route("/requests/{id}/tasks/complete", post(handlers::complete_handler))
        .route("/requests/{id}/tasks/reject", post(handlers::reject_handler))
        .route("/requests/{id}/tasks/reopen", post(handlers::reopen_handler))
        .route("/requests/{id}/tasks/annotate", post(handlers::annotate_handler))
        .route("/requests/{id}/approvals", post(handlers::approval_handler))
        .route("/requests/{id}/actions", post(handlers::action_handler))
        .route("/requests/{id}/events", get(handlers::events_handler))
        .route("/requests/{id}/document", get(handlers::document_handler))
        .route("/risk", post(handlers::risk_handler));

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and run until Ctrl+C.
pub async fn run_server(config: &MocConfig) -> Result<(), MocError> {
    let addr = config.server.addr();
    let router = create_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MocError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("MOC HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| MocError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
