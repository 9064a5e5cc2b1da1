//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use moc_core::{
    ApprovalStatus, AttachmentRef, MocError, PersonId, Request, RequestIntake, RequestStatus,
    RiskAssessment, SideAction, StageKind, StageProgress, TaskPayload, TaskSlot, WorkflowEvent,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// CREATE REQUEST
// =============================================================================

/// Open a new request. Without an id the server assigns `MOC-{n}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub intake: RequestIntake,
}

/// Restore a request from a base64 document as produced by
/// `GET /requests/{id}/document`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub data: String,
}

impl ImportRequest {
    /// Decode the base64 payload.
    pub fn decode(&self) -> Result<Vec<u8>, MocError> {
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, self.data.trim())
            .map_err(|e| MocError::DeserializationError(format!("Invalid base64: {}", e)))
    }
}

// =============================================================================
// TASK OPERATIONS
// =============================================================================

/// Complete the in-progress task.
///
/// Without a payload the task's current payload is submitted unchanged,
/// which is what sign-off tasks and already-decided approval rows need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub stage: StageKind,
    pub task_index: usize,
    #[serde(default)]
    pub payload: Option<TaskPayload>,
}

impl CompleteRequest {
    #[must_use]
    pub fn slot(&self) -> TaskSlot {
        TaskSlot::new(self.stage, self.task_index)
    }
}

/// Reject the in-progress task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectRequest {
    pub stage: StageKind,
    pub task_index: usize,
    pub remark: String,
}

impl RejectRequest {
    #[must_use]
    pub fn slot(&self) -> TaskSlot {
        TaskSlot::new(self.stage, self.task_index)
    }
}

/// Reopen a rejected task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReopenRequest {
    pub stage: StageKind,
    pub task_index: usize,
}

impl ReopenRequest {
    #[must_use]
    pub fn slot(&self) -> TaskSlot {
        TaskSlot::new(self.stage, self.task_index)
    }
}

/// Add a comment and attachment references to the active task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotateRequest {
    pub stage: StageKind,
    pub task_index: usize,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

impl AnnotateRequest {
    #[must_use]
    pub fn slot(&self) -> TaskSlot {
        TaskSlot::new(self.stage, self.task_index)
    }
}

/// Record a decision on one approval row. `status: null` clears it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub row_id: String,
    #[serde(default)]
    pub status: Option<ApprovalStatus>,
    #[serde(default)]
    pub remark: String,
}

// =============================================================================
// SIDE ACTIONS
// =============================================================================

/// Request-level side action (tagged union).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionRequest {
    Cancel {
        reason: String,
    },
    ChangeChampion {
        champion: String,
        reason: String,
    },
    ChangeTeam {
        role: String,
        person: String,
        reason: String,
    },
    Extend {
        new_end_date: String,
        reason: String,
    },
}

impl From<ActionRequest> for SideAction {
    fn from(request: ActionRequest) -> Self {
        match request {
            ActionRequest::Cancel { reason } => SideAction::Cancel { reason },
            ActionRequest::ChangeChampion { champion, reason } => SideAction::ChangeChampion {
                champion: PersonId::new(champion),
                reason,
            },
            ActionRequest::ChangeTeam {
                role,
                person,
                reason,
            } => SideAction::ChangeTeam {
                role,
                person: PersonId::new(person),
                reason,
            },
            ActionRequest::Extend {
                new_end_date,
                reason,
            } => SideAction::Extend {
                new_end_date,
                reason,
            },
        }
    }
}

// =============================================================================
// REQUEST SNAPSHOT RESPONSE
// =============================================================================

/// Full request snapshot with derived progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestResponse {
    pub success: bool,
    pub request: Option<Request>,
    pub progress: Vec<StageProgress>,
    pub active: Option<TaskSlot>,
    pub error: Option<String>,
}

impl RequestResponse {
    pub fn success(request: &Request) -> Self {
        Self {
            success: true,
            progress: request.progress(),
            active: request.active_slot(),
            request: Some(request.clone()),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            request: None,
            progress: Vec::new(),
            active: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// LIST RESPONSE
// =============================================================================

/// One line of the request list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSummary {
    pub id: String,
    pub title: String,
    pub status: RequestStatus,
    pub active: Option<TaskSlot>,
}

impl From<&Request> for RequestSummary {
    fn from(request: &Request) -> Self {
        Self {
            id: request.id().to_string(),
            title: request.title().to_string(),
            status: request.status(),
            active: request.active_slot(),
        }
    }
}

/// All requests known to the server, in id order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub requests: Vec<RequestSummary>,
}

// =============================================================================
// TRANSITION RESPONSE
// =============================================================================

/// Outcome of a workflow operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub success: bool,
    pub status: Option<RequestStatus>,
    pub active: Option<TaskSlot>,
    pub events: Vec<WorkflowEvent>,
    pub error: Option<String>,
}

impl TransitionResponse {
    pub fn success(request: &Request, events: Vec<WorkflowEvent>) -> Self {
        Self {
            success: true,
            status: Some(request.status()),
            active: request.active_slot(),
            events,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            status: None,
            active: None,
            events: Vec::new(),
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// EVENTS RESPONSE
// =============================================================================

/// Session event log, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub success: bool,
    pub events: Vec<WorkflowEvent>,
    pub error: Option<String>,
}

impl EventsResponse {
    pub fn success(events: Vec<WorkflowEvent>) -> Self {
        Self {
            success: true,
            events,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            events: Vec::new(),
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// DOCUMENT RESPONSE
// =============================================================================

/// Persisted request document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub success: bool,
    pub data: Option<String>, // Base64 encoded
    pub size: usize,
    pub error: Option<String>,
}

impl DocumentResponse {
    pub fn success(data: Vec<u8>) -> Self {
        Self {
            success: true,
            size: data.len(),
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                &data,
            )),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            size: 0,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// RISK REQUEST/RESPONSE
// =============================================================================

/// Risk assessment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRequest {
    pub severity: u8,
    pub probability: u8,
}

/// Risk assessment response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskResponse {
    pub success: bool,
    pub risk_code: Option<String>,
    pub band: Option<String>,
    pub product: Option<u8>,
    pub error: Option<String>,
}

impl RiskResponse {
    pub fn success(assessment: &RiskAssessment) -> Self {
        Self {
            success: true,
            risk_code: Some(assessment.risk_code().to_string()),
            band: Some(assessment.band().name().to_string()),
            product: Some(assessment.product()),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            risk_code: None,
            band: None,
            product: None,
            error: Some(msg.into()),
        }
    }
}
