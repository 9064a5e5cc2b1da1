//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the workflow engine:
//! - Identifiers (`RequestId`, `PersonId`, `DisciplineId`)
//! - Status enums for tasks, stages, requests and approval decisions
//! - Intake classification enums (`Priority`, `ChangeLength`)
//! - Error types (`MocError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they are used as `BTreeMap` keys

use crate::system::TaskSlot;
use crate::task::PayloadKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a change request (e.g. `MOC-2024-017`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Identifier of a person in the external directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonId(pub String);

/// Identifier of an engineering discipline (Electrical, Mechanical, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DisciplineId(pub String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(RequestId);
string_id!(PersonId);
string_id!(DisciplineId);

// =============================================================================
// STATUS ENUMS
// =============================================================================

/// Status of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Completed,
    Rejected,
}

impl TaskStatus {
    /// Human-readable label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "Not Started",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Derived status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StageStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl StageStatus {
    /// Human-readable label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            StageStatus::NotStarted => "Not Started",
            StageStatus::InProgress => "In Progress",
            StageStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle status of a whole request.
///
/// `Closed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Open,
    Closed,
    Cancelled,
}

impl RequestStatus {
    /// Human-readable label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            RequestStatus::Open => "Open",
            RequestStatus::Closed => "Closed",
            RequestStatus::Cancelled => "Cancelled",
        }
    }

    /// Check if no further transitions are permitted.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Closed | RequestStatus::Cancelled)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Operator decision recorded on an approval row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Approved,
    Rejected,
}

impl ApprovalStatus {
    /// Human-readable label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ApprovalStatus::Approved => "Approved",
            ApprovalStatus::Rejected => "Rejected",
        }
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = MocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "approved" | "approve" => Ok(ApprovalStatus::Approved),
            "rejected" | "reject" => Ok(ApprovalStatus::Rejected),
            other => Err(MocError::ValidationFailed(format!(
                "unknown approval status '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// INTAKE CLASSIFICATION
// =============================================================================

/// Request priority. Emergency changes carry an extra intake requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Normal,
    Emergency,
}

/// Whether a change is permanent or reverted after an end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeLength {
    Permanent,
    Temporary,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the workflow engine.
///
/// - Every engine failure is a return value
/// - A failed call leaves the request untouched
/// - The CORE never panics; all errors are recoverable by the caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MocError {
    /// The addressed task is not the one currently in progress.
    #[error("Out-of-order transition: {0} is not the task in progress")]
    OutOfOrderCompletion(TaskSlot),

    /// A registered validation rule rejected the payload.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A discipline assignment points at a person the directory does not know.
    #[error("Unresolved person reference: {0}")]
    UnresolvedPersonReference(PersonId),

    /// Severity or probability outside the risk matrix.
    #[error("Invalid risk input: severity {severity}, probability {probability}")]
    InvalidRiskInput { severity: u8, probability: u8 },

    /// The submitted payload does not belong to the task's kind.
    #[error("Payload mismatch at {slot}: expected {expected}, got {actual}")]
    PayloadMismatch {
        slot: TaskSlot,
        expected: PayloadKind,
        actual: PayloadKind,
    },

    /// The addressed task does not exist.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskSlot),

    /// `reopen` was called on a task that is not rejected.
    #[error("Task {0} is not rejected")]
    NotRejected(TaskSlot),

    /// No approval row with the given id exists on the approval task.
    #[error("Unknown approval row: {0}")]
    UnknownApprovalRow(String),

    /// The request is closed or cancelled.
    #[error("Request {0} is {1}; no further transitions are permitted")]
    TerminalRequest(RequestId, RequestStatus),

    /// Intake data is missing a required field or breaks an intake rule.
    #[error("Invalid intake: {0}")]
    InvalidIntake(String),

    /// A request-level side action is incomplete or not applicable.
    #[error("Invalid side action: {0}")]
    InvalidSideAction(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
