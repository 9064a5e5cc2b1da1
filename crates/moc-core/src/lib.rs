//! # moc-core
//!
//! The deterministic workflow engine for Management-of-Change requests.
//!
//! A request moves through four ordered stages (Initiation, Review,
//! Implementation, Closeout). Inside each stage tasks unlock one at a time;
//! completing a task may be gated by a validation rule and may rebuild a
//! later task's input through a propagation rule. Risk before and after the
//! change is classified on a severity x probability matrix.
//!
//! ## Engines (leaves first)
//!
//! - `risk` → `validation` → `propagation` → `workflow`
//!
//! ## Architectural Constraints
//!
//! - Pure Rust: NO async, NO network, NO logging dependencies
//! - Deterministic: `BTreeMap` only, integer arithmetic only
//! - Transitions take a snapshot and return a new snapshot plus events;
//!   a failed transition leaves the caller's snapshot untouched

// =============================================================================
// MODULES
// =============================================================================

pub mod directory;
pub mod formats;
pub mod primitives;
pub mod propagation;
pub mod request;
pub mod risk;
pub mod session;
pub mod system;
pub mod task;
pub mod types;
pub mod validation;
pub mod workflow;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ApprovalStatus, ChangeLength, DisciplineId, MocError, PersonId, Priority, RequestId,
    RequestStatus, StageStatus, TaskStatus,
};

// =============================================================================
// RE-EXPORTS: Engines
// =============================================================================

pub use directory::{InMemoryDirectory, PersonDirectory, PersonRecord};
pub use propagation::{
    PropagationEngine, PropagationOutcome, PropagationRule, UnresolvedReference,
    build_approval_rows,
};
pub use request::{Request, RequestIntake, SideAction};
pub use risk::{RiskAssessment, RiskBand, RiskInput, assess_risk, risk_matrix};
pub use session::{ProgressSink, WorkflowSession};
pub use task::{
    ApprovalRow, Assignee, AttachmentRef, Discipline, DisciplineAssignment, DocumentReviewItem,
    PayloadKind, Task, TaskPayload,
};
pub use validation::{ValidationEngine, ValidationRule, validate_assigned_disciplines};
pub use workflow::{Transition, WorkflowEngine, WorkflowEvent};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{DocumentHeader, document_from_bytes, document_to_bytes};

// =============================================================================
// RE-EXPORTS: System (from system module)
// =============================================================================

pub use system::{
    APPROVE_REVIEW_TEAM, ASSIGN_ENGINEER, ASSIGN_REVIEW_TEAM, Stage, StageKind, StageProgress,
    TECHNICAL_DOCUMENT_REVIEW, TaskSlot, TaskTemplate, UPDATE_DOCUMENTATION,
};
