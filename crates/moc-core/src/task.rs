//! # Tasks and Task Payloads
//!
//! A task is a single unit of work or approval inside a stage. Its
//! kind-specific data lives in [`TaskPayload`], a tagged union so that the
//! state machine stays generic while each handler only touches its variant.

use crate::primitives::{MAX_ATTACHMENTS, MAX_FIELD_LENGTH, MAX_TEXT_LENGTH};
use crate::{ApprovalStatus, DisciplineId, MocError, PersonId, TaskStatus};
use serde::{Deserialize, Serialize};

// =============================================================================
// ASSIGNEE & ATTACHMENTS
// =============================================================================

/// Who a task is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    /// Role responsible for the task (e.g. "MOC Engineer").
    pub role: String,
    /// Concrete person, once known.
    pub person: Option<PersonId>,
}

impl Assignee {
    /// An assignee known only by role.
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            person: None,
        }
    }
}

/// Reference to an attachment held by the external file store.
///
/// The core never touches file contents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Attachment category (e.g. "P&ID", "Risk Assessment").
    pub category: String,
    /// File name as known to the file store.
    pub file_name: String,
}

impl AttachmentRef {
    /// Create a new attachment reference.
    #[must_use]
    pub fn new(category: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            file_name: file_name.into(),
        }
    }

    /// Check that both fields are present and within limits.
    pub fn validate(&self) -> Result<(), MocError> {
        if self.category.trim().is_empty() || self.file_name.trim().is_empty() {
            return Err(MocError::ValidationFailed(
                "attachment category and file name are required".to_string(),
            ));
        }
        if self.category.len() > MAX_FIELD_LENGTH || self.file_name.len() > MAX_FIELD_LENGTH {
            return Err(MocError::ValidationFailed(format!(
                "attachment fields exceed {} bytes",
                MAX_FIELD_LENGTH
            )));
        }
        Ok(())
    }
}

/// Validate a batch of attachments against the per-owner limit.
pub(crate) fn validate_attachments(
    existing: usize,
    incoming: &[AttachmentRef],
) -> Result<(), MocError> {
    if existing.saturating_add(incoming.len()) > MAX_ATTACHMENTS {
        return Err(MocError::ValidationFailed(format!(
            "at most {} attachments are allowed",
            MAX_ATTACHMENTS
        )));
    }
    incoming.iter().try_for_each(AttachmentRef::validate)
}

// =============================================================================
// DISCIPLINES
// =============================================================================

/// A catalog entry for an engineering discipline.
///
/// Reference data: the catalog seeds the team-assignment task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discipline {
    pub id: DisciplineId,
    pub name: String,
    pub direct_manager: String,
}

/// A discipline's reviewer assignment, edited in the team-assignment task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisciplineAssignment {
    pub discipline_id: DisciplineId,
    pub discipline_name: String,
    pub assigned_person: Option<PersonId>,
    pub direct_manager_name: String,
    pub not_applicable: bool,
}

impl DisciplineAssignment {
    /// An unassigned, applicable entry for a catalog discipline.
    #[must_use]
    pub fn unassigned(discipline: &Discipline) -> Self {
        Self {
            discipline_id: discipline.id.clone(),
            discipline_name: discipline.name.clone(),
            assigned_person: None,
            direct_manager_name: discipline.direct_manager.clone(),
            not_applicable: false,
        }
    }

    /// Set the reviewer.
    #[must_use]
    pub fn assigned(mut self, person: PersonId) -> Self {
        self.assigned_person = Some(person);
        self
    }

    /// Mark the discipline as not applicable to this change.
    #[must_use]
    pub fn marked_not_applicable(mut self) -> Self {
        self.not_applicable = true;
        self
    }

    /// Applicable and has a reviewer.
    #[must_use]
    pub fn is_reviewable(&self) -> bool {
        !self.not_applicable && self.assigned_person.is_some()
    }
}

// =============================================================================
// APPROVAL ROWS
// =============================================================================

/// One row of the "Approve Technical Review Team" task.
///
/// Rows are only ever produced by propagation from the discipline
/// assignments; operators fill in `approval_status` and `remark`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRow {
    /// Stable row id, equal to the source discipline id.
    pub row_id: String,
    pub discipline_name: String,
    pub assigned_person_name: String,
    pub direct_manager_name: String,
    pub approval_status: Option<ApprovalStatus>,
    pub remark: String,
}

// =============================================================================
// DOCUMENT REVIEW
// =============================================================================

/// A document checked during technical review or documentation update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReviewItem {
    pub document_id: String,
    pub title: String,
    pub reviewed: bool,
    pub comment: String,
}

impl DocumentReviewItem {
    /// A document awaiting review.
    #[must_use]
    pub fn pending(document_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            title: title.into(),
            reviewed: false,
            comment: String::new(),
        }
    }
}

// =============================================================================
// PAYLOAD
// =============================================================================

/// Discriminant of [`TaskPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PayloadKind {
    None,
    EngineerSelection,
    DisciplineAssignments,
    ApprovalRows,
    DocumentReview,
}

impl PayloadKind {
    /// Get the kind name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PayloadKind::None => "none",
            PayloadKind::EngineerSelection => "engineer selection",
            PayloadKind::DisciplineAssignments => "discipline assignments",
            PayloadKind::ApprovalRows => "approval rows",
            PayloadKind::DocumentReview => "document review",
        }
    }

    /// The empty payload of this kind.
    #[must_use]
    pub fn empty_payload(&self) -> TaskPayload {
        match self {
            PayloadKind::None => TaskPayload::None,
            PayloadKind::EngineerSelection => TaskPayload::EngineerSelection(None),
            PayloadKind::DisciplineAssignments => TaskPayload::DisciplineAssignments(Vec::new()),
            PayloadKind::ApprovalRows => TaskPayload::ApprovalRows(Vec::new()),
            PayloadKind::DocumentReview => TaskPayload::DocumentReview(Vec::new()),
        }
    }
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Task-kind-specific data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPayload {
    /// Sign-off tasks carry no data.
    None,
    /// Selected MOC engineer.
    EngineerSelection(Option<PersonId>),
    /// Technical review team assignments.
    DisciplineAssignments(Vec<DisciplineAssignment>),
    /// Review team approval decisions.
    ApprovalRows(Vec<ApprovalRow>),
    /// Document checklist.
    DocumentReview(Vec<DocumentReviewItem>),
}

impl TaskPayload {
    /// Get the payload discriminant.
    #[must_use]
    pub fn kind(&self) -> PayloadKind {
        match self {
            TaskPayload::None => PayloadKind::None,
            TaskPayload::EngineerSelection(_) => PayloadKind::EngineerSelection,
            TaskPayload::DisciplineAssignments(_) => PayloadKind::DisciplineAssignments,
            TaskPayload::ApprovalRows(_) => PayloadKind::ApprovalRows,
            TaskPayload::DocumentReview(_) => PayloadKind::DocumentReview,
        }
    }

    /// Approval rows, if this is an approval payload.
    #[must_use]
    pub fn approval_rows(&self) -> Option<&[ApprovalRow]> {
        match self {
            TaskPayload::ApprovalRows(rows) => Some(rows),
            _ => None,
        }
    }

    /// Discipline assignments, if this is an assignment payload.
    #[must_use]
    pub fn discipline_assignments(&self) -> Option<&[DisciplineAssignment]> {
        match self {
            TaskPayload::DisciplineAssignments(assignments) => Some(assignments),
            _ => None,
        }
    }

    /// Number of entries carried (0 for sign-off tasks).
    #[must_use]
    pub fn entries(&self) -> usize {
        match self {
            TaskPayload::None => 0,
            TaskPayload::EngineerSelection(person) => usize::from(person.is_some()),
            TaskPayload::DisciplineAssignments(v) => v.len(),
            TaskPayload::ApprovalRows(v) => v.len(),
            TaskPayload::DocumentReview(v) => v.len(),
        }
    }
}

// =============================================================================
// TASK
// =============================================================================

/// A task inside a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Ordinal position within the stage.
    pub index: usize,
    pub name: String,
    pub assignee: Assignee,
    pub status: TaskStatus,
    pub comments: Vec<String>,
    pub attachments: Vec<AttachmentRef>,
    pub payload: TaskPayload,
    /// Remark given when the task was last rejected; cleared on reopen.
    pub rejection_remark: Option<String>,
}

impl Task {
    /// Create a not-started task.
    #[must_use]
    pub fn new(index: usize, name: impl Into<String>, assignee: Assignee, payload: TaskPayload) -> Self {
        Self {
            index,
            name: name.into(),
            assignee,
            status: TaskStatus::NotStarted,
            comments: Vec::new(),
            attachments: Vec::new(),
            payload,
            rejection_remark: None,
        }
    }

    /// Check if the task is completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Append a comment, enforcing the free-text limit.
    pub(crate) fn push_comment(&mut self, comment: &str) -> Result<(), MocError> {
        let trimmed = comment.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        if trimmed.len() > MAX_TEXT_LENGTH {
            return Err(MocError::ValidationFailed(format!(
                "comment exceeds {} bytes",
                MAX_TEXT_LENGTH
            )));
        }
        self.comments.push(trimmed.to_string());
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
