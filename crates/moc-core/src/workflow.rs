//! # Workflow State Machine
//!
//! Sequential task gating over a request snapshot.
//!
//! Every operation takes the current `Request` by reference and returns a
//! [`Transition`]: the next snapshot plus the events it produced. The input
//! is never modified, so a failed call is a no-op by construction.
//!
//! ## Completion Pipeline
//!
//! 1. Request must be open, task must exist and be In Progress
//! 2. Submitted payload must match the task's payload kind
//! 3. Approval rows are merged onto the propagated set (decisions only)
//! 4. The slot's validation rule runs on the merged payload
//! 5. Task is marked Completed
//! 6. The slot's propagation rule rebuilds its target payload
//! 7. The next task, stage or request state is activated

use crate::directory::PersonDirectory;
use crate::primitives::MAX_TEXT_LENGTH;
use crate::propagation::PropagationEngine;
use crate::request::{Request, SideAction};
use crate::system::{APPROVE_REVIEW_TEAM, Stage, StageKind, TaskSlot};
use crate::task::{ApprovalRow, AttachmentRef, PayloadKind, Task, TaskPayload, validate_attachments};
use crate::validation::{APPROVAL_ROWS_MISMATCH, ValidationEngine};
use crate::{ApprovalStatus, DisciplineId, MocError, PersonId, RequestStatus, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// EVENTS
// =============================================================================

/// Progress notification produced by a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowEvent {
    TaskCompleted {
        stage: StageKind,
        task_index: usize,
        status: TaskStatus,
    },
    TaskActivated {
        stage: StageKind,
        task_index: usize,
        status: TaskStatus,
    },
    TaskRejected {
        stage: StageKind,
        task_index: usize,
        status: TaskStatus,
        remark: String,
    },
    TaskReopened {
        stage: StageKind,
        task_index: usize,
        status: TaskStatus,
    },
    TaskAnnotated {
        stage: StageKind,
        task_index: usize,
        attachments: usize,
    },
    StageCompleted {
        stage: StageKind,
    },
    RequestClosed,
    RequestCancelled {
        reason: String,
    },
    /// A propagation rule replaced a later task's payload.
    PayloadPropagated {
        stage: StageKind,
        task_index: usize,
        kind: PayloadKind,
        entries: usize,
    },
    ApprovalRecorded {
        row_id: String,
        status: Option<ApprovalStatus>,
    },
    /// Non-fatal: the row was emitted with an empty name.
    UnresolvedPersonReference {
        discipline: DisciplineId,
        person: PersonId,
    },
    SideActionRecorded {
        action: String,
    },
}

impl WorkflowEvent {
    /// Get the event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::TaskCompleted { .. } => "task-completed",
            WorkflowEvent::TaskActivated { .. } => "task-activated",
            WorkflowEvent::TaskRejected { .. } => "task-rejected",
            WorkflowEvent::TaskReopened { .. } => "task-reopened",
            WorkflowEvent::TaskAnnotated { .. } => "task-annotated",
            WorkflowEvent::StageCompleted { .. } => "stage-completed",
            WorkflowEvent::RequestClosed => "request-closed",
            WorkflowEvent::RequestCancelled { .. } => "request-cancelled",
            WorkflowEvent::PayloadPropagated { .. } => "payload-propagated",
            WorkflowEvent::ApprovalRecorded { .. } => "approval-recorded",
            WorkflowEvent::UnresolvedPersonReference { .. } => "unresolved-person",
            WorkflowEvent::SideActionRecorded { .. } => "side-action",
        }
    }

    /// The `(slot, new status)` pair for task status events.
    #[must_use]
    pub fn status_change(&self) -> Option<(TaskSlot, TaskStatus)> {
        match self {
            WorkflowEvent::TaskCompleted {
                stage,
                task_index,
                status,
            }
            | WorkflowEvent::TaskActivated {
                stage,
                task_index,
                status,
            }
            | WorkflowEvent::TaskRejected {
                stage,
                task_index,
                status,
                ..
            }
            | WorkflowEvent::TaskReopened {
                stage,
                task_index,
                status,
            } => Some((TaskSlot::new(*stage, *task_index), *status)),
            _ => None,
        }
    }

    /// Check if this event reports a diagnostic rather than progress.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, WorkflowEvent::UnresolvedPersonReference { .. })
    }
}

// =============================================================================
// TRANSITION
// =============================================================================

/// The result of a successful operation: next snapshot plus events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    request: Request,
    events: Vec<WorkflowEvent>,
}

impl Transition {
    /// The updated request.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Events in the order they occurred.
    #[must_use]
    pub fn events(&self) -> &[WorkflowEvent] {
        &self.events
    }

    /// Snapshot of one stage after the transition.
    #[must_use]
    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        self.request.stage(kind)
    }

    /// Split into snapshot and events.
    #[must_use]
    pub fn into_parts(self) -> (Request, Vec<WorkflowEvent>) {
        (self.request, self.events)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn status_event(slot: TaskSlot, status: TaskStatus) -> WorkflowEvent {
    let (stage, task_index) = (slot.stage, slot.index);
    match status {
        TaskStatus::Completed => WorkflowEvent::TaskCompleted {
            stage,
            task_index,
            status,
        },
        _ => WorkflowEvent::TaskActivated {
            stage,
            task_index,
            status,
        },
    }
}

fn check_text(field: &str, text: &str) -> Result<(), MocError> {
    if text.len() > MAX_TEXT_LENGTH {
        return Err(MocError::ValidationFailed(format!(
            "{} exceeds {} bytes",
            field, MAX_TEXT_LENGTH
        )));
    }
    Ok(())
}

/// Find a task on an open request.
fn locate(request: &Request, slot: TaskSlot) -> Result<&Task, MocError> {
    request.ensure_open()?;
    request.task(slot).ok_or(MocError::TaskNotFound(slot))
}

fn locate_mut(request: &mut Request, slot: TaskSlot) -> Result<&mut Task, MocError> {
    request.task_mut(slot).ok_or(MocError::TaskNotFound(slot))
}

/// Take decisions from `submitted` onto the propagated `current` rows.
///
/// Both sets must carry exactly the same row ids.
fn merge_approval_rows(
    current: &[ApprovalRow],
    submitted: &[ApprovalRow],
) -> Result<Vec<ApprovalRow>, MocError> {
    let mismatch = || MocError::ValidationFailed(APPROVAL_ROWS_MISMATCH.to_string());

    let decisions: BTreeMap<&str, &ApprovalRow> = submitted
        .iter()
        .map(|row| (row.row_id.as_str(), row))
        .collect();
    if decisions.len() != submitted.len() || decisions.len() != current.len() {
        return Err(mismatch());
    }

    current
        .iter()
        .map(|row| {
            let decided = decisions.get(row.row_id.as_str()).ok_or_else(mismatch)?;
            check_text("remark", &decided.remark)?;
            Ok(ApprovalRow {
                approval_status: decided.approval_status,
                remark: decided.remark.trim().to_string(),
                ..row.clone()
            })
        })
        .collect()
}

/// Resolve the payload that will be stored on completion.
fn merge_payload(current: &TaskPayload, submitted: TaskPayload) -> Result<TaskPayload, MocError> {
    match (current, submitted) {
        (TaskPayload::ApprovalRows(current), TaskPayload::ApprovalRows(submitted)) => Ok(
            TaskPayload::ApprovalRows(merge_approval_rows(current, &submitted)?),
        ),
        (_, submitted) => Ok(submitted),
    }
}

/// Activate the task after `slot`, the next stage, or close the request.
fn advance(
    request: &mut Request,
    slot: TaskSlot,
    events: &mut Vec<WorkflowEvent>,
) -> Result<(), MocError> {
    let stage_len = request
        .stage(slot.stage)
        .map(|s| s.tasks.len())
        .unwrap_or_default();
    let next_index = slot.index.saturating_add(1);

    let next_slot = if next_index < stage_len {
        Some(TaskSlot::new(slot.stage, next_index))
    } else {
        events.push(WorkflowEvent::StageCompleted { stage: slot.stage });
        slot.stage.next().map(|kind| TaskSlot::new(kind, 0))
    };

    match next_slot {
        Some(next) => {
            locate_mut(request, next)?.status = TaskStatus::InProgress;
            events.push(status_event(next, TaskStatus::InProgress));
        }
        None => {
            request.status = RequestStatus::Closed;
            events.push(WorkflowEvent::RequestClosed);
        }
    }

    Ok(())
}

// =============================================================================
// ENGINE
// =============================================================================

/// The workflow state machine with its validation and propagation registries.
#[derive(Debug)]
pub struct WorkflowEngine {
    validation: ValidationEngine,
    propagation: PropagationEngine,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

impl WorkflowEngine {
    /// Create an engine from explicit registries.
    #[must_use]
    pub fn new(validation: ValidationEngine, propagation: PropagationEngine) -> Self {
        Self {
            validation,
            propagation,
        }
    }

    /// Create an engine with the standard MOC rules registered.
    #[must_use]
    pub fn with_default_rules() -> Self {
        Self::new(
            ValidationEngine::with_default_rules(),
            PropagationEngine::with_default_rules(),
        )
    }

    /// Validation registry.
    #[must_use]
    pub fn validation(&self) -> &ValidationEngine {
        &self.validation
    }

    /// Propagation registry.
    #[must_use]
    pub fn propagation(&self) -> &PropagationEngine {
        &self.propagation
    }

    /// Complete the in-progress task at `slot` with `payload`.
    pub fn complete_task(
        &self,
        request: &Request,
        slot: TaskSlot,
        payload: TaskPayload,
        directory: &dyn PersonDirectory,
    ) -> Result<Transition, MocError> {
        let task = locate(request, slot)?;
        if task.status != TaskStatus::InProgress {
            return Err(MocError::OutOfOrderCompletion(slot));
        }

        let expected = task.payload.kind();
        if payload.kind() != expected {
            return Err(MocError::PayloadMismatch {
                slot,
                expected,
                actual: payload.kind(),
            });
        }

        let payload = merge_payload(&task.payload, payload)?;
        self.validation.validate(slot, &payload)?;

        // Propagation is computed before any mutation so a failing rule
        // leaves nothing half-applied.
        let propagated = self
            .propagation
            .rule_for(slot)
            .map(|rule| {
                rule.propagate(&payload, directory)
                    .map(|outcome| (rule.produces(), outcome))
            })
            .transpose()?;

        let mut next = request.clone();
        let mut events = Vec::new();

        let completed = locate_mut(&mut next, slot)?;
        completed.payload = payload;
        completed.status = TaskStatus::Completed;
        events.push(status_event(slot, TaskStatus::Completed));

        if let Some((produces, outcome)) = propagated {
            let target = locate_mut(&mut next, outcome.target)?;
            if target.is_completed() {
                return Err(MocError::ValidationFailed(format!(
                    "propagation target {} is already completed",
                    outcome.target
                )));
            }
            if target.payload.kind() != produces || outcome.payload.kind() != produces {
                return Err(MocError::PayloadMismatch {
                    slot: outcome.target,
                    expected: target.payload.kind(),
                    actual: outcome.payload.kind(),
                });
            }

            events.push(WorkflowEvent::PayloadPropagated {
                stage: outcome.target.stage,
                task_index: outcome.target.index,
                kind: produces,
                entries: outcome.payload.entries(),
            });
            target.payload = outcome.payload;

            events.extend(outcome.unresolved.into_iter().map(|miss| {
                WorkflowEvent::UnresolvedPersonReference {
                    discipline: miss.discipline,
                    person: miss.person,
                }
            }));
        }

        advance(&mut next, slot, &mut events)?;

        Ok(Transition {
            request: next,
            events,
        })
    }

    /// Reject the in-progress task at `slot`. The workflow does not advance.
    pub fn reject_task(
        &self,
        request: &Request,
        slot: TaskSlot,
        remark: &str,
    ) -> Result<Transition, MocError> {
        let task = locate(request, slot)?;
        if task.status != TaskStatus::InProgress {
            return Err(MocError::OutOfOrderCompletion(slot));
        }

        let remark = remark.trim();
        if remark.is_empty() {
            return Err(MocError::ValidationFailed(
                "rejection remark is required".to_string(),
            ));
        }
        check_text("rejection remark", remark)?;

        let mut next = request.clone();
        let rejected = locate_mut(&mut next, slot)?;
        rejected.status = TaskStatus::Rejected;
        rejected.rejection_remark = Some(remark.to_string());

        Ok(Transition {
            request: next,
            events: vec![WorkflowEvent::TaskRejected {
                stage: slot.stage,
                task_index: slot.index,
                status: TaskStatus::Rejected,
                remark: remark.to_string(),
            }],
        })
    }

    /// Move a rejected task back to In Progress.
    ///
    /// The rejection remark moves into the task's comments.
    pub fn reopen_task(&self, request: &Request, slot: TaskSlot) -> Result<Transition, MocError> {
        let task = locate(request, slot)?;
        if task.status != TaskStatus::Rejected {
            return Err(MocError::NotRejected(slot));
        }

        let mut next = request.clone();
        let reopened = locate_mut(&mut next, slot)?;
        reopened.status = TaskStatus::InProgress;
        if let Some(remark) = reopened.rejection_remark.take() {
            reopened.comments.push(format!("Rejected: {}", remark));
        }

        Ok(Transition {
            request: next,
            events: vec![WorkflowEvent::TaskReopened {
                stage: slot.stage,
                task_index: slot.index,
                status: TaskStatus::InProgress,
            }],
        })
    }

    /// Record an operator decision on one row of the in-progress approval task.
    pub fn update_approval_row(
        &self,
        request: &Request,
        row_id: &str,
        status: Option<ApprovalStatus>,
        remark: &str,
    ) -> Result<Transition, MocError> {
        let slot = APPROVE_REVIEW_TEAM;
        let task = locate(request, slot)?;
        if task.status != TaskStatus::InProgress {
            return Err(MocError::OutOfOrderCompletion(slot));
        }
        check_text("remark", remark)?;

        let mut next = request.clone();
        let row = match &mut locate_mut(&mut next, slot)?.payload {
            TaskPayload::ApprovalRows(rows) => rows.iter_mut().find(|r| r.row_id == row_id),
            _ => None,
        }
        .ok_or_else(|| MocError::UnknownApprovalRow(row_id.to_string()))?;

        row.approval_status = status;
        row.remark = remark.trim().to_string();

        Ok(Transition {
            request: next,
            events: vec![WorkflowEvent::ApprovalRecorded {
                row_id: row_id.to_string(),
                status,
            }],
        })
    }

    /// Append a comment and attachment references to the active task.
    pub fn annotate_task(
        &self,
        request: &Request,
        slot: TaskSlot,
        comment: &str,
        attachments: &[AttachmentRef],
    ) -> Result<Transition, MocError> {
        let task = locate(request, slot)?;
        if !matches!(task.status, TaskStatus::InProgress | TaskStatus::Rejected) {
            return Err(MocError::OutOfOrderCompletion(slot));
        }
        validate_attachments(task.attachments.len(), attachments)?;

        let mut next = request.clone();
        let annotated = locate_mut(&mut next, slot)?;
        annotated.push_comment(comment)?;
        annotated.attachments.extend_from_slice(attachments);

        Ok(Transition {
            request: next,
            events: vec![WorkflowEvent::TaskAnnotated {
                stage: slot.stage,
                task_index: slot.index,
                attachments: attachments.len(),
            }],
        })
    }

    /// Apply a request-level side action.
    pub fn apply_side_action(
        &self,
        request: &Request,
        action: &SideAction,
    ) -> Result<Transition, MocError> {
        let next = request.apply_side_action(action)?;

        let mut events = vec![WorkflowEvent::SideActionRecorded {
            action: action.name().to_string(),
        }];
        if let SideAction::Cancel { reason } = action {
            events.push(WorkflowEvent::RequestCancelled {
                reason: reason.trim().to_string(),
            });
        }

        Ok(Transition {
            request: next,
            events,
        })
    }

    /// Cancel the request. Reachable from any stage while open.
    pub fn cancel_request(&self, request: &Request, reason: &str) -> Result<Transition, MocError> {
        self.apply_side_action(
            request,
            &SideAction::Cancel {
                reason: reason.to_string(),
            },
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryDirectory, PersonRecord};
    use crate::request::RequestIntake;
    use crate::risk::RiskInput;
    use crate::system::{ASSIGN_ENGINEER, ASSIGN_REVIEW_TEAM};
    use crate::task::{Discipline, DisciplineAssignment};
    use crate::validation::NO_DISCIPLINE_ASSIGNED;
    use crate::{ChangeLength, Priority, RequestId, StageStatus};

    fn catalog() -> Vec<Discipline> {
        [("d1", "Process"), ("d2", "Mechanical"), ("d3", "Electrical")]
            .iter()
            .map(|(id, name)| Discipline {
                id: DisciplineId::new(*id),
                name: (*name).to_string(),
                direct_manager: format!("{} Manager", name),
            })
            .collect()
    }

    fn directory() -> InMemoryDirectory {
        InMemoryDirectory::with_people([
            PersonRecord::new("p2", "Mei Tanaka", "MOC Engineer"),
            PersonRecord::new("p5", "Amara Nwosu", "Process Engineer"),
            PersonRecord::new("p7", "Jonas Weber", "Electrical Engineer"),
        ])
    }

    fn open() -> Request {
        let intake = RequestIntake {
            title: "Install bypass on E-204".to_string(),
            area: "South Plant".to_string(),
            unit: "Hydrotreater".to_string(),
            change_type: "Process".to_string(),
            change_length: ChangeLength::Permanent,
            end_date: None,
            priority: Priority::Normal,
            justification: "Fouling requires online cleaning".to_string(),
            emergency_justification: None,
            initiator: PersonId::new("p1"),
            risk_before: RiskInput::new(3, 3),
            risk_after: RiskInput::new(2, 2),
        };
        Request::open(RequestId::new("MOC-100"), intake, &catalog()).expect("open")
    }

    /// Complete tasks with minimal valid payloads until `slot` is in progress.
    fn drive_to(engine: &WorkflowEngine, mut request: Request, slot: TaskSlot) -> Request {
        while request.active_slot() != Some(slot) {
            let active = request.active_slot().expect("active task");
            let payload = match active {
                ASSIGN_ENGINEER => TaskPayload::EngineerSelection(Some(PersonId::new("p2"))),
                ASSIGN_REVIEW_TEAM => review_team(&request),
                APPROVE_REVIEW_TEAM => approve_all(&request),
                _ => request.task(active).expect("task").payload.clone(),
            };
            request = engine
                .complete_task(&request, active, payload, &directory())
                .expect("complete")
                .into_parts()
                .0;
        }
        request
    }

    fn review_team(request: &Request) -> TaskPayload {
        let assignments: Vec<DisciplineAssignment> = request
            .task(ASSIGN_REVIEW_TEAM)
            .and_then(|t| t.payload.discipline_assignments())
            .expect("assignments")
            .iter()
            .cloned()
            .map(|a| match a.discipline_id.as_str() {
                "d1" => a.assigned(PersonId::new("p5")),
                "d3" => a.assigned(PersonId::new("p7")).marked_not_applicable(),
                _ => a,
            })
            .collect();
        TaskPayload::DisciplineAssignments(assignments)
    }

    fn approve_all(request: &Request) -> TaskPayload {
        let rows = request
            .task(APPROVE_REVIEW_TEAM)
            .and_then(|t| t.payload.approval_rows())
            .expect("rows")
            .iter()
            .cloned()
            .map(|mut row| {
                row.approval_status = Some(ApprovalStatus::Approved);
                row
            })
            .collect();
        TaskPayload::ApprovalRows(rows)
    }

    #[test]
    fn completing_first_task_unlocks_second() {
        let engine = WorkflowEngine::default();
        let request = open();
        let slot = TaskSlot::new(StageKind::Initiation, 0);

        let transition = engine
            .complete_task(&request, slot, TaskPayload::None, &directory())
            .expect("complete");

        let stage = transition.stage(StageKind::Initiation).expect("stage");
        assert_eq!(stage.tasks[0].status, TaskStatus::Completed);
        assert_eq!(stage.tasks[1].status, TaskStatus::InProgress);
        assert_eq!(stage.tasks[2].status, TaskStatus::NotStarted);
        assert_eq!(
            transition.events()[0].status_change(),
            Some((slot, TaskStatus::Completed))
        );
    }

    #[test]
    fn out_of_order_completion_is_rejected() {
        let engine = WorkflowEngine::default();
        let request = open();
        let result = engine.complete_task(
            &request,
            TaskSlot::new(StageKind::Initiation, 1),
            TaskPayload::None,
            &directory(),
        );
        assert_eq!(
            result,
            Err(MocError::OutOfOrderCompletion(TaskSlot::new(
                StageKind::Initiation,
                1
            )))
        );
    }

    #[test]
    fn unknown_slot_is_not_found() {
        let engine = WorkflowEngine::default();
        let slot = TaskSlot::new(StageKind::Closeout, 9);
        assert_eq!(
            engine.reject_task(&open(), slot, "no"),
            Err(MocError::TaskNotFound(slot))
        );
    }

    #[test]
    fn payload_kind_must_match() {
        let engine = WorkflowEngine::default();
        let request = drive_to(&engine, open(), ASSIGN_ENGINEER);
        let result = engine.complete_task(&request, ASSIGN_ENGINEER, TaskPayload::None, &directory());
        assert!(matches!(
            result,
            Err(MocError::PayloadMismatch {
                expected: PayloadKind::EngineerSelection,
                actual: PayloadKind::None,
                ..
            })
        ));
    }

    #[test]
    fn assignment_validation_short_circuits() {
        let engine = WorkflowEngine::default();
        let request = drive_to(&engine, open(), ASSIGN_REVIEW_TEAM);
        let untouched = request.task(ASSIGN_REVIEW_TEAM).expect("task").payload.clone();

        let result = engine.complete_task(&request, ASSIGN_REVIEW_TEAM, untouched, &directory());

        assert_eq!(
            result,
            Err(MocError::ValidationFailed(NO_DISCIPLINE_ASSIGNED.to_string()))
        );
        assert_eq!(
            request.task(ASSIGN_REVIEW_TEAM).map(|t| t.status),
            Some(TaskStatus::InProgress)
        );
    }

    #[test]
    fn team_assignment_propagates_rows() {
        let engine = WorkflowEngine::default();
        let request = drive_to(&engine, open(), ASSIGN_REVIEW_TEAM);

        let transition = engine
            .complete_task(&request, ASSIGN_REVIEW_TEAM, review_team(&request), &directory())
            .expect("complete");

        let rows = transition
            .request()
            .task(APPROVE_REVIEW_TEAM)
            .and_then(|t| t.payload.approval_rows())
            .expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_id, "d1");
        assert_eq!(rows[0].assigned_person_name, "Amara Nwosu");
        assert!(transition.events().iter().any(|e| matches!(
            e,
            WorkflowEvent::PayloadPropagated {
                kind: PayloadKind::ApprovalRows,
                entries: 1,
                ..
            }
        )));
        assert_eq!(
            transition.request().active_slot(),
            Some(APPROVE_REVIEW_TEAM)
        );
    }

    #[test]
    fn unresolved_reviewer_is_reported_not_fatal() {
        let engine = WorkflowEngine::default();
        let request = drive_to(&engine, open(), ASSIGN_REVIEW_TEAM);
        let mut payload = review_team(&request);
        if let TaskPayload::DisciplineAssignments(assignments) = &mut payload {
            assignments[1].assigned_person = Some(PersonId::new("p404"));
        }

        let transition = engine
            .complete_task(&request, ASSIGN_REVIEW_TEAM, payload, &directory())
            .expect("complete");

        let rows = transition
            .request()
            .task(APPROVE_REVIEW_TEAM)
            .and_then(|t| t.payload.approval_rows())
            .expect("rows");
        assert_eq!(rows.len(), 2);
        assert!(rows[1].assigned_person_name.is_empty());
        assert!(transition.events().iter().any(WorkflowEvent::is_warning));
    }

    #[test]
    fn approval_rows_take_decisions_only() {
        let engine = WorkflowEngine::default();
        let request = drive_to(&engine, open(), APPROVE_REVIEW_TEAM);

        let mut submitted = request
            .task(APPROVE_REVIEW_TEAM)
            .and_then(|t| t.payload.approval_rows())
            .expect("rows")
            .to_vec();
        submitted[0].approval_status = Some(ApprovalStatus::Approved);
        submitted[0].remark = " ok ".to_string();
        submitted[0].assigned_person_name = "Someone Else".to_string();

        let transition = engine
            .complete_task(
                &request,
                APPROVE_REVIEW_TEAM,
                TaskPayload::ApprovalRows(submitted),
                &directory(),
            )
            .expect("complete");

        let rows = transition
            .request()
            .task(APPROVE_REVIEW_TEAM)
            .and_then(|t| t.payload.approval_rows())
            .expect("rows");
        assert_eq!(rows[0].assigned_person_name, "Amara Nwosu");
        assert_eq!(rows[0].remark, "ok");
        assert_eq!(rows[0].approval_status, Some(ApprovalStatus::Approved));
    }

    #[test]
    fn foreign_approval_rows_are_rejected() {
        let engine = WorkflowEngine::default();
        let request = drive_to(&engine, open(), APPROVE_REVIEW_TEAM);
        let forged = vec![ApprovalRow {
            row_id: "d9".to_string(),
            discipline_name: "Civil".to_string(),
            assigned_person_name: String::new(),
            direct_manager_name: String::new(),
            approval_status: Some(ApprovalStatus::Approved),
            remark: String::new(),
        }];

        assert_eq!(
            engine.complete_task(
                &request,
                APPROVE_REVIEW_TEAM,
                TaskPayload::ApprovalRows(forged),
                &directory()
            ),
            Err(MocError::ValidationFailed(APPROVAL_ROWS_MISMATCH.to_string()))
        );
    }

    #[test]
    fn repropagation_resets_operator_decisions() {
        let engine = WorkflowEngine::default();
        let mut request = drive_to(&engine, open(), ASSIGN_REVIEW_TEAM);
        let team = review_team(&request);

        let stale = vec![crate::task::ApprovalRow {
            row_id: "d1".to_string(),
            discipline_name: "Process".to_string(),
            assigned_person_name: "Amara Nwosu".to_string(),
            direct_manager_name: "Process Manager".to_string(),
            approval_status: Some(ApprovalStatus::Approved),
            remark: "Looks fine".to_string(),
        }];
        request
            .task_mut(APPROVE_REVIEW_TEAM)
            .expect("approval task")
            .payload = TaskPayload::ApprovalRows(stale);

        let fresh = |request: &Request| {
            engine
                .complete_task(request, ASSIGN_REVIEW_TEAM, team.clone(), &directory())
                .expect("complete")
                .into_parts()
                .0
                .task(APPROVE_REVIEW_TEAM)
                .and_then(|t| t.payload.approval_rows())
                .expect("rows")
                .to_vec()
        };

        let first = fresh(&request);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].row_id, "d1");
        assert_eq!(first[0].approval_status, None);
        assert!(first[0].remark.is_empty());

        // Same assignments again over the already-reset rows.
        request
            .task_mut(APPROVE_REVIEW_TEAM)
            .expect("approval task")
            .payload = TaskPayload::ApprovalRows(first.clone());
        assert_eq!(fresh(&request), first);
    }

    #[test]
    fn update_approval_row_then_complete() {
        let engine = WorkflowEngine::default();
        let request = drive_to(&engine, open(), APPROVE_REVIEW_TEAM);

        assert!(matches!(
            engine.update_approval_row(&request, "d2", Some(ApprovalStatus::Approved), ""),
            Err(MocError::UnknownApprovalRow(_))
        ));

        let updated = engine
            .update_approval_row(&request, "d1", Some(ApprovalStatus::Rejected), "Wrong person")
            .expect("update")
            .into_parts()
            .0;
        let rows = updated
            .task(APPROVE_REVIEW_TEAM)
            .and_then(|t| t.payload.approval_rows())
            .expect("rows")
            .to_vec();
        assert_eq!(rows[0].approval_status, Some(ApprovalStatus::Rejected));

        let transition = engine
            .complete_task(
                &updated,
                APPROVE_REVIEW_TEAM,
                TaskPayload::ApprovalRows(rows),
                &directory(),
            )
            .expect("complete");
        assert_eq!(
            transition
                .request()
                .task(APPROVE_REVIEW_TEAM)
                .map(|t| t.status),
            Some(TaskStatus::Completed)
        );
    }

    #[test]
    fn reject_then_reopen() {
        let engine = WorkflowEngine::default();
        let request = open();
        let slot = TaskSlot::new(StageKind::Initiation, 0);

        assert!(engine.reject_task(&request, slot, "  ").is_err());

        let rejected = engine
            .reject_task(&request, slot, "Missing P&ID")
            .expect("reject")
            .into_parts()
            .0;
        assert_eq!(rejected.task(slot).map(|t| t.status), Some(TaskStatus::Rejected));
        assert_eq!(rejected.active_slot(), Some(slot));
        assert_eq!(
            rejected.stage(StageKind::Initiation).map(Stage::in_progress_index),
            Some(None)
        );
        assert_eq!(
            engine.complete_task(&rejected, slot, TaskPayload::None, &directory()),
            Err(MocError::OutOfOrderCompletion(slot))
        );

        let reopened = engine
            .reopen_task(&rejected, slot)
            .expect("reopen")
            .into_parts()
            .0;
        let task = reopened.task(slot).expect("task");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.rejection_remark, None);
        assert_eq!(task.comments, vec!["Rejected: Missing P&ID".to_string()]);

        assert_eq!(
            engine.reopen_task(&reopened, slot),
            Err(MocError::NotRejected(slot))
        );
    }

    #[test]
    fn annotate_active_task_only() {
        let engine = WorkflowEngine::default();
        let request = open();
        let slot = TaskSlot::new(StageKind::Initiation, 0);

        let annotated = engine
            .annotate_task(
                &request,
                slot,
                "Datasheet attached",
                &[AttachmentRef::new("Datasheet", "p101.pdf")],
            )
            .expect("annotate")
            .into_parts()
            .0;
        let task = annotated.task(slot).expect("task");
        assert_eq!(task.comments.len(), 1);
        assert_eq!(task.attachments.len(), 1);

        assert_eq!(
            engine.annotate_task(&request, TaskSlot::new(StageKind::Review, 0), "early", &[]),
            Err(MocError::OutOfOrderCompletion(TaskSlot::new(StageKind::Review, 0)))
        );
    }

    #[test]
    fn cancel_blocks_further_transitions() {
        let engine = WorkflowEngine::default();
        let request = drive_to(&engine, open(), ASSIGN_REVIEW_TEAM);

        let transition = engine
            .cancel_request(&request, "Project deferred")
            .expect("cancel");
        assert!(transition.events().iter().any(|e| matches!(
            e,
            WorkflowEvent::RequestCancelled { reason } if reason == "Project deferred"
        )));
        let cancelled = transition.into_parts().0;

        assert!(matches!(
            engine.complete_task(
                &cancelled,
                ASSIGN_REVIEW_TEAM,
                review_team(&cancelled),
                &directory()
            ),
            Err(MocError::TerminalRequest(_, RequestStatus::Cancelled))
        ));
        assert!(matches!(
            engine.reject_task(&cancelled, ASSIGN_REVIEW_TEAM, "late"),
            Err(MocError::TerminalRequest(..))
        ));
    }

    #[test]
    fn full_run_closes_request() {
        let engine = WorkflowEngine::default();
        let last = TaskSlot::new(StageKind::Closeout, 1);
        let request = drive_to(&engine, open(), last);

        let transition = engine
            .complete_task(&request, last, TaskPayload::None, &directory())
            .expect("close");

        assert_eq!(transition.request().status(), RequestStatus::Closed);
        assert_eq!(transition.request().active_slot(), None);
        assert!(
            transition
                .request()
                .stages()
                .iter()
                .all(|s| s.status() == StageStatus::Completed)
        );
        assert_eq!(
            transition.events().last(),
            Some(&WorkflowEvent::RequestClosed)
        );
        assert!(transition.request().check_invariants().is_ok());
    }
}
