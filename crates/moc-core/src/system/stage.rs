//! # Stages
//!
//! A request passes through four fixed stages, in order. Each stage owns a
//! fixed list of tasks defined by its blueprint.
//!
//! ## Stage Blueprints
//!
//! | Stage | # | Task | Payload |
//! |-------|---|------|---------|
//! | Initiation | 0 | Submit Change Request | none |
//! | Initiation | 1 | Line Manager Endorsement | none |
//! | Initiation | 2 | Assign MOC Engineer | engineer selection |
//! | Review | 0 | Preliminary Review | none |
//! | Review | 1 | Assign Technical Review Team | discipline assignments |
//! | Review | 2 | Approve Technical Review Team | approval rows |
//! | Review | 3 | Technical Document Review | document review |
//! | Review | 4 | Final Approval | none |
//! | Implementation | 0 | Pre-Implementation Checks | none |
//! | Implementation | 1 | Execute Change | none |
//! | Implementation | 2 | Update Documentation | document review |
//! | Closeout | 0 | Post-Implementation Review | none |
//! | Closeout | 1 | Close MOC | none |
//!
//! ## Gating Invariant
//!
//! Within a stage, every task before the active one is Completed, the
//! active one is In Progress or Rejected, and every task after it is Not
//! Started. [`Stage::check_invariants`] verifies the ordering; the request
//! level check additionally requires the active stage of an open request
//! to have an In Progress or Rejected task.

use crate::task::{Assignee, Discipline, DisciplineAssignment, PayloadKind, Task, TaskPayload};
use crate::{MocError, StageStatus, TaskStatus};
use serde::{Deserialize, Serialize};

// =============================================================================
// STAGE KIND
// =============================================================================

/// The four fixed workflow phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Initiation,
    Review,
    Implementation,
    Closeout,
}

impl StageKind {
    /// All stages in workflow order.
    pub const ALL: [StageKind; 4] = [
        StageKind::Initiation,
        StageKind::Review,
        StageKind::Implementation,
        StageKind::Closeout,
    ];

    /// Get the stage name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Initiation => "Initiation",
            StageKind::Review => "Review",
            StageKind::Implementation => "Implementation",
            StageKind::Closeout => "Closeout",
        }
    }

    /// Position in workflow order.
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            StageKind::Initiation => 0,
            StageKind::Review => 1,
            StageKind::Implementation => 2,
            StageKind::Closeout => 3,
        }
    }

    /// Get the next stage, if any.
    #[must_use]
    pub fn next(&self) -> Option<StageKind> {
        match self {
            StageKind::Initiation => Some(StageKind::Review),
            StageKind::Review => Some(StageKind::Implementation),
            StageKind::Implementation => Some(StageKind::Closeout),
            StageKind::Closeout => None,
        }
    }

    /// Check if this is the last stage.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageKind::Closeout)
    }

    /// Task templates for this stage.
    #[must_use]
    pub fn blueprint(&self) -> &'static [TaskTemplate] {
        match self {
            StageKind::Initiation => INITIATION_TASKS,
            StageKind::Review => REVIEW_TASKS,
            StageKind::Implementation => IMPLEMENTATION_TASKS,
            StageKind::Closeout => CLOSEOUT_TASKS,
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for StageKind {
    type Err = MocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "initiation" => Ok(StageKind::Initiation),
            "review" => Ok(StageKind::Review),
            "implementation" => Ok(StageKind::Implementation),
            "closeout" => Ok(StageKind::Closeout),
            other => Err(MocError::ValidationFailed(format!(
                "unknown stage '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// TASK SLOT
// =============================================================================

/// Address of a task: stage plus ordinal within the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskSlot {
    pub stage: StageKind,
    pub index: usize,
}

impl TaskSlot {
    /// Create a new slot.
    #[must_use]
    pub const fn new(stage: StageKind, index: usize) -> Self {
        Self { stage, index }
    }
}

impl std::fmt::Display for TaskSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.stage.name(), self.index)
    }
}

/// Initiation: the MOC coordinator picks the engineer.
pub const ASSIGN_ENGINEER: TaskSlot = TaskSlot::new(StageKind::Initiation, 2);

/// Review: the engineer assigns a reviewer per discipline.
pub const ASSIGN_REVIEW_TEAM: TaskSlot = TaskSlot::new(StageKind::Review, 1);

/// Review: the area authority approves the proposed team.
pub const APPROVE_REVIEW_TEAM: TaskSlot = TaskSlot::new(StageKind::Review, 2);

/// Review: technical documents are checked.
pub const TECHNICAL_DOCUMENT_REVIEW: TaskSlot = TaskSlot::new(StageKind::Review, 3);

/// Implementation: controlled documents are updated.
pub const UPDATE_DOCUMENTATION: TaskSlot = TaskSlot::new(StageKind::Implementation, 2);

// =============================================================================
// BLUEPRINTS
// =============================================================================

/// Static description of a task within a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTemplate {
    pub name: &'static str,
    pub role: &'static str,
    pub payload: PayloadKind,
}

const fn template(name: &'static str, role: &'static str, payload: PayloadKind) -> TaskTemplate {
    TaskTemplate {
        name,
        role,
        payload,
    }
}

const INITIATION_TASKS: &[TaskTemplate] = &[
    template("Submit Change Request", "Initiator", PayloadKind::None),
    template("Line Manager Endorsement", "Line Manager", PayloadKind::None),
    template("Assign MOC Engineer", "MOC Coordinator", PayloadKind::EngineerSelection),
];

const REVIEW_TASKS: &[TaskTemplate] = &[
    template("Preliminary Review", "MOC Engineer", PayloadKind::None),
    template(
        "Assign Technical Review Team",
        "MOC Engineer",
        PayloadKind::DisciplineAssignments,
    ),
    template(
        "Approve Technical Review Team",
        "Area Authority",
        PayloadKind::ApprovalRows,
    ),
    template(
        "Technical Document Review",
        "Technical Review Team",
        PayloadKind::DocumentReview,
    ),
    template("Final Approval", "Plant Manager", PayloadKind::None),
];

const IMPLEMENTATION_TASKS: &[TaskTemplate] = &[
    template("Pre-Implementation Checks", "MOC Champion", PayloadKind::None),
    template("Execute Change", "MOC Champion", PayloadKind::None),
    template(
        "Update Documentation",
        "Document Controller",
        PayloadKind::DocumentReview,
    ),
];

const CLOSEOUT_TASKS: &[TaskTemplate] = &[
    template("Post-Implementation Review", "MOC Engineer", PayloadKind::None),
    template("Close MOC", "MOC Coordinator", PayloadKind::None),
];

// =============================================================================
// STAGE
// =============================================================================

/// A stage and its ordered tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub kind: StageKind,
    pub tasks: Vec<Task>,
}

impl Stage {
    /// Build a stage from its blueprint with every task Not Started.
    ///
    /// The discipline catalog seeds the team-assignment payload.
    #[must_use]
    pub fn from_blueprint(kind: StageKind, catalog: &[Discipline]) -> Self {
        let tasks = kind
            .blueprint()
            .iter()
            .enumerate()
            .map(|(index, template)| {
                let payload = match template.payload {
                    PayloadKind::DisciplineAssignments => TaskPayload::DisciplineAssignments(
                        catalog.iter().map(DisciplineAssignment::unassigned).collect(),
                    ),
                    other => other.empty_payload(),
                };
                Task::new(index, template.name, Assignee::role(template.role), payload)
            })
            .collect();

        Self { kind, tasks }
    }

    /// Derived stage status.
    #[must_use]
    pub fn status(&self) -> StageStatus {
        if self.tasks.iter().all(Task::is_completed) {
            StageStatus::Completed
        } else if self
            .tasks
            .iter()
            .all(|t| t.status == TaskStatus::NotStarted)
        {
            StageStatus::NotStarted
        } else {
            StageStatus::InProgress
        }
    }

    /// Check if every task is completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status() == StageStatus::Completed
    }

    /// Get a task by ordinal.
    #[must_use]
    pub fn task(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    /// Index of the task currently in progress, if any.
    #[must_use]
    pub fn in_progress_index(&self) -> Option<usize> {
        self.tasks
            .iter()
            .position(|t| t.status == TaskStatus::InProgress)
    }

    /// Index of the lowest task that is not yet completed.
    #[must_use]
    pub fn frontier(&self) -> Option<usize> {
        self.tasks.iter().position(|t| !t.is_completed())
    }

    /// Number of completed tasks.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_completed()).count()
    }

    /// Verify the gating invariant.
    pub fn check_invariants(&self) -> Result<(), MocError> {
        let violation = |detail: String| -> Result<(), MocError> {
            Err(MocError::DeserializationError(format!(
                "{} stage violates task ordering: {}",
                self.kind, detail
            )))
        };

        for (position, task) in self.tasks.iter().enumerate() {
            if task.index != position {
                return violation(format!("task at {} has index {}", position, task.index));
            }
        }

        let Some(frontier) = self.frontier() else {
            return Ok(());
        };

        for task in &self.tasks[frontier.saturating_add(1)..] {
            if task.status != TaskStatus::NotStarted {
                return violation(format!(
                    "task {} is {} after the active task",
                    task.index, task.status
                ));
            }
        }

        Ok(())
    }

    /// Progress summary.
    #[must_use]
    pub fn progress(&self) -> StageProgress {
        let total = self.tasks.len();
        let completed = self.completed_count();
        let percent = if total > 0 {
            ((completed as u64).saturating_mul(100) / (total as u64)) as u8
        } else {
            100
        };

        StageProgress {
            kind: self.kind,
            status: self.status(),
            completed,
            total,
            percent: percent.min(100),
            active: self.frontier().filter(|_| self.status() != StageStatus::NotStarted),
        }
    }
}

/// Progress information for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    pub kind: StageKind,
    pub status: StageStatus,
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
    /// Ordinal of the active (in progress or rejected) task.
    pub active: Option<usize>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DisciplineId;

    fn catalog() -> Vec<Discipline> {
        vec![
            Discipline {
                id: DisciplineId::new("d1"),
                name: "Electrical".to_string(),
                direct_manager: "R. Osei".to_string(),
            },
            Discipline {
                id: DisciplineId::new("d2"),
                name: "Mechanical".to_string(),
                direct_manager: "L. Brandt".to_string(),
            },
        ]
    }

    #[test]
    fn stage_ordering() {
        assert!(StageKind::Initiation < StageKind::Review);
        assert!(StageKind::Review < StageKind::Implementation);
        assert!(StageKind::Implementation < StageKind::Closeout);
        assert_eq!(StageKind::Closeout.next(), None);
    }

    #[test]
    fn fresh_stage_is_not_started() {
        let stage = Stage::from_blueprint(StageKind::Review, &catalog());
        assert_eq!(stage.status(), StageStatus::NotStarted);
        assert_eq!(stage.tasks.len(), 5);
        assert!(stage.check_invariants().is_ok());
    }

    #[test]
    fn catalog_seeds_assignment_task() {
        let stage = Stage::from_blueprint(StageKind::Review, &catalog());
        let assignments = stage.tasks[ASSIGN_REVIEW_TEAM.index]
            .payload
            .discipline_assignments()
            .expect("assignment payload");
        assert_eq!(assignments.len(), 2);
        assert!(assignments.iter().all(|a| a.assigned_person.is_none()));
    }

    #[test]
    fn derived_status_in_progress_and_completed() {
        let mut stage = Stage::from_blueprint(StageKind::Closeout, &[]);
        stage.tasks[0].status = TaskStatus::InProgress;
        assert_eq!(stage.status(), StageStatus::InProgress);

        stage.tasks[0].status = TaskStatus::Completed;
        stage.tasks[1].status = TaskStatus::Completed;
        assert_eq!(stage.status(), StageStatus::Completed);
        assert_eq!(stage.progress().percent, 100);
    }

    #[test]
    fn invariant_detects_task_ahead_of_frontier() {
        let mut stage = Stage::from_blueprint(StageKind::Initiation, &[]);
        stage.tasks[0].status = TaskStatus::InProgress;
        stage.tasks[2].status = TaskStatus::InProgress;
        assert!(stage.check_invariants().is_err());
    }

    #[test]
    fn well_known_slots_match_blueprints() {
        let review = StageKind::Review.blueprint();
        assert_eq!(
            review[ASSIGN_REVIEW_TEAM.index].payload,
            PayloadKind::DisciplineAssignments
        );
        assert_eq!(
            review[APPROVE_REVIEW_TEAM.index].payload,
            PayloadKind::ApprovalRows
        );
        assert_eq!(
            StageKind::Initiation.blueprint()[ASSIGN_ENGINEER.index].payload,
            PayloadKind::EngineerSelection
        );
    }

    #[test]
    fn stage_kind_parses() {
        assert_eq!(
            "review".parse::<StageKind>().expect("parse"),
            StageKind::Review
        );
        assert!("design".parse::<StageKind>().is_err());
    }

    #[test]
    fn slot_display() {
        assert_eq!(ASSIGN_REVIEW_TEAM.to_string(), "Review/1");
    }
}
