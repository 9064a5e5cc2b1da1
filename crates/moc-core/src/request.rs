//! # Change Requests
//!
//! A `Request` is opened once from intake data and then mutated only through
//! workflow transitions and request-level side actions. It is never deleted;
//! `Closed` and `Cancelled` are its terminal states.
//!
//! ## Intake Rules
//!
//! - Title, area, unit, change type, justification and initiator are required
//! - Emergency priority requires an emergency justification
//! - Temporary changes require an end date
//! - Both risk pairs must lie on the risk matrix

use crate::primitives::{MAX_FIELD_LENGTH, MAX_TEXT_LENGTH};
use crate::risk::{RiskAssessment, RiskInput, assess_risk};
use crate::system::{Stage, StageKind, StageProgress, TaskSlot};
use crate::task::{AttachmentRef, Discipline, Task, validate_attachments};
use crate::{ChangeLength, MocError, PersonId, Priority, RequestId, RequestStatus, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// FIELD CHECKS
// =============================================================================

fn require(field: &str, value: &str, limit: usize) -> Result<(), MocError> {
    if value.trim().is_empty() {
        return Err(MocError::InvalidIntake(format!("{} is required", field)));
    }
    if value.len() > limit {
        return Err(MocError::InvalidIntake(format!(
            "{} exceeds {} bytes",
            field, limit
        )));
    }
    Ok(())
}

fn require_action(field: &str, value: &str) -> Result<(), MocError> {
    if value.trim().is_empty() {
        return Err(MocError::InvalidSideAction(format!("{} is required", field)));
    }
    if value.len() > MAX_TEXT_LENGTH {
        return Err(MocError::InvalidSideAction(format!(
            "{} exceeds {} bytes",
            field, MAX_TEXT_LENGTH
        )));
    }
    Ok(())
}

// =============================================================================
// INTAKE
// =============================================================================

/// Data captured when a change request is raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestIntake {
    pub title: String,
    pub area: String,
    pub unit: String,
    pub change_type: String,
    pub change_length: ChangeLength,
    /// Required for temporary changes.
    pub end_date: Option<String>,
    pub priority: Priority,
    pub justification: String,
    /// Required for emergency changes.
    pub emergency_justification: Option<String>,
    pub initiator: PersonId,
    pub risk_before: RiskInput,
    pub risk_after: RiskInput,
}

impl RequestIntake {
    /// Check every intake-time rule.
    pub fn validate(&self) -> Result<(), MocError> {
        require("title", &self.title, MAX_FIELD_LENGTH)?;
        require("area", &self.area, MAX_FIELD_LENGTH)?;
        require("unit", &self.unit, MAX_FIELD_LENGTH)?;
        require("change type", &self.change_type, MAX_FIELD_LENGTH)?;
        require("justification", &self.justification, MAX_TEXT_LENGTH)?;
        require("initiator", self.initiator.as_str(), MAX_FIELD_LENGTH)?;

        if self.priority == Priority::Emergency {
            require(
                "emergency justification",
                self.emergency_justification.as_deref().unwrap_or_default(),
                MAX_TEXT_LENGTH,
            )?;
        }

        if self.change_length == ChangeLength::Temporary {
            require(
                "end date",
                self.end_date.as_deref().unwrap_or_default(),
                MAX_FIELD_LENGTH,
            )?;
        }

        Ok(())
    }
}

// =============================================================================
// SIDE ACTIONS
// =============================================================================

/// Request-level actions that do not touch stage or task state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideAction {
    Cancel {
        reason: String,
    },
    ChangeChampion {
        champion: PersonId,
        reason: String,
    },
    ChangeTeam {
        role: String,
        person: PersonId,
        reason: String,
    },
    Extend {
        new_end_date: String,
        reason: String,
    },
}

impl SideAction {
    /// Get the action name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SideAction::Cancel { .. } => "cancel",
            SideAction::ChangeChampion { .. } => "change-champion",
            SideAction::ChangeTeam { .. } => "change-team",
            SideAction::Extend { .. } => "extend",
        }
    }

    /// Check that every required field is present.
    pub fn validate(&self) -> Result<(), MocError> {
        match self {
            SideAction::Cancel { reason } => require_action("reason", reason),
            SideAction::ChangeChampion { champion, reason } => {
                require_action("champion", champion.as_str())?;
                require_action("reason", reason)
            }
            SideAction::ChangeTeam {
                role,
                person,
                reason,
            } => {
                require_action("role", role)?;
                require_action("person", person.as_str())?;
                require_action("reason", reason)
            }
            SideAction::Extend {
                new_end_date,
                reason,
            } => {
                require_action("new end date", new_end_date)?;
                require_action("reason", reason)
            }
        }
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// A Management-of-Change request and its full workflow state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub(crate) id: RequestId,
    pub(crate) intake: RequestIntake,
    pub(crate) risk_before: RiskAssessment,
    pub(crate) risk_after: RiskAssessment,
    pub(crate) status: RequestStatus,
    pub(crate) champion: Option<PersonId>,
    pub(crate) team: BTreeMap<String, PersonId>,
    pub(crate) attachments: Vec<AttachmentRef>,
    pub(crate) stages: Vec<Stage>,
    pub(crate) history: Vec<SideAction>,
}

impl Request {
    /// Open a request from intake data.
    ///
    /// Validates intake, assesses both risk pairs and builds every stage from
    /// its blueprint. Task 0 of the first stage starts In Progress.
    pub fn open(
        id: RequestId,
        intake: RequestIntake,
        catalog: &[Discipline],
    ) -> Result<Self, MocError> {
        require("request id", id.as_str(), MAX_FIELD_LENGTH)?;
        intake.validate()?;

        let risk_before = intake.risk_before.assess()?;
        let risk_after = intake.risk_after.assess()?;

        let mut stages: Vec<Stage> = StageKind::ALL
            .iter()
            .map(|kind| Stage::from_blueprint(*kind, catalog))
            .collect();

        if let Some(first) = stages.first_mut().and_then(|s| s.tasks.first_mut()) {
            first.status = TaskStatus::InProgress;
        }

        Ok(Self {
            id,
            intake,
            risk_before,
            risk_after,
            status: RequestStatus::Open,
            champion: None,
            team: BTreeMap::new(),
            attachments: Vec::new(),
            stages,
            history: Vec::new(),
        })
    }

    /// Request identifier.
    #[must_use]
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Intake data as captured.
    #[must_use]
    pub fn intake(&self) -> &RequestIntake {
        &self.intake
    }

    /// Title shortcut.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.intake.title
    }

    /// Risk before the change.
    #[must_use]
    pub fn risk_before(&self) -> &RiskAssessment {
        &self.risk_before
    }

    /// Risk after mitigation.
    #[must_use]
    pub fn risk_after(&self) -> &RiskAssessment {
        &self.risk_after
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// Current MOC champion.
    #[must_use]
    pub fn champion(&self) -> Option<&PersonId> {
        self.champion.as_ref()
    }

    /// Team members by role.
    #[must_use]
    pub fn team(&self) -> &BTreeMap<String, PersonId> {
        &self.team
    }

    /// Request-level attachments.
    #[must_use]
    pub fn attachments(&self) -> &[AttachmentRef] {
        &self.attachments
    }

    /// Applied side actions, oldest first.
    #[must_use]
    pub fn history(&self) -> &[SideAction] {
        &self.history
    }

    /// All stages in workflow order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// A stage by kind.
    #[must_use]
    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    pub(crate) fn stage_mut(&mut self, kind: StageKind) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.kind == kind)
    }

    /// A task by slot.
    #[must_use]
    pub fn task(&self, slot: TaskSlot) -> Option<&Task> {
        self.stage(slot.stage)?.task(slot.index)
    }

    pub(crate) fn task_mut(&mut self, slot: TaskSlot) -> Option<&mut Task> {
        self.stage_mut(slot.stage)?.tasks.get_mut(slot.index)
    }

    /// Slot of the active task (in progress or rejected), if the request is open.
    #[must_use]
    pub fn active_slot(&self) -> Option<TaskSlot> {
        if self.status.is_terminal() {
            return None;
        }
        self.stages
            .iter()
            .find_map(|s| s.frontier().map(|index| TaskSlot::new(s.kind, index)))
    }

    /// Progress for every stage.
    #[must_use]
    pub fn progress(&self) -> Vec<StageProgress> {
        self.stages.iter().map(Stage::progress).collect()
    }

    /// Fail with `TerminalRequest` if the request is closed or cancelled.
    pub fn ensure_open(&self) -> Result<(), MocError> {
        if self.status.is_terminal() {
            return Err(MocError::TerminalRequest(self.id.clone(), self.status));
        }
        Ok(())
    }

    /// Attach a request-level document reference.
    pub fn attach(&mut self, attachment: AttachmentRef) -> Result<(), MocError> {
        self.ensure_open()?;
        validate_attachments(self.attachments.len(), std::slice::from_ref(&attachment))?;
        self.attachments.push(attachment);
        Ok(())
    }

    /// Apply a side action, returning the updated request.
    ///
    /// Side actions never touch stage or task state.
    pub fn apply_side_action(&self, action: &SideAction) -> Result<Request, MocError> {
        self.ensure_open()?;
        action.validate()?;

        let mut next = self.clone();
        match action {
            SideAction::Cancel { .. } => {
                next.status = RequestStatus::Cancelled;
            }
            SideAction::ChangeChampion { champion, .. } => {
                next.champion = Some(champion.clone());
            }
            SideAction::ChangeTeam { role, person, .. } => {
                next.team.insert(role.trim().to_string(), person.clone());
            }
            SideAction::Extend { new_end_date, .. } => {
                if next.intake.change_length != ChangeLength::Temporary {
                    return Err(MocError::InvalidSideAction(
                        "only temporary changes can be extended".to_string(),
                    ));
                }
                next.intake.end_date = Some(new_end_date.trim().to_string());
            }
        }
        next.history.push(action.clone());

        Ok(next)
    }

    /// Verify the ordering invariants across all stages.
    ///
    /// Stages before the active one are Completed, stages after it are Not
    /// Started, and each stage passes [`Stage::check_invariants`]. An open
    /// request has its frontier task In Progress or Rejected; a closed one
    /// has every stage Completed.
    pub fn check_invariants(&self) -> Result<(), MocError> {
        for risk in [&self.risk_before, &self.risk_after] {
            if assess_risk(risk.severity(), risk.probability()).as_ref() != Ok(risk) {
                return Err(MocError::DeserializationError(
                    "risk assessment does not match its levels".to_string(),
                ));
            }
        }

        let kinds: Vec<StageKind> = self.stages.iter().map(|s| s.kind).collect();
        if kinds != StageKind::ALL {
            return Err(MocError::DeserializationError(
                "stages are missing or out of order".to_string(),
            ));
        }

        for stage in &self.stages {
            stage.check_invariants()?;
            if stage.tasks.len() != stage.kind.blueprint().len() {
                return Err(MocError::DeserializationError(format!(
                    "{} stage has {} tasks, expected {}",
                    stage.kind,
                    stage.tasks.len(),
                    stage.kind.blueprint().len()
                )));
            }
        }

        let active = self.stages.iter().position(|s| !s.is_completed());
        if let Some(active) = active {
            let later_started = self.stages[active.saturating_add(1)..]
                .iter()
                .any(|s| s.tasks.iter().any(|t| t.status != TaskStatus::NotStarted));
            if later_started {
                return Err(MocError::DeserializationError(
                    "a later stage started before the active stage completed".to_string(),
                ));
            }

            let stage = &self.stages[active];
            match self.status {
                RequestStatus::Closed => {
                    return Err(MocError::DeserializationError(format!(
                        "request is closed but the {} stage is unfinished",
                        stage.kind
                    )));
                }
                RequestStatus::Open => {
                    let frontier = stage.frontier().and_then(|index| stage.task(index));
                    if let Some(task) = frontier {
                        if !matches!(task.status, TaskStatus::InProgress | TaskStatus::Rejected) {
                            return Err(MocError::DeserializationError(format!(
                                "no active task: {}/{} is {}",
                                stage.kind, task.index, task.status
                            )));
                        }
                    }
                }
                RequestStatus::Cancelled => {}
            }
        } else if self.status == RequestStatus::Open {
            return Err(MocError::DeserializationError(
                "all stages completed but request is still open".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
