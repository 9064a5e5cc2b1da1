//! # Cross-Task Data Propagation
//!
//! Derives a later task's input from an earlier task's output at the moment
//! the earlier task completes.
//!
//! The only built-in rule rebuilds the "Approve Technical Review Team" rows
//! from the "Assign Technical Review Team" assignments:
//! 1. Drop every discipline that is not applicable or has no reviewer
//! 2. Resolve the reviewer's display name (empty if unknown, never an error)
//! 3. Emit one undecided row per surviving discipline
//!
//! The result replaces the target rows wholesale. Decisions recorded on a
//! previous row set do not survive a rebuild.

use crate::directory::PersonDirectory;
use crate::system::{APPROVE_REVIEW_TEAM, ASSIGN_REVIEW_TEAM, TaskSlot};
use crate::task::{ApprovalRow, DisciplineAssignment, PayloadKind, TaskPayload};
use crate::{DisciplineId, MocError, PersonId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// OUTCOME
// =============================================================================

/// A reviewer id the directory could not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    pub discipline: DisciplineId,
    pub person: PersonId,
}

/// Result of running a propagation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationOutcome {
    /// Slot whose payload is replaced.
    pub target: TaskSlot,
    /// Replacement payload.
    pub payload: TaskPayload,
    /// Non-fatal lookup misses encountered while building the payload.
    pub unresolved: Vec<UnresolvedReference>,
}

// =============================================================================
// APPROVAL ROWS
// =============================================================================

/// Build approval rows and collect unresolved reviewer ids.
#[must_use]
pub fn build_approval_rows_with_diagnostics(
    disciplines: &[DisciplineAssignment],
    directory: &dyn PersonDirectory,
) -> (Vec<ApprovalRow>, Vec<UnresolvedReference>) {
    let mut unresolved = Vec::new();

    let rows = disciplines
        .iter()
        .filter(|d| !d.not_applicable)
        .filter_map(|d| d.assigned_person.as_ref().map(|person| (d, person)))
        .map(|(d, person)| {
            let assigned_person_name = match directory.resolve_person(person) {
                Some(record) => record.name,
                None => {
                    unresolved.push(UnresolvedReference {
                        discipline: d.discipline_id.clone(),
                        person: person.clone(),
                    });
                    String::new()
                }
            };

            ApprovalRow {
                row_id: d.discipline_id.as_str().to_string(),
                discipline_name: d.discipline_name.clone(),
                assigned_person_name,
                direct_manager_name: d.direct_manager_name.clone(),
                approval_status: None,
                remark: String::new(),
            }
        })
        .collect();

    (rows, unresolved)
}

/// Build the approval row set for a discipline assignment set.
#[must_use]
pub fn build_approval_rows(
    disciplines: &[DisciplineAssignment],
    directory: &dyn PersonDirectory,
) -> Vec<ApprovalRow> {
    build_approval_rows_with_diagnostics(disciplines, directory).0
}

// =============================================================================
// RULE TRAIT
// =============================================================================

/// A rule that rebuilds one later task's payload from a completed task.
pub trait PropagationRule: Send + Sync {
    /// Short rule name for diagnostics.
    fn name(&self) -> &'static str;

    /// Slot whose payload this rule replaces.
    fn target(&self) -> TaskSlot;

    /// Payload kind this rule produces.
    fn produces(&self) -> PayloadKind;

    /// Build the replacement payload from the source payload.
    fn propagate(
        &self,
        source: &TaskPayload,
        directory: &dyn PersonDirectory,
    ) -> Result<PropagationOutcome, MocError>;
}

/// Team assignment -> team approval rows.
pub struct ApprovalRowsRule;

impl PropagationRule for ApprovalRowsRule {
    fn name(&self) -> &'static str {
        "approval-rows"
    }

    fn target(&self) -> TaskSlot {
        APPROVE_REVIEW_TEAM
    }

    fn produces(&self) -> PayloadKind {
        PayloadKind::ApprovalRows
    }

    fn propagate(
        &self,
        source: &TaskPayload,
        directory: &dyn PersonDirectory,
    ) -> Result<PropagationOutcome, MocError> {
        let disciplines = source
            .discipline_assignments()
            .ok_or(MocError::PayloadMismatch {
                slot: ASSIGN_REVIEW_TEAM,
                expected: PayloadKind::DisciplineAssignments,
                actual: source.kind(),
            })?;

        let (rows, unresolved) = build_approval_rows_with_diagnostics(disciplines, directory);

        Ok(PropagationOutcome {
            target: self.target(),
            payload: TaskPayload::ApprovalRows(rows),
            unresolved,
        })
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Registry of propagation rules keyed by source slot.
#[derive(Default)]
pub struct PropagationEngine {
    rules: BTreeMap<TaskSlot, Box<dyn PropagationRule>>,
}

impl PropagationEngine {
    /// Create an engine with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with the standard MOC rules registered.
    #[must_use]
    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        engine.register(ASSIGN_REVIEW_TEAM, ApprovalRowsRule);
        engine
    }

    /// Register (or replace) the rule for a source slot.
    pub fn register(&mut self, source: TaskSlot, rule: impl PropagationRule + 'static) {
        self.rules.insert(source, Box::new(rule));
    }

    /// Get the rule registered for a source slot.
    #[must_use]
    pub fn rule_for(&self, source: TaskSlot) -> Option<&dyn PropagationRule> {
        self.rules.get(&source).map(|r| r.as_ref())
    }
}

impl std::fmt::Debug for PropagationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.rules.iter().map(|(slot, rule)| (slot, rule.name())))
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
