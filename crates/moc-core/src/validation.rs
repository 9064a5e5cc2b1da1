//! # Validation Engine
//!
//! Pre-completion gating rules, pluggable per task slot.
//!
//! Rules are pure functions of the payload that is about to be stored. The
//! workflow engine invokes them before any mutation, so a failing rule can
//! never leave a request half-updated. Slots without a registered rule pass
//! trivially.

use crate::system::{ASSIGN_REVIEW_TEAM, TaskSlot};
use crate::task::{DisciplineAssignment, TaskPayload};
use crate::MocError;
use std::collections::BTreeMap;

/// Reason reported when no discipline has a reviewer.
pub const NO_DISCIPLINE_ASSIGNED: &str = "no discipline assigned";

/// Reason reported when submitted approval rows differ from the propagated set.
pub const APPROVAL_ROWS_MISMATCH: &str = "approval rows do not match review team";

// =============================================================================
// RULE TRAIT
// =============================================================================

/// A gating rule attached to one task slot.
///
/// Implementations must be pure: the same payload always yields the same
/// verdict.
pub trait ValidationRule: Send + Sync {
    /// Short rule name for diagnostics.
    fn name(&self) -> &'static str;

    /// Return `MocError::ValidationFailed` if the payload may not complete.
    fn validate(&self, payload: &TaskPayload) -> Result<(), MocError>;
}

/// True iff at least one discipline is applicable and has a reviewer.
#[must_use]
pub fn validate_assigned_disciplines(disciplines: &[DisciplineAssignment]) -> bool {
    disciplines.iter().any(DisciplineAssignment::is_reviewable)
}

fn fail(reason: &str) -> Result<(), MocError> {
    Err(MocError::ValidationFailed(reason.to_string()))
}

// =============================================================================
// BUILT-IN RULES
// =============================================================================

/// Review team assignment needs at least one reviewable discipline.
pub struct AssignedDisciplinesRule;

impl ValidationRule for AssignedDisciplinesRule {
    fn name(&self) -> &'static str {
        "assigned-disciplines"
    }

    fn validate(&self, payload: &TaskPayload) -> Result<(), MocError> {
        match payload {
            TaskPayload::DisciplineAssignments(disciplines)
                if validate_assigned_disciplines(disciplines) =>
            {
                Ok(())
            }
            _ => fail(NO_DISCIPLINE_ASSIGNED),
        }
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Registry of validation rules keyed by task slot.
#[derive(Default)]
pub struct ValidationEngine {
    rules: BTreeMap<TaskSlot, Box<dyn ValidationRule>>,
}

impl ValidationEngine {
    /// Create an engine with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with the standard MOC rule registered.
    ///
    /// Only review team assignment is gated; every other slot passes.
    #[must_use]
    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        engine.register(ASSIGN_REVIEW_TEAM, AssignedDisciplinesRule);
        engine
    }

    /// Register (or replace) the rule for a slot.
    pub fn register(&mut self, slot: TaskSlot, rule: impl ValidationRule + 'static) {
        self.rules.insert(slot, Box::new(rule));
    }

    /// Name of the rule registered for a slot.
    #[must_use]
    pub fn rule_name(&self, slot: TaskSlot) -> Option<&'static str> {
        self.rules.get(&slot).map(|r| r.name())
    }

    /// Run the slot's rule, if any.
    pub fn validate(&self, slot: TaskSlot, payload: &TaskPayload) -> Result<(), MocError> {
        match self.rules.get(&slot) {
            Some(rule) => rule.validate(payload),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.rules.iter().map(|(slot, rule)| (slot, rule.name())))
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
