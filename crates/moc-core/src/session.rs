//! # Session Module
//!
//! A `WorkflowSession` owns one request snapshot and the collaborators the
//! engine needs. It is the only place where a transition's snapshot replaces
//! the previous one.
//!
//! The event log is volatile, session-local state:
//! - Never serialized with the request document
//! - Bounded by `MAX_EVENT_LOG` (oldest events are dropped)
//! - Cleared on demand

use crate::directory::PersonDirectory;
use crate::primitives::MAX_EVENT_LOG;
use crate::request::{Request, RequestIntake, SideAction};
use crate::system::TaskSlot;
use crate::task::{AttachmentRef, Discipline, TaskPayload};
use crate::workflow::{Transition, WorkflowEngine, WorkflowEvent};
use crate::{ApprovalStatus, MocError, RequestId};
use std::collections::VecDeque;
use std::sync::Arc;

// =============================================================================
// PROGRESS SINK
// =============================================================================

/// Receiver of progress notifications.
///
/// Fire-and-forget: sinks cannot fail or veto a transition.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, request: &RequestId, event: &WorkflowEvent);
}

// =============================================================================
// SESSION
// =============================================================================

/// One request plus its engine, directory and listeners.
pub struct WorkflowSession {
    request: Request,
    engine: Arc<WorkflowEngine>,
    directory: Arc<dyn PersonDirectory>,
    sinks: Vec<Arc<dyn ProgressSink>>,
    log: VecDeque<WorkflowEvent>,
}

impl WorkflowSession {
    /// Wrap an existing request (e.g. one loaded from a document).
    #[must_use]
    pub fn new(
        request: Request,
        engine: Arc<WorkflowEngine>,
        directory: Arc<dyn PersonDirectory>,
    ) -> Self {
        Self {
            request,
            engine,
            directory,
            sinks: Vec::new(),
            log: VecDeque::new(),
        }
    }

    /// Open a new request from intake data.
    pub fn open(
        id: RequestId,
        intake: RequestIntake,
        catalog: &[Discipline],
        engine: Arc<WorkflowEngine>,
        directory: Arc<dyn PersonDirectory>,
    ) -> Result<Self, MocError> {
        let request = Request::open(id, intake, catalog)?;
        Ok(Self::new(request, engine, directory))
    }

    /// Register a progress listener.
    pub fn add_sink(&mut self, sink: Arc<dyn ProgressSink>) {
        self.sinks.push(sink);
    }

    /// Current snapshot.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Consume the session, keeping the snapshot.
    #[must_use]
    pub fn into_request(self) -> Request {
        self.request
    }

    /// Logged events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &WorkflowEvent> {
        self.log.iter()
    }

    /// Number of logged events.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.log.len()
    }

    /// Drop all logged events.
    pub fn clear_events(&mut self) {
        self.log.clear();
    }

    /// Install a transition's snapshot, then log and dispatch its events.
    fn apply(&mut self, transition: Transition) -> Vec<WorkflowEvent> {
        let (request, events) = transition.into_parts();
        self.request = request;

        for event in &events {
            for sink in &self.sinks {
                sink.notify(&self.request.id, event);
            }
            if self.log.len() >= MAX_EVENT_LOG {
                self.log.pop_front();
            }
            self.log.push_back(event.clone());
        }

        events
    }

    /// See [`WorkflowEngine::complete_task`].
    pub fn complete_task(
        &mut self,
        slot: TaskSlot,
        payload: TaskPayload,
    ) -> Result<Vec<WorkflowEvent>, MocError> {
        let transition =
            self.engine
                .complete_task(&self.request, slot, payload, self.directory.as_ref())?;
        Ok(self.apply(transition))
    }

    /// See [`WorkflowEngine::reject_task`].
    pub fn reject_task(
        &mut self,
        slot: TaskSlot,
        remark: &str,
    ) -> Result<Vec<WorkflowEvent>, MocError> {
        let transition = self.engine.reject_task(&self.request, slot, remark)?;
        Ok(self.apply(transition))
    }

    /// See [`WorkflowEngine::reopen_task`].
    pub fn reopen_task(&mut self, slot: TaskSlot) -> Result<Vec<WorkflowEvent>, MocError> {
        let transition = self.engine.reopen_task(&self.request, slot)?;
        Ok(self.apply(transition))
    }

    /// See [`WorkflowEngine::update_approval_row`].
    pub fn update_approval_row(
        &mut self,
        row_id: &str,
        status: Option<ApprovalStatus>,
        remark: &str,
    ) -> Result<Vec<WorkflowEvent>, MocError> {
        let transition = self
            .engine
            .update_approval_row(&self.request, row_id, status, remark)?;
        Ok(self.apply(transition))
    }

    /// See [`WorkflowEngine::annotate_task`].
    pub fn annotate_task(
        &mut self,
        slot: TaskSlot,
        comment: &str,
        attachments: &[AttachmentRef],
    ) -> Result<Vec<WorkflowEvent>, MocError> {
        let transition = self
            .engine
            .annotate_task(&self.request, slot, comment, attachments)?;
        Ok(self.apply(transition))
    }

    /// See [`WorkflowEngine::apply_side_action`].
    pub fn apply_side_action(
        &mut self,
        action: &SideAction,
    ) -> Result<Vec<WorkflowEvent>, MocError> {
        let transition = self.engine.apply_side_action(&self.request, action)?;
        Ok(self.apply(transition))
    }

    /// See [`WorkflowEngine::cancel_request`].
    pub fn cancel_request(&mut self, reason: &str) -> Result<Vec<WorkflowEvent>, MocError> {
        let transition = self.engine.cancel_request(&self.request, reason)?;
        Ok(self.apply(transition))
    }
}

impl std::fmt::Debug for WorkflowSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowSession")
            .field("request", &self.request.id)
            .field("status", &self.request.status)
            .field("engine", &self.engine)
            .field("sinks", &self.sinks.len())
            .field("events", &self.log.len())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::risk::RiskInput;
    use crate::system::StageKind;
    use crate::{ChangeLength, PersonId, Priority, RequestStatus, TaskStatus};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(RequestId, &'static str)>>,
    }

    impl ProgressSink for Recorder {
        fn notify(&self, request: &RequestId, event: &WorkflowEvent) {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push((request.clone(), event.name()));
            }
        }
    }

    fn session() -> WorkflowSession {
        let intake = RequestIntake {
            title: "Raise alarm setpoint on LT-12".to_string(),
            area: "Tank Farm".to_string(),
            unit: "Storage".to_string(),
            change_type: "Instrumentation".to_string(),
            change_length: ChangeLength::Permanent,
            end_date: None,
            priority: Priority::Normal,
            justification: "Nuisance alarms".to_string(),
            emergency_justification: None,
            initiator: PersonId::new("p1"),
            risk_before: RiskInput::new(2, 2),
            risk_after: RiskInput::new(1, 2),
        };
        WorkflowSession::open(
            RequestId::new("MOC-200"),
            intake,
            &[],
            Arc::new(WorkflowEngine::default()),
            Arc::new(InMemoryDirectory::new()),
        )
        .expect("open")
    }

    #[test]
    fn transitions_replace_snapshot_and_notify() {
        let recorder = Arc::new(Recorder::default());
        let mut session = session();
        session.add_sink(recorder.clone());

        let events = session
            .complete_task(TaskSlot::new(StageKind::Initiation, 0), TaskPayload::None)
            .expect("complete");

        assert_eq!(events.len(), 2);
        assert_eq!(session.event_count(), 2);
        assert_eq!(
            session
                .request()
                .task(TaskSlot::new(StageKind::Initiation, 1))
                .map(|t| t.status),
            Some(TaskStatus::InProgress)
        );

        let seen = recorder.seen.lock().expect("lock");
        assert_eq!(
            seen.iter().map(|(_, name)| *name).collect::<Vec<_>>(),
            vec!["task-completed", "task-activated"]
        );
        assert!(seen.iter().all(|(id, _)| id.as_str() == "MOC-200"));
    }

    #[test]
    fn failed_transition_changes_nothing() {
        let mut session = session();
        let before = session.request().clone();

        let result = session.complete_task(TaskSlot::new(StageKind::Review, 0), TaskPayload::None);

        assert!(result.is_err());
        assert_eq!(session.request(), &before);
        assert_eq!(session.event_count(), 0);
    }

    #[test]
    fn cancel_then_everything_fails() {
        let mut session = session();
        session.cancel_request("Duplicate of MOC-150").expect("cancel");

        assert_eq!(session.request().status(), RequestStatus::Cancelled);
        assert!(
            session
                .complete_task(TaskSlot::new(StageKind::Initiation, 0), TaskPayload::None)
                .is_err()
        );
        assert!(session.cancel_request("again").is_err());
    }

    #[test]
    fn log_can_be_cleared() {
        let mut session = session();
        session
            .annotate_task(TaskSlot::new(StageKind::Initiation, 0), "note", &[])
            .expect("annotate");
        assert_eq!(session.events().count(), 1);
        session.clear_events();
        assert_eq!(session.event_count(), 0);
    }
}
