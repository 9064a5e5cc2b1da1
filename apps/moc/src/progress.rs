//! # Progress Logging
//!
//! Forwards workflow events to `tracing`. Diagnostics such as unresolved
//! person references are logged at `warn`, everything else at `info`.

use moc_core::{ProgressSink, RequestId, WorkflowEvent};

/// A [`ProgressSink`] that writes each event as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn notify(&self, request: &RequestId, event: &WorkflowEvent) {
        if event.is_warning() {
            tracing::warn!(
                request = %request,
                event = event.name(),
                "{}",
                describe(event)
            );
        } else {
            tracing::info!(
                request = %request,
                event = event.name(),
                "{}",
                describe(event)
            );
        }
    }
}

/// One-line human description of an event.
#[must_use]
pub fn describe(event: &WorkflowEvent) -> String {
    match event {
        WorkflowEvent::TaskCompleted {
            stage, task_index, ..
        } => format!("{}/{} completed", stage, task_index),
        WorkflowEvent::TaskActivated {
            stage, task_index, ..
        } => format!("{}/{} in progress", stage, task_index),
        WorkflowEvent::TaskRejected {
            stage,
            task_index,
            remark,
            ..
        } => format!("{}/{} rejected: {}", stage, task_index, remark),
        WorkflowEvent::TaskReopened {
            stage, task_index, ..
        } => format!("{}/{} reopened", stage, task_index),
        WorkflowEvent::TaskAnnotated {
            stage,
            task_index,
            attachments,
        } => format!(
            "{}/{} annotated ({} attachments)",
            stage, task_index, attachments
        ),
        WorkflowEvent::StageCompleted { stage } => format!("{} stage completed", stage),
        WorkflowEvent::RequestClosed => "request closed".to_string(),
        WorkflowEvent::RequestCancelled { reason } => format!("request cancelled: {}", reason),
        WorkflowEvent::PayloadPropagated {
            stage,
            task_index,
            kind,
            entries,
        } => format!(
            "{}/{} received {} ({} entries)",
            stage, task_index, kind, entries
        ),
        WorkflowEvent::ApprovalRecorded { row_id, status } => format!(
            "approval row {} set to {}",
            row_id,
            status.map(|s| s.name()).unwrap_or("undecided")
        ),
        WorkflowEvent::UnresolvedPersonReference { discipline, person } => format!(
            "person {} assigned to discipline {} is not in the directory",
            person, discipline
        ),
        WorkflowEvent::SideActionRecorded { action } => format!("side action: {}", action),
    }
}
