//! Presentation-ready status for a workflow.
//!
//! [`StatusReporter`] is a pure projection of a workflow's phase and last
//! message; it holds no state of its own. [`StatusReport`] is the snapshot
//! handed to progress callbacks and printed by the CLI (`--json`).

use crate::file::FileSummary;
use crate::workflow::{Phase, WorkflowKind};
use serde::Serialize;

/// Renders a one-line status for a workflow.
pub struct StatusReporter;

impl StatusReporter {
    /// Busy label while a submission is in flight, otherwise the last
    /// outcome message (empty when there is none).
    pub fn render(kind: WorkflowKind, phase: Phase, last_message: &str) -> String {
        match phase {
            Phase::Submitting => kind.busy_label().to_string(),
            Phase::Idle | Phase::Succeeded | Phase::Failed => last_message.to_string(),
        }
    }
}

/// Snapshot of one workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub workflow: WorkflowKind,
    pub phase: Phase,
    /// Last outcome message; empty after any staging change.
    pub message: String,
    /// Staged files in submission order.
    pub files: Vec<FileSummary>,
}

impl StatusReport {
    /// The line a presentation layer should show.
    pub fn line(&self) -> String {
        StatusReporter::render(self.workflow, self.phase, &self.message)
    }
}
