//! Progress-callback trait for submission events.
//!
//! Inject an [`Arc<dyn SubmissionProgressCallback>`] via
//! [`crate::workflow::Workflow::with_progress`] (or
//! [`crate::session::Session::with_progress`]) to hear when a submission
//! starts and how it ended. The CLI uses it to drive a spinner.
//!
//! # Example
//!
//! ```rust
//! use convmerge::{StatusReport, SubmissionProgressCallback, WorkflowKind};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingCallback {
//!     finished: AtomicUsize,
//! }
//!
//! impl SubmissionProgressCallback for CountingCallback {
//!     fn on_submit_complete(&self, _kind: WorkflowKind, report: &StatusReport) {
//!         self.finished.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}", report.line());
//!     }
//! }
//! ```

use crate::status::StatusReport;
use crate::workflow::WorkflowKind;
use std::sync::Arc;

/// Called by a workflow around each accepted submission.
///
/// Both workflows of a session may have submissions in flight at once, so
/// implementations must be `Send + Sync`. All methods default to no-ops.
pub trait SubmissionProgressCallback: Send + Sync {
    /// Called after a submission is accepted, before the request is sent.
    ///
    /// # Arguments
    /// * `kind`       — which workflow is submitting
    /// * `file_count` — number of files attached to the request
    fn on_submit_start(&self, kind: WorkflowKind, file_count: usize) {
        let _ = (kind, file_count);
    }

    /// Called once the submission has settled, successfully or not.
    fn on_submit_complete(&self, kind: WorkflowKind, report: &StatusReport) {
        let _ = (kind, report);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SubmissionProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback type.
pub type ProgressCallback = Arc<dyn SubmissionProgressCallback>;
