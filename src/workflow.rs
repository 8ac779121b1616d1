//! Workflow controllers: staging, submission, and the phase machine.
//!
//! A [`Workflow`] is the single writer of its state. Every mutation goes
//! through one of its methods; presentation code only reads snapshots.
//!
//! ## Phase machine
//!
//! ```text
//!   Idle ──submit()──▶ Submitting ──▶ Succeeded ─┐
//!    ▲                      │                     │
//!    │                      └───────▶ Failed ─────┤
//!    └──────────── next staging change ───────────┘
//! ```
//!
//! At most one request per workflow is in flight: `submit()` while
//! `Submitting` returns [`SubmitOutcome::AlreadySubmitting`] and sends
//! nothing. Leaving `Submitting` is owned by a guard, so it happens exactly
//! once per submission even if the submitting future is dropped midway.
//!
//! Staging while a submission is in flight is allowed. It changes what the
//! *next* submission sends; the in-flight request keeps its own copy.

use crate::config::{ImageOptions, OutputFormat, Quality};
use crate::download::{ArtifactSink, Delivery};
use crate::error::ConvmergeError;
use crate::file::{Accept, FileHandle, FileSource};
use crate::progress::ProgressCallback;
use crate::staging::{FileStagingStore, PreviewHandle};
use crate::status::{StatusReport, StatusReporter};
use crate::transport::{build_image_request, build_merge_request, OutboundRequest, Transport};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Filename for every merged document.
pub const MERGED_FILENAME: &str = "merged.pdf";

/// The two independent workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Single image, converted to another format.
    ImageConversion,
    /// Two or more PDFs, merged in staged order.
    PdfMerge,
}

impl WorkflowKind {
    /// Service endpoint path.
    pub fn endpoint(&self) -> &'static str {
        match self {
            WorkflowKind::ImageConversion => "/convert-image",
            WorkflowKind::PdfMerge => "/merge-pdfs",
        }
    }

    /// Minimum staged files for a submission to be accepted.
    pub fn min_files(&self) -> usize {
        match self {
            WorkflowKind::ImageConversion => 1,
            WorkflowKind::PdfMerge => 2,
        }
    }

    /// Filter applied to incoming selections.
    pub fn accept(&self) -> Accept {
        match self {
            WorkflowKind::ImageConversion => Accept::Images,
            WorkflowKind::PdfMerge => Accept::Pdfs,
        }
    }

    /// Status shown while a submission is in flight.
    pub fn busy_label(&self) -> &'static str {
        match self {
            WorkflowKind::ImageConversion => "Converting…",
            WorkflowKind::PdfMerge => "Merging…",
        }
    }

    fn success_message(&self) -> &'static str {
        match self {
            WorkflowKind::ImageConversion => "Done. Download started.",
            WorkflowKind::PdfMerge => "Merged. Download started.",
        }
    }
}

/// Where a workflow is in its submission cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// How a call to [`Workflow::submit`] ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// A submission was already in flight; nothing was sent.
    AlreadySubmitting,
    /// The artifact was saved.
    Succeeded { message: String, delivery: Delivery },
    /// The service, the connection or the save failed.
    Failed { message: String },
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Succeeded { .. })
    }
}

struct State {
    staging: FileStagingStore,
    options: ImageOptions,
    phase: Phase,
    last_message: String,
}

impl State {
    /// Common tail of every staging mutation.
    fn staging_changed(&mut self) {
        self.last_message.clear();
        if self.phase != Phase::Submitting {
            self.phase = Phase::Idle;
        }
    }
}

/// Controller for one workflow.
pub struct Workflow {
    kind: WorkflowKind,
    state: Mutex<State>,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn ArtifactSink>,
    progress: Option<ProgressCallback>,
}

impl Workflow {
    /// Create an idle workflow with nothing staged.
    ///
    /// `options` only matter for [`WorkflowKind::ImageConversion`].
    pub fn new(
        kind: WorkflowKind,
        options: ImageOptions,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        Self {
            kind,
            state: Mutex::new(State {
                staging: FileStagingStore::new(kind.accept()),
                options,
                phase: Phase::Idle,
                last_message: String::new(),
            }),
            transport,
            sink,
            progress: None,
        }
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn kind(&self) -> WorkflowKind {
        self.kind
    }

    // ── Staging ──────────────────────────────────────────────────────────

    /// Replace the staged files with `files`.
    pub fn stage(&self, files: Vec<FileHandle>) {
        // The preview copy touches disk; make it before taking the lock.
        let preview = PreviewHandle::for_selection(self.kind.accept(), &files);
        let mut state = self.lock();
        state.staging.stage_with_preview(files, preview);
        state.staging_changed();
    }

    /// Pull a selection from `source` and stage what it accepted.
    ///
    /// A selection where everything was rejected leaves the current staging
    /// untouched. Rejections are returned for the caller to show.
    pub fn stage_from(&self, source: &mut dyn FileSource) -> Vec<ConvmergeError> {
        let selection = source.select(self.kind.accept());
        for rejected in &selection.rejected {
            warn!("{:?} selection: {}", self.kind, rejected);
        }
        if !selection.accepted.is_empty() || selection.rejected.is_empty() {
            self.stage(selection.accepted);
        }
        selection.rejected
    }

    /// Remove the staged file at `index` (merge workflow only).
    ///
    /// Out-of-range indices are ignored and leave the phase and message as
    /// they were.
    pub fn remove(&self, index: usize) -> Option<FileHandle> {
        let mut state = self.lock();
        let removed = state.staging.remove(index)?;
        state.staging_changed();
        Some(removed)
    }

    /// Unstage everything.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.staging.clear();
        state.staging_changed();
    }

    // ── Options ──────────────────────────────────────────────────────────

    pub fn options(&self) -> ImageOptions {
        self.lock().options
    }

    /// Select the output format (image workflow only).
    pub fn set_output_format(&self, format: OutputFormat) -> Result<(), ConvmergeError> {
        self.require_image_options()?;
        self.lock().options.format = format;
        debug!("Output format set to {}", format);
        Ok(())
    }

    /// Set the encoder quality (image workflow, lossy formats only).
    ///
    /// Fails with [`ConvmergeError::QualityInert`] while a lossless format
    /// is selected; the stored value is left alone.
    pub fn set_quality(&self, quality: u8) -> Result<(), ConvmergeError> {
        self.require_image_options()?;
        let mut state = self.lock();
        if !state.options.format.is_lossy() {
            return Err(ConvmergeError::QualityInert {
                format: state.options.format.to_string(),
            });
        }
        state.options.quality = Quality::new(quality);
        Ok(())
    }

    fn require_image_options(&self) -> Result<(), ConvmergeError> {
        match self.kind {
            WorkflowKind::ImageConversion => Ok(()),
            WorkflowKind::PdfMerge => Err(ConvmergeError::InvalidConfig(
                "the merge workflow has no output options".into(),
            )),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn last_message(&self) -> String {
        self.lock().last_message.clone()
    }

    /// One-line status for display.
    pub fn status_line(&self) -> String {
        let state = self.lock();
        StatusReporter::render(self.kind, state.phase, &state.last_message)
    }

    pub fn report(&self) -> StatusReport {
        Self::report_locked(self.kind, &self.lock())
    }

    fn report_locked(kind: WorkflowKind, state: &State) -> StatusReport {
        StatusReport {
            workflow: kind,
            phase: state.phase,
            message: state.last_message.clone(),
            files: state.staging.files().iter().map(FileHandle::summary).collect(),
        }
    }

    pub fn staged_count(&self) -> usize {
        self.lock().staging.len()
    }

    pub fn staged_names(&self) -> Vec<String> {
        self.lock()
            .staging
            .files()
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    /// Staged file name without extension, or `"output"`.
    pub fn base_name(&self) -> String {
        self.lock().staging.base_name()
    }

    /// Location of the staged image's preview copy.
    pub fn preview_path(&self) -> Option<PathBuf> {
        self.lock()
            .staging
            .preview()
            .map(|p| p.path().to_path_buf())
    }

    /// Filename the next successful submission will be saved as.
    pub fn artifact_name(&self) -> String {
        Self::artifact_name_locked(self.kind, &self.lock())
    }

    fn artifact_name_locked(kind: WorkflowKind, state: &State) -> String {
        match kind {
            WorkflowKind::ImageConversion => {
                state.options.artifact_name(&state.staging.base_name())
            }
            WorkflowKind::PdfMerge => MERGED_FILENAME.to_string(),
        }
    }

    /// Whether [`Workflow::submit`] would currently send a request.
    pub fn can_submit(&self) -> bool {
        let state = self.lock();
        state.phase != Phase::Submitting && state.staging.len() >= self.kind.min_files()
    }

    // ── Submission ───────────────────────────────────────────────────────

    /// Submit the staged files.
    ///
    /// # Returns
    /// * `Ok(AlreadySubmitting)` — a request is already in flight; no-op.
    /// * `Ok(Succeeded)` / `Ok(Failed)` — the submission ran to completion;
    ///   service, transport and save errors are recovered into `Failed`.
    ///
    /// # Errors
    /// [`ConvmergeError::Precondition`] when too few files are staged. No
    /// request is sent and the phase is unchanged.
    pub async fn submit(&self) -> Result<SubmitOutcome, ConvmergeError> {
        let (request, filename) = {
            let mut state = self.lock();
            if state.phase == Phase::Submitting {
                warn!("{:?} submission already in flight; ignoring", self.kind);
                return Ok(SubmitOutcome::AlreadySubmitting);
            }

            let staged = state.staging.len();
            let required = self.kind.min_files();
            if staged < required {
                return Err(ConvmergeError::Precondition {
                    workflow: self.kind,
                    required,
                    staged,
                });
            }

            state.phase = Phase::Submitting;
            state.last_message.clear();
            (
                self.build_request(&state),
                Self::artifact_name_locked(self.kind, &state),
            )
        };

        let guard = SubmissionGuard {
            workflow: self,
            settled: false,
        };

        let file_count = request.file_names().len();
        info!(
            "Submitting {} file(s) to {}",
            file_count,
            request.endpoint()
        );
        if let Some(ref cb) = self.progress {
            cb.on_submit_start(self.kind, file_count);
        }

        let result = self.execute(request, &filename).await;
        let (outcome, report) = guard.settle(result);

        if let Some(ref cb) = self.progress {
            cb.on_submit_complete(self.kind, &report);
        }
        Ok(outcome)
    }

    fn build_request(&self, state: &State) -> OutboundRequest {
        let files = state.staging.files();
        match self.kind {
            WorkflowKind::ImageConversion => build_image_request(&files[0], &state.options),
            WorkflowKind::PdfMerge => build_merge_request(files),
        }
    }

    async fn execute(
        &self,
        request: OutboundRequest,
        filename: &str,
    ) -> Result<Delivery, ConvmergeError> {
        let reply = self.transport.send(request).await?;
        if !reply.is_success() {
            return Err(ConvmergeError::from_service_body(reply.status, &reply.body));
        }
        self.sink.deliver(reply.body, filename).await
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Workflow")
            .field("kind", &self.kind)
            .field("phase", &state.phase)
            .field("staged", &state.staging.len())
            .field("options", &state.options)
            .finish()
    }
}

/// Owns the exit from `Submitting` for one submission.
///
/// [`SubmissionGuard::settle`] records the real outcome. If the guard is
/// dropped unsettled (the submitting future was cancelled or panicked) the
/// workflow is moved to `Failed` so it never stays busy.
struct SubmissionGuard<'a> {
    workflow: &'a Workflow,
    settled: bool,
}

impl SubmissionGuard<'_> {
    fn settle(mut self, result: Result<Delivery, ConvmergeError>) -> (SubmitOutcome, StatusReport) {
        self.settled = true;
        let kind = self.workflow.kind;
        let mut state = self.workflow.lock();

        let outcome = match result {
            Ok(delivery) => {
                let message = kind.success_message().to_string();
                info!("{:?} succeeded: {}", kind, delivery.path.display());
                state.phase = Phase::Succeeded;
                state.last_message = message.clone();
                SubmitOutcome::Succeeded { message, delivery }
            }
            Err(e) => {
                let message = e.to_string();
                warn!("{:?} failed: {}", kind, message);
                state.phase = Phase::Failed;
                state.last_message = message.clone();
                SubmitOutcome::Failed { message }
            }
        };
        let report = Workflow::report_locked(kind, &state);
        (outcome, report)
    }
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.workflow.lock();
        if state.phase == Phase::Submitting {
            warn!("{:?} submission interrupted", self.workflow.kind);
            state.phase = Phase::Failed;
            state.last_message = "Submission interrupted before completion.".to_string();
        }
    }
}
