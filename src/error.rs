//! Error types for the convmerge library.
//!
//! A single enum covers every failure, but the variants fall into two
//! groups that are handled very differently by [`crate::workflow::Workflow`]:
//!
//! * **Synchronous** — the request never leaves the client
//!   ([`ConvmergeError::Precondition`], file-source errors, config errors).
//!   These are returned as `Err` straight to the caller.
//!
//! * **Recovered** — the submission was accepted and then failed
//!   ([`ConvmergeError::Service`], [`ConvmergeError::Transport`],
//!   [`ConvmergeError::ReadFailed`], [`ConvmergeError::SaveFailed`]). These
//!   never escape a submission: they
//!   are rendered into the workflow's status message and the workflow settles
//!   in the `Failed` phase. See [`ConvmergeError::is_recoverable`].

use crate::workflow::WorkflowKind;
use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the convmerge library.
#[derive(Debug, Error)]
pub enum ConvmergeError {
    // ── Submission errors ─────────────────────────────────────────────────
    /// Submission attempted without enough staged files.
    #[error("{}", precondition_message(.workflow, .required))]
    Precondition {
        workflow: WorkflowKind,
        required: usize,
        staged: usize,
    },

    /// The service answered with a non-success status.
    ///
    /// `message` is the response body text, shown to the user verbatim.
    #[error("{message}")]
    Service { status: u16, message: String },

    /// The request could not complete (connection refused, reset, DNS…).
    #[error("{0}")]
    Transport(String),

    /// A staged file could not be read while building the request.
    #[error("Could not read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact arrived but could not be written to its destination.
    #[error("Failed to save '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── File-source errors ────────────────────────────────────────────────
    /// Selected file does not exist.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file did not match the workflow's accepted media types.
    #[error("Rejected '{name}': {reason}")]
    Rejected { name: String, reason: String },

    // ── Option errors ─────────────────────────────────────────────────────
    /// Quality was edited while a lossless output format is selected.
    #[error("Quality has no effect for {format} output")]
    QualityInert { format: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvmergeError {
    /// Build a [`ConvmergeError::Service`] from a raw response body.
    ///
    /// The body text is kept verbatim. Only a body with nothing but
    /// whitespace falls back to the status line.
    pub fn from_service_body(status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body).into_owned();
        let message = if text.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            text
        };
        ConvmergeError::Service { status, message }
    }

    /// The `detail` string of a service error body, when it has one.
    pub fn detail(&self) -> Option<String> {
        match self {
            ConvmergeError::Service { message, .. } => service_detail(message),
            _ => None,
        }
    }

    /// Whether a submission recovers this error into its status message
    /// rather than returning it to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConvmergeError::Service { .. }
                | ConvmergeError::Transport(_)
                | ConvmergeError::ReadFailed { .. }
                | ConvmergeError::SaveFailed { .. }
        )
    }
}

impl From<reqwest::Error> for ConvmergeError {
    fn from(e: reqwest::Error) -> Self {
        ConvmergeError::Transport(e.to_string())
    }
}

/// Extract `detail` from the service's `{"detail": "..."}` error envelope.
///
/// Returns `None` for plain-text bodies and JSON without a string `detail`.
pub fn service_detail(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("detail")?
        .as_str()
        .map(str::to_string)
}

fn precondition_message(workflow: &WorkflowKind, required: &usize) -> String {
    match workflow {
        WorkflowKind::ImageConversion => "Pick an image first.".to_string(),
        WorkflowKind::PdfMerge => format!("Pick at least {required} PDFs."),
    }
}
