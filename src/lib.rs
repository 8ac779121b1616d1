//! # convmerge
//!
//! Client for a file-conversion service: convert one image to another
//! format, or merge several PDFs into one document.
//!
//! ## Workflows
//!
//! The crate drives two independent workflows against the service. Each
//! one stages files, submits them as a multipart request, and saves the
//! returned artifact.
//!
//! ```text
//! files
//!  │
//!  ├─ 1. Select   filter by media type (images / PDFs)
//!  ├─ 2. Stage    ordered list, preview copy for the image
//!  ├─ 3. Submit   multipart POST /convert-image or /merge-pdfs
//!  ├─ 4. Settle   Succeeded / Failed, one request in flight at most
//!  └─ 5. Save     artifact written into the output directory
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use convmerge::{merge_pdfs, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("http://localhost:8000")
//!         .output_dir("out")
//!         .build()?;
//!     let outcome = merge_pdfs(["a.pdf", "b.pdf"], &config).await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```
//!
//! For interactive use, hold a [`Session`] and drive its workflows
//! directly: stage, reorder, resubmit, and read [`StatusReport`]s.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `convmerge` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! convmerge = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod download;
pub mod error;
pub mod file;
pub mod progress;
pub mod session;
pub mod staging;
pub mod status;
pub mod transport;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder, ImageOptions, OutputFormat, Quality};
pub use convert::{check_service, convert_image, merge_pdfs};
pub use download::{ArtifactSink, Delivery, Downloader};
pub use error::ConvmergeError;
pub use file::{format_bytes, Accept, FileHandle, FileSource, FileSummary, PathSource, Selection, SourceState};
pub use progress::{NoopProgressCallback, ProgressCallback, SubmissionProgressCallback};
pub use session::Session;
pub use status::{StatusReport, StatusReporter};
pub use transport::{HealthStatus, HttpTransport, Transport};
pub use workflow::{Phase, SubmitOutcome, Workflow, WorkflowKind};
