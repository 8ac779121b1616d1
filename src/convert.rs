//! One-shot entry points.
//!
//! For callers that just want "convert this file" or "merge these files"
//! without holding a [`Session`]: each function builds a session, stages
//! the given paths, submits once and returns the outcome.

use crate::config::{ClientConfig, ImageOptions};
use crate::error::ConvmergeError;
use crate::file::PathSource;
use crate::session::Session;
use crate::transport::HealthStatus;
use crate::workflow::{SubmitOutcome, Workflow};
use std::path::PathBuf;
use tracing::info;

/// Convert a local image with the given options, saving the result into
/// `config.output_dir`.
///
/// # Errors
/// Returns `Err` only when nothing was sent: the file is missing or not an
/// image. Service and network failures come back as
/// [`SubmitOutcome::Failed`].
///
/// # Example
/// ```rust,no_run
/// use convmerge::{convert_image, ClientConfig, ImageOptions, OutputFormat};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ClientConfig::builder().output_dir("out").build()?;
///     let outcome =
///         convert_image("photo.png", ImageOptions::new(OutputFormat::Webp, 75), &config).await?;
///     println!("{outcome:?}");
///     Ok(())
/// }
/// ```
pub async fn convert_image(
    path: impl Into<PathBuf>,
    options: ImageOptions,
    config: &ClientConfig,
) -> Result<SubmitOutcome, ConvmergeError> {
    let session = Session::new(config)?;
    let workflow = session.image();
    stage_paths(workflow, vec![path.into()])?;

    workflow.set_output_format(options.format)?;
    if options.format.is_lossy() {
        workflow.set_quality(options.quality.get())?;
    }

    info!("Converting {} to {}", workflow.base_name(), options.format);
    workflow.submit().await
}

/// Merge local PDFs in the given order into `config.output_dir/merged.pdf`.
///
/// # Errors
/// Returns `Err` when a path is missing or not a PDF, or when fewer than two
/// PDFs were given. Service and network failures come back as
/// [`SubmitOutcome::Failed`].
pub async fn merge_pdfs<I, P>(paths: I, config: &ClientConfig) -> Result<SubmitOutcome, ConvmergeError>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let session = Session::new(config)?;
    let workflow = session.pdf();
    stage_paths(workflow, paths.into_iter().map(Into::into).collect())?;

    info!("Merging {} PDFs", workflow.staged_count());
    workflow.submit().await
}

/// Check that the service at `config.base_url` is reachable.
pub async fn check_service(config: &ClientConfig) -> Result<HealthStatus, ConvmergeError> {
    Session::new(config)?.health().await
}

/// Stage `paths`, failing on the first file the workflow refuses.
fn stage_paths(workflow: &Workflow, paths: Vec<PathBuf>) -> Result<(), ConvmergeError> {
    let mut source = PathSource::new(paths);
    match workflow.stage_from(&mut source).into_iter().next() {
        Some(rejected) => Err(rejected),
        None => Ok(()),
    }
}
