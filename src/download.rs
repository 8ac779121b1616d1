//! Artifact delivery: turning a successful reply into a saved file.
//!
//! [`Downloader`] first writes the payload to a hidden temporary file in the
//! output directory (the transient reference), then saves it under the
//! derived filename. The temporary file is released a grace period after the
//! save was attempted, whether or not the save worked, on a spawned task so
//! the caller does not wait for it. If the delivery future is dropped before
//! it gets that far, the reference is released on the spot.

use crate::config::ClientConfig;
use crate::error::ConvmergeError;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info};

/// Where a delivered artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub filename: String,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Receives artifacts from successful submissions.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn deliver(&self, payload: Vec<u8>, filename: &str) -> Result<Delivery, ConvmergeError>;
}

/// Temporary on-disk copy of a payload, deleted when released.
struct TransientRef {
    path: Option<TempPath>,
}

impl TransientRef {
    /// Create the temporary file off the runtime, then fill it with async I/O.
    async fn create(dir: &Path, payload: &[u8]) -> std::io::Result<Self> {
        let dir = dir.to_path_buf();
        let path = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(".convmerge-")
                .suffix(".part")
                .tempfile_in(dir)
                .map(NamedTempFile::into_temp_path)
        })
        .await
        .map_err(std::io::Error::other)??;

        // On error `path` is dropped here, deleting the empty file.
        tokio::fs::write(&path, payload).await?;
        Ok(Self { path: Some(path) })
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Release the reference once `grace` has elapsed.
    fn release_after(mut self, grace: Duration) {
        if let Some(path) = self.path.take() {
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                debug!("Releasing transient download {}", path.display());
                drop(path);
            });
        }
    }
}

impl Drop for TransientRef {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            debug!("Releasing transient download {} early", path.display());
        }
    }
}

/// Saves artifacts into a local directory.
#[derive(Debug, Clone)]
pub struct Downloader {
    output_dir: PathBuf,
    grace: Duration,
}

impl Downloader {
    pub fn new(output_dir: impl Into<PathBuf>, grace: Duration) -> Self {
        Self {
            output_dir: output_dir.into(),
            grace,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.output_dir.clone(),
            Duration::from_millis(config.release_grace_ms),
        )
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Reduce `filename` to a bare name so a save can never leave the output
/// directory.
fn safe_filename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("download")
        .to_string()
}

#[async_trait]
impl ArtifactSink for Downloader {
    async fn deliver(&self, payload: Vec<u8>, filename: &str) -> Result<Delivery, ConvmergeError> {
        let filename = safe_filename(filename);
        let dest = self.output_dir.join(&filename);

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| ConvmergeError::SaveFailed {
                path: self.output_dir.clone(),
                source,
            })?;

        let transient = TransientRef::create(&self.output_dir, &payload)
            .await
            .map_err(|source| ConvmergeError::SaveFailed {
                path: self.output_dir.clone(),
                source,
            })?;

        let saved = match transient.path() {
            Some(src) => tokio::fs::copy(src, &dest).await,
            None => tokio::fs::write(&dest, &payload)
                .await
                .map(|_| payload.len() as u64),
        };
        transient.release_after(self.grace);

        let bytes = saved.map_err(|source| ConvmergeError::SaveFailed {
            path: dest.clone(),
            source,
        })?;

        info!("Saved {} ({} bytes)", dest.display(), bytes);
        Ok(Delivery {
            filename,
            path: dest,
            bytes,
        })
    }
}
