//! File staging: the files a workflow will submit next.
//!
//! [`FileStagingStore`] owns the staged [`FileHandle`]s outright. For the
//! single-file (image) mode it also owns a [`PreviewHandle`], a temporary
//! copy of the staged image a presentation layer can display. The preview
//! is acquired when a file is staged and dropped, deleting the copy, when
//! the file is displaced, cleared, or the store itself goes away.

use crate::file::{Accept, FileHandle};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Base name used when nothing usable is staged.
pub const DEFAULT_BASE_NAME: &str = "output";

static RE_FINAL_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[^/.]+$").unwrap());

/// Strip the final extension segment from `name`.
///
/// `"photo.png"` → `"photo"`, `"archive.tar.gz"` → `"archive.tar"`. Falls
/// back to [`DEFAULT_BASE_NAME`] when nothing is left.
pub fn base_name(name: &str) -> String {
    let stripped = RE_FINAL_EXTENSION.replace(name, "");
    if stripped.is_empty() {
        DEFAULT_BASE_NAME.to_string()
    } else {
        stripped.into_owned()
    }
}

/// Transient display copy of a staged image.
///
/// Deleted from disk when dropped.
pub struct PreviewHandle {
    file: NamedTempFile,
    source_name: String,
}

impl PreviewHandle {
    /// Copy `handle` into a fresh temporary file.
    pub fn acquire(handle: &FileHandle) -> std::io::Result<Self> {
        let suffix = Path::new(handle.name())
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("convmerge-preview-")
            .suffix(&suffix)
            .tempfile()?;

        match (handle.path(), handle.memory_bytes()) {
            (Some(path), _) => {
                std::fs::copy(path, file.path())?;
            }
            (None, Some(bytes)) => {
                file.write_all(bytes)?;
                file.flush()?;
            }
            (None, None) => {}
        }

        debug!(
            "Acquired preview for '{}' at {}",
            handle.name(),
            file.path().display()
        );
        Ok(Self {
            file,
            source_name: handle.name().to_string(),
        })
    }

    /// Preview for what a store in `accept` mode would stage from `files`.
    ///
    /// `None` in multiple mode, for an empty selection, or when the copy
    /// could not be made (logged).
    pub fn for_selection(accept: Accept, files: &[FileHandle]) -> Option<Self> {
        if accept.multiple() {
            return None;
        }
        let first = files.first()?;
        match Self::acquire(first) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("Could not create preview for '{}': {}", first.name(), e);
                None
            }
        }
    }

    /// Location of the preview copy.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Name of the staged file this preview shows.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        debug!(
            "Releasing preview for '{}' at {}",
            self.source_name,
            self.file.path().display()
        );
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("path", &self.path())
            .field("source_name", &self.source_name)
            .finish()
    }
}

/// Ordered collection of staged files for one workflow.
#[derive(Debug)]
pub struct FileStagingStore {
    accept: Accept,
    files: Vec<FileHandle>,
    preview: Option<PreviewHandle>,
}

impl FileStagingStore {
    pub fn new(accept: Accept) -> Self {
        Self {
            accept,
            files: Vec::new(),
            preview: None,
        }
    }

    /// Replace the staged files.
    ///
    /// In single mode only the first element is kept (an empty input clears
    /// the store). In multiple mode the whole sequence replaces the current
    /// one, keeping the order it arrived in.
    pub fn stage(&mut self, files: Vec<FileHandle>) {
        let preview = PreviewHandle::for_selection(self.accept, &files);
        self.stage_with_preview(files, preview);
    }

    /// Like [`FileStagingStore::stage`], with the preview already acquired
    /// by [`PreviewHandle::for_selection`].
    ///
    /// Lets callers do the preview copy before taking whatever lock guards
    /// the store. The preview is ignored in multiple mode.
    pub fn stage_with_preview(&mut self, files: Vec<FileHandle>, preview: Option<PreviewHandle>) {
        if self.accept.multiple() {
            self.preview = None;
            self.files = files;
        } else {
            self.files = files.into_iter().take(1).collect();
            // Replacing drops the displaced preview.
            self.preview = preview.filter(|p| {
                self.files
                    .first()
                    .is_some_and(|f| f.name() == p.source_name())
            });
        }
        debug!("Staged {} file(s)", self.files.len());
    }

    /// Remove the file at `index`, shifting later files down by one.
    ///
    /// Only meaningful in multiple mode. Returns `None` without touching the
    /// store when `index` is out of bounds or the store is single-file.
    pub fn remove(&mut self, index: usize) -> Option<FileHandle> {
        if !self.accept.multiple() {
            warn!("Ignoring remove({}) on a single-file store", index);
            return None;
        }
        if index >= self.files.len() {
            warn!(
                "Ignoring remove({}) with only {} file(s) staged",
                index,
                self.files.len()
            );
            return None;
        }
        let removed = self.files.remove(index);
        debug!("Removed '{}' from position {}", removed.name(), index);
        Some(removed)
    }

    /// Drop every staged file and its preview.
    pub fn clear(&mut self) {
        self.preview = None;
        self.files.clear();
        debug!("Cleared staged files");
    }

    pub fn files(&self) -> &[FileHandle] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn accept(&self) -> Accept {
        self.accept
    }

    /// Name of the first staged file without its extension, or
    /// [`DEFAULT_BASE_NAME`] when nothing is staged.
    pub fn base_name(&self) -> String {
        self.files
            .first()
            .map(|f| base_name(f.name()))
            .unwrap_or_else(|| DEFAULT_BASE_NAME.to_string())
    }

    /// Preview of the staged image, if one could be created.
    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }
}
