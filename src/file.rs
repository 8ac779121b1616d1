//! File handles and the file-selection capability.
//!
//! The core never captures files itself. Something outside it (a CLI
//! argument list, a native dialog, a test fixture) implements
//! [`FileSource`] and hands over a [`Selection`]; the workflows only ever
//! see the resulting [`FileHandle`]s.

use crate::error::ConvmergeError;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Where a handle's bytes come from.
#[derive(Clone)]
enum Blob {
    /// Already in memory.
    Memory(Arc<[u8]>),
    /// On disk; read when a request is built.
    Path(PathBuf),
}

/// Opaque reference to a user-selected binary blob.
#[derive(Clone)]
pub struct FileHandle {
    name: String,
    size: u64,
    media_type: String,
    blob: Blob,
}

impl FileHandle {
    /// Wrap an in-memory buffer. `media_type` may be empty when unknown.
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            media_type: media_type.into(),
            blob: Blob::Memory(Arc::from(bytes)),
        }
    }

    /// Reference a file on disk, validating that it exists and is readable.
    ///
    /// The media type is guessed from the extension; the contents are not
    /// read until a request is built.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvmergeError> {
        let path = path.as_ref().to_path_buf();

        let meta = match std::fs::metadata(&path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(ConvmergeError::FileNotFound { path }),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(ConvmergeError::PermissionDenied { path });
            }
            Err(_) => return Err(ConvmergeError::FileNotFound { path }),
        };

        if let Err(e) = std::fs::File::open(&path) {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                return Err(ConvmergeError::PermissionDenied { path });
            }
            return Err(ConvmergeError::FileNotFound { path });
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let media_type = mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or_default()
            .to_string();

        debug!("Resolved local file: {} ({})", path.display(), media_type);
        Ok(Self {
            name,
            size: meta.len(),
            media_type,
            blob: Blob::Path(path),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// MIME type; empty when unknown.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Path on disk, for handles created with [`FileHandle::from_path`].
    pub fn path(&self) -> Option<&Path> {
        match &self.blob {
            Blob::Path(p) => Some(p),
            Blob::Memory(_) => None,
        }
    }

    /// Contents of an in-memory handle.
    pub(crate) fn memory_bytes(&self) -> Option<&[u8]> {
        match &self.blob {
            Blob::Memory(bytes) => Some(bytes),
            Blob::Path(_) => None,
        }
    }

    /// Load the full contents.
    ///
    /// A path-backed file that vanished or became unreadable since it was
    /// selected yields [`ConvmergeError::ReadFailed`].
    pub async fn read(&self) -> Result<Vec<u8>, ConvmergeError> {
        match &self.blob {
            Blob::Memory(bytes) => Ok(bytes.to_vec()),
            Blob::Path(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| ConvmergeError::ReadFailed {
                        path: path.clone(),
                        source,
                    })
            }
        }
    }

    /// A serialisable summary for status output.
    pub fn summary(&self) -> FileSummary {
        FileSummary {
            name: self.name.clone(),
            size: self.size,
            media_type: self.media_type.clone(),
        }
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("media_type", &self.media_type)
            .field("path", &self.path())
            .finish()
    }
}

/// Name, size and type of a staged file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub name: String,
    pub size: u64,
    pub media_type: String,
}

// ── Selection capability ─────────────────────────────────────────────────

/// Which files a workflow takes, and how many at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    /// Any `image/*` file, single selection.
    Images,
    /// `application/pdf` or a `.pdf` name, multiple selection.
    Pdfs,
}

impl Accept {
    pub fn multiple(&self) -> bool {
        matches!(self, Accept::Pdfs)
    }

    /// Whether `file` passes this filter.
    pub fn accepts(&self, file: &FileHandle) -> bool {
        match self {
            Accept::Images => file.media_type().starts_with("image/"),
            Accept::Pdfs => {
                file.media_type() == "application/pdf"
                    || file.name().to_ascii_lowercase().ends_with(".pdf")
            }
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Accept::Images => "not an image",
            Accept::Pdfs => "not a PDF",
        }
    }

    /// Split `candidates` into accepted files and rejections.
    ///
    /// In single-selection mode only the first accepted file is kept.
    pub fn filter(&self, candidates: Vec<FileHandle>) -> Selection {
        let mut selection = Selection::default();
        for file in candidates {
            if !self.accepts(&file) {
                selection.rejected.push(ConvmergeError::Rejected {
                    name: file.name().to_string(),
                    reason: self.describe().to_string(),
                });
            } else if self.multiple() || selection.accepted.is_empty() {
                selection.accepted.push(file);
            } else {
                selection.rejected.push(ConvmergeError::Rejected {
                    name: file.name().to_string(),
                    reason: "only one file can be selected".to_string(),
                });
            }
        }
        selection
    }
}

/// Result of one selection gesture.
#[derive(Debug, Default)]
pub struct Selection {
    /// Files to stage, in the order the source produced them.
    pub accepted: Vec<FileHandle>,
    pub rejected: Vec<ConvmergeError>,
}

/// Presentation state a file source declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    #[default]
    Idle,
    ActiveDrag,
    RejectedDrag,
    Disabled,
}

/// Pluggable file-selection capability (drag-and-drop, browse dialog,
/// command-line paths, test fixtures…).
pub trait FileSource {
    /// Produce the files the user picked, filtered by `accept`.
    fn select(&mut self, accept: Accept) -> Selection;

    /// Current presentation state.
    fn state(&self) -> SourceState {
        SourceState::Idle
    }
}

/// A [`FileSource`] over a fixed list of paths, as given on a command line.
#[derive(Debug, Default)]
pub struct PathSource {
    paths: Vec<PathBuf>,
    state: SourceState,
}

impl PathSource {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            state: SourceState::Idle,
        }
    }
}

impl FileSource for PathSource {
    fn select(&mut self, accept: Accept) -> Selection {
        let mut unreadable = Vec::new();
        let mut candidates = Vec::new();
        for path in self.paths.drain(..) {
            match FileHandle::from_path(&path) {
                Ok(handle) => candidates.push(handle),
                Err(e) => unreadable.push(e),
            }
        }

        let mut selection = accept.filter(candidates);
        selection.rejected.extend(unreadable);
        self.state = if selection.rejected.is_empty() {
            SourceState::Idle
        } else {
            SourceState::RejectedDrag
        };
        selection
    }

    fn state(&self) -> SourceState {
        self.state
    }
}

/// Human-readable byte count: `"512 B"`, `"1.5 KB"`, `"3.2 MB"`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
