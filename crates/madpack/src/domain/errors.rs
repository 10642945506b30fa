//! Error taxonomy of the resolution and export pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::file::{ModelFile, ModelFileLocation};

/// Neither the repository nor the archive/resource source yielded the
/// requested file. Fatal to the resolving operation; never retried.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(
        "model file '{name}' ({location}) was found neither in the repository nor in the archive"
    )]
    NotFound {
        name: String,
        location: ModelFileLocation,
    },
    #[error("failed to extract '{name}' to '{target}'")]
    Extraction {
        name: String,
        target: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open '{path}'")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ResolveError {
    pub(crate) fn not_found(file: &ModelFile) -> Self {
        ResolveError::NotFound {
            name: file.name.clone(),
            location: file.location,
        }
    }
}

/// Loading or saving a model definition document failed.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o error while persisting model definition")]
    Io(#[from] io::Error),
    #[error("xml document error")]
    Xml(#[from] quick_xml::de::DeError),
    #[error("json document error")]
    Json(#[from] serde_json::Error),
    #[error("unsupported document version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("invalid model definition document: {reason}")]
    InvalidDocument { reason: String },
}

/// Errors raised by repository maintenance checks.
#[derive(Debug, Error)]
pub enum MaintenanceError {
    /// A model references a file that has no on-disk source below the
    /// scanned root. Reporting unused files would be unreliable, so the scan
    /// is aborted instead.
    #[error("file '{name}' of model '{model}' has no local source below the scanned root")]
    NotLocal { model: String, name: String },
    #[error("failed to scan '{path}'")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors surfaced by the tailoring and export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Tailoring produced zero optics, sequences or ranges. Raised before any
    /// I/O side effects happen.
    #[error("no {collection} selected for export; an export must produce a usable model")]
    EmptyExport { collection: &'static str },
    /// No registered persister recognizes the destination's extension.
    #[error("no persistence format recognizes the file name '{name}'")]
    PersistenceFormat { name: String },
    /// An I/O failure mid-archive or mid-copy. Already-written bytes are not
    /// rolled back; the artifact must be treated as unreliable.
    #[error("write failed at '{path}'; the partially written artifact should be discarded")]
    PartialWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}
