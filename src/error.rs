use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the packaging, store and transport layers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid tag {tag:?}: {reason}")]
    InvalidTag { tag: String, reason: String },

    #[error("build failed: {0}")]
    Build(String),

    #[error("corrupt manifest: {0}")]
    CorruptManifest(String),

    #[error("manifest schema version {found} is newer than the newest supported version {supported}")]
    UnsupportedSchema { found: u64, supported: u64 },

    #[error("unsupported storage backend scheme {scheme:?}")]
    UnsupportedBackend { scheme: String },

    #[error("corrupt archive {}: {reason}", .path.display())]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("{kind} {tag:?} not found")]
    NotFound { kind: &'static str, tag: String },

    #[error("invalid destination {path:?}: {reason}")]
    InvalidDestination { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("manifest serialization: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_tag(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidTag {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(kind: &'static str, tag: impl ToString) -> Self {
        Error::NotFound {
            kind,
            tag: tag.to_string(),
        }
    }

    pub(crate) fn corrupt_archive(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::CorruptArchive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_destination(path: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidDestination {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// True for missing-tag/model errors, the only class a caller may
    /// reasonably recover from by supplying the item.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
