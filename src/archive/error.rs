//! Extraction errors.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use super::ArchiveFormat;

/// Errors produced while unpacking an archive.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported archive format: {format}")]
    UnsupportedFormat { format: ArchiveFormat },

    #[error("archive is corrupted: {reason}")]
    Corrupted { reason: String },

    #[error("zip-slip attack detected: entry '{entry}' escapes the destination")]
    ZipSlip { entry: PathBuf },

    #[error("extraction cancelled")]
    Cancelled,

    #[error("failed to extract '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
}

impl ExtractError {
    pub(crate) fn corrupted(reason: impl ToString) -> Self {
        Self::Corrupted {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}
