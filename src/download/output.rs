//! Persisting a materialized body: as one file, or unpacked.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use bytes::Bytes;
use tracing::{debug, info};

use super::error::DownloadError;
use crate::archive::{DecompressOptions, ExtractedEntry, Extractor};

/// Writes `data` to `path`, creating missing parent directories first.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] naming the directory or file that could not
/// be created.
pub(crate) async fn write_file(path: &Path, data: &[u8]) -> Result<(), DownloadError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::io(parent, e))?;
    }

    tokio::fs::write(path, data)
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    info!(path = %path.display(), bytes = data.len(), "file written");
    Ok(())
}

/// Unpacks `data` on the blocking pool, into `destination` or into memory.
///
/// Blocking work outlives an aborted task, so the extractor also watches
/// `cancel` and stops before the next member once it is set.
///
/// # Errors
///
/// Returns [`DownloadError::Extraction`] for unsupported, corrupted, or
/// unsafe archives and for filesystem failures during extraction.
pub(crate) async fn extract_archive(
    data: Bytes,
    destination: Option<PathBuf>,
    options: DecompressOptions,
    name_hint: Option<String>,
    cancel: Arc<AtomicBool>,
) -> Result<Vec<ExtractedEntry>, DownloadError> {
    let task = tokio::task::spawn_blocking(move || {
        let mut extractor = Extractor::new(&options).cancel_on(&cancel);
        if let Some(hint) = name_hint.as_deref() {
            extractor = extractor.name_hint(hint);
        }
        extractor.extract(&data, destination.as_deref())
    });

    let entries = match task.await {
        Ok(result) => result?,
        Err(join_error) if join_error.is_panic() => {
            std::panic::resume_unwind(join_error.into_panic())
        }
        Err(_) => return Err(DownloadError::aborted("archive extraction")),
    };

    debug!(entries = entries.len(), "archive extracted");
    Ok(entries)
}
