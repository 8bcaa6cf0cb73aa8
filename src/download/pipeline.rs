//! Runs one download from request to artifact.
//!
//! Stages run strictly in order: headers, body, then naming and archive
//! probing, then the write or extraction.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::watch;
use tracing::{debug, info, instrument};

use super::body::{ChunkSender, materialize};
use super::client::{HttpClient, ResponseMetadata};
use super::error::DownloadError;
use super::filename::{resolve_filename, validate_explicit_filename};
use super::handle::{Artifact, DownloadRequest};
use super::output::{extract_archive, write_file};
use crate::archive::detect_format;

/// Executes `request`, publishing response metadata and body chunks as they
/// become available. Extraction stops early once `cancel` is set.
#[instrument(skip_all, fields(url = %request.url))]
pub(crate) async fn run(
    request: DownloadRequest,
    chunks: Option<&ChunkSender>,
    metadata_tx: &watch::Sender<Option<ResponseMetadata>>,
    cancel: &Arc<AtomicBool>,
) -> Result<Artifact, DownloadError> {
    let DownloadRequest {
        url,
        output_dir,
        options,
    } = request;

    // Checked before any network traffic so a bad name fails fast.
    let explicit = match (&output_dir, options.filename.as_deref()) {
        (Some(_), Some(name)) => Some(validate_explicit_filename(name)?),
        _ => None,
    };

    let client = HttpClient::from_transport(&options.transport)?;
    let (metadata, body) = client.open_stream(&url).await?;
    metadata_tx.send_replace(Some(metadata.clone()));

    let data = materialize(
        body,
        options.transport.response_type,
        options.transport.encoding,
        chunks,
    )
    .await?;

    let archive = if options.extract {
        detect_format(&data)
    } else {
        None
    };
    debug!(
        bytes = data.len(),
        archive = archive.map(|format| format.extension()),
        "body ready"
    );

    match (output_dir, archive) {
        (None, None) => Ok(Artifact::Bytes(data)),
        (None, Some(_)) => {
            // Nothing is saved, but a bare compressed stream still needs a
            // member name.
            let hint = options
                .filename
                .clone()
                .unwrap_or_else(|| resolve_filename(&metadata, &data));
            let entries = extract_archive(
                data,
                None,
                options.decompress,
                Some(hint),
                Arc::clone(cancel),
            )
            .await?;
            info!(entries = entries.len(), "archive extracted in memory");
            Ok(Artifact::Extracted(entries))
        }
        (Some(dir), None) => {
            let relative =
                explicit.unwrap_or_else(|| PathBuf::from(resolve_filename(&metadata, &data)));
            let path = dir.join(relative);
            write_file(&path, &data).await?;
            Ok(Artifact::Bytes(data))
        }
        (Some(dir), Some(_)) => {
            let (destination, hint) = match explicit {
                Some(relative) => {
                    let target = dir.join(&relative);
                    let destination = target.parent().map_or_else(|| dir.clone(), Path::to_path_buf);
                    let hint = relative
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned());
                    (destination, hint)
                }
                None => (dir, Some(resolve_filename(&metadata, &data))),
            };
            let entries = extract_archive(
                data,
                Some(destination.clone()),
                options.decompress,
                hint,
                Arc::clone(cancel),
            )
            .await?;
            info!(
                destination = %destination.display(),
                entries = entries.len(),
                "archive extracted"
            );
            Ok(Artifact::Extracted(entries))
        }
    }
}
