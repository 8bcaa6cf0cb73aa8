//! Drains a response body into memory.

use std::borrow::Cow;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::error::DownloadError;
use super::options::{ResponseType, TextEncoding};

/// Receives every body chunk as it arrives, plus a final error if the
/// download fails after the body was read.
pub(crate) type ChunkSender = mpsc::UnboundedSender<Result<Bytes, DownloadError>>;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Reads `body` to the end, forwarding each chunk to `sink`.
///
/// Forwarding never waits on the receiver, and a dropped receiver is not an
/// error. The first failed chunk aborts the read.
pub(crate) async fn materialize<S>(
    mut body: S,
    response_type: ResponseType,
    encoding: TextEncoding,
    sink: Option<&ChunkSender>,
) -> Result<Bytes, DownloadError>
where
    S: Stream<Item = Result<Bytes, DownloadError>> + Unpin,
{
    let mut buffer = BytesMut::new();
    let mut chunks = 0usize;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        trace!(len = chunk.len(), "body chunk");
        buffer.extend_from_slice(&chunk);
        chunks += 1;
        if let Some(sink) = sink {
            let _ = sink.send(Ok(chunk));
        }
    }

    let raw = buffer.freeze();
    debug!(bytes = raw.len(), chunks, "body materialized");

    Ok(match response_type {
        ResponseType::Bytes => raw,
        ResponseType::Text => decode_text(raw, encoding),
    })
}

/// Decodes `raw` with `encoding` and returns it as UTF-8.
pub(crate) fn decode_text(raw: Bytes, encoding: TextEncoding) -> Bytes {
    match encoding {
        TextEncoding::Utf8 => {
            let raw = if raw.starts_with(UTF8_BOM) {
                raw.slice(UTF8_BOM.len()..)
            } else {
                raw
            };
            match String::from_utf8_lossy(&raw) {
                Cow::Borrowed(_) => raw,
                Cow::Owned(repaired) => Bytes::from(repaired),
            }
        }
        TextEncoding::Latin1 => {
            if raw.is_ascii() {
                return raw;
            }
            let decoded: String = raw.iter().copied().map(char::from).collect();
            Bytes::from(decoded)
        }
    }
}
