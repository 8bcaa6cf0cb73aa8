//! The [`Download`] handle: one spawned task, observable two ways.
//!
//! Poll it as a [`Stream`] to receive body chunks while they arrive, and/or
//! `.await` it for the final [`Artifact`]. Both views are fed by the same
//! task, so awaiting never issues a second request.

use std::future::IntoFuture;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, Stream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::client::ResponseMetadata;
use super::error::DownloadError;
use super::options::DownloadOptions;
use super::pipeline;
use crate::archive::ExtractedEntry;

/// Final result of a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// The body, whether or not it was also written to disk.
    Bytes(Bytes),
    /// The body was an archive and was unpacked.
    Extracted(Vec<ExtractedEntry>),
}

impl Artifact {
    /// Returns the body when no extraction happened.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Extracted(_) => None,
        }
    }

    /// Returns the extracted entries when the body was unpacked.
    #[must_use]
    pub fn entries(&self) -> Option<&[ExtractedEntry]> {
        match self {
            Self::Bytes(_) => None,
            Self::Extracted(entries) => Some(entries),
        }
    }
}

/// Everything needed to run one download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    /// Where to save or unpack. Nothing touches the filesystem when `None`.
    pub output_dir: Option<PathBuf>,
    pub options: DownloadOptions,
}

impl DownloadRequest {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            output_dir: None,
            options: DownloadOptions::default(),
        }
    }

    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn options(mut self, options: DownloadOptions) -> Self {
        self.options = options;
        self
    }

    /// Spawns the download on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn start(self) -> Download {
        Download::spawn(self)
    }
}

/// Fetches `url` into memory without touching the filesystem.
///
/// With `options.extract` set and an archive body, the archive is unpacked
/// into memory.
///
/// # Panics
///
/// Panics when called outside a Tokio runtime.
pub fn download(url: impl Into<String>, options: DownloadOptions) -> Download {
    DownloadRequest::new(url).options(options).start()
}

/// Fetches `url` and saves it below `output_dir`, or unpacks it there when
/// `options.extract` is set and the body is an archive.
///
/// # Panics
///
/// Panics when called outside a Tokio runtime.
pub fn download_to(
    url: impl Into<String>,
    output_dir: impl Into<PathBuf>,
    options: DownloadOptions,
) -> Download {
    DownloadRequest::new(url)
        .output_dir(output_dir)
        .options(options)
        .start()
}

/// Cancels a running [`Download`] from anywhere.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    task: tokio::task::AbortHandle,
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Cancels the download. A file being written may be left partial, and an
    /// extraction in progress stops before its next member.
    ///
    /// Has no effect once the download has finished.
    pub fn abort(&self) {
        if self.task.is_finished() {
            return;
        }
        self.aborted.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// A download in flight.
///
/// Implements [`Stream`] over the body chunks and [`IntoFuture`] resolving
/// to the [`Artifact`]. Dropping the handle does not cancel the task; call
/// [`abort`](Self::abort) for that.
#[must_use = "a Download does nothing observable unless awaited or streamed"]
#[derive(Debug)]
pub struct Download {
    url: String,
    task: JoinHandle<Result<Artifact, DownloadError>>,
    chunks: mpsc::UnboundedReceiver<Result<Bytes, DownloadError>>,
    metadata: watch::Receiver<Option<ResponseMetadata>>,
    aborted: Arc<AtomicBool>,
    /// Set by the task itself once it returns `Ok`, before the chunk sender
    /// is dropped.
    completed: Arc<AtomicBool>,
    stream_done: bool,
}

impl Download {
    fn spawn(request: DownloadRequest) -> Self {
        let url = request.url.clone();
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let (metadata_tx, metadata_rx) = watch::channel(None);

        let aborted = Arc::new(AtomicBool::new(false));
        let completed = Arc::new(AtomicBool::new(false));

        debug!(url = %url, output_dir = ?request.output_dir, "download spawned");
        let task = tokio::spawn({
            let aborted = Arc::clone(&aborted);
            let completed = Arc::clone(&completed);
            async move {
                let result =
                    pipeline::run(request, Some(&chunk_tx), &metadata_tx, &aborted).await;
                match &result {
                    Ok(_) => completed.store(true, Ordering::SeqCst),
                    Err(error) => {
                        warn!(error = %error, "download failed");
                        let _ = chunk_tx.send(Err(error.clone()));
                    }
                }
                result
            }
        });

        Self {
            url,
            task,
            chunks: chunk_rx,
            metadata: metadata_rx,
            aborted,
            completed,
            stream_done: false,
        }
    }

    /// The URL being downloaded.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Waits for the response headers.
    ///
    /// Returns `None` when the download failed or was aborted before any
    /// response arrived.
    pub async fn response(&self) -> Option<ResponseMetadata> {
        let mut metadata = self.metadata.clone();
        if metadata.wait_for(Option::is_some).await.is_err() {
            debug!(url = %self.url, "download ended before a response arrived");
        }
        metadata.borrow().clone()
    }

    /// Cancels the download. Awaiting it afterwards yields
    /// [`DownloadError::Aborted`], and the chunk stream ends with the same
    /// error.
    pub fn abort(&self) {
        self.abort_handle().abort();
    }

    /// A cloneable handle that can cancel this download after it has been
    /// moved into an `.await`.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            task: self.task.abort_handle(),
            aborted: Arc::clone(&self.aborted),
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Stream for Download {
    type Item = Result<Bytes, DownloadError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.stream_done {
            return Poll::Ready(None);
        }

        match this.chunks.poll_recv(cx) {
            Poll::Ready(Some(item)) => {
                if item.is_err() {
                    this.stream_done = true;
                }
                Poll::Ready(Some(item))
            }
            // The sender is gone without a final error: either the task
            // returned `Ok`, or it was cancelled mid-flight.
            Poll::Ready(None) => {
                this.stream_done = true;
                if this.completed.load(Ordering::SeqCst) {
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Err(DownloadError::aborted(this.url.clone()))))
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl IntoFuture for Download {
    type Output = Result<Artifact, DownloadError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { url, task, .. } = self;
        async move {
            match task.await {
                Ok(result) => result,
                Err(join_error) if join_error.is_panic() => {
                    std::panic::resume_unwind(join_error.into_panic())
                }
                Err(_) => Err(DownloadError::aborted(url)),
            }
        }
        .boxed()
    }
}
