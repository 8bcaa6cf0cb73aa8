//! Single-resource download pipeline.
//!
//! One call fetches a URL, buffers the body, names it, and either returns
//! it, saves it, or unpacks it when it is an archive.
//!
//! # Features
//!
//! - Dual consumption: a [`Download`] is both a chunk [`Stream`](futures_util::Stream)
//!   and an awaitable resolving to an [`Artifact`]
//! - Filename resolution from `Content-Disposition`, the URL path, and
//!   content sniffing
//! - Optional archive extraction (zip, tar, gzip, xz, zstd)
//! - Non-2xx responses are treated as ordinary bodies
//!
//! # Example
//!
//! ```no_run
//! use download_unpack::download::{DownloadOptions, download_to};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = DownloadOptions::default().extract(true);
//! let artifact = download_to("https://example.com/release.tar.gz", "./out", options).await?;
//! println!("{artifact:?}");
//! # Ok(())
//! # }
//! ```

mod body;
mod client;
mod error;
pub mod filename;
mod handle;
mod options;
mod output;
mod pipeline;
pub mod sniff;

pub use client::{ByteStream, HttpClient, ResponseMetadata};
pub use error::DownloadError;
pub use filename::{FilenameResolver, FilenameStrategy, resolve_filename, sanitize_filename};
pub use handle::{AbortHandle, Artifact, Download, DownloadRequest, download, download_to};
pub use options::{
    DEFAULT_MAX_REDIRECTS, DecompressOverride, DownloadOptions, OptionsError, OptionsOverride,
    ResponseType, TextEncoding, TransportOptions, TransportOverride,
};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
