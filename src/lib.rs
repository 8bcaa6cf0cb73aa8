//! Download Unpack Library
//!
//! Fetches a single resource over HTTP(S), buffers it, gives it a sensible
//! filename, and optionally unpacks it when it turns out to be an archive.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - Option composition, transport, naming, persistence, and
//!   the [`Download`] handle
//! - [`archive`] - Archive detection and extraction

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod download;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use archive::{ArchiveFormat, DecompressOptions, EntryKind, ExtractError, ExtractedEntry};
pub use download::{
    AbortHandle, Artifact, Download, DownloadError, DownloadOptions, DownloadRequest,
    OptionsError, OptionsOverride, ResponseMetadata, ResponseType, TextEncoding,
    TransportOptions, download, download_to,
};
