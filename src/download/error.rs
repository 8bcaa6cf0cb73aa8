//! Error types for the download module.
//!
//! This module defines structured errors for every stage of a download,
//! providing context-rich error messages for debugging and user feedback.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::archive::ExtractError;

/// Errors that can occur while downloading, saving, or extracting a resource.
///
/// The type is `Clone` because the same failure is delivered to both views of
/// a [`Download`](super::Download): the chunk stream and the awaited result.
/// Sources that are not `Clone` themselves are held behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors,
    /// truncated body, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: Arc<reqwest::Error>,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The HTTP client could not be built from the transport options.
    #[error("failed to configure HTTP client: {source}")]
    Client {
        /// The underlying builder error.
        #[source]
        source: Arc<reqwest::Error>,
    },

    /// File system error while creating directories or writing the file.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The downloaded archive could not be extracted.
    #[error("extraction failed: {source}")]
    Extraction {
        /// The underlying extraction error.
        #[source]
        source: ExtractError,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// An explicit filename override would land outside the output directory.
    #[error("invalid output filename: {name}")]
    InvalidFilename {
        /// The rejected filename.
        name: String,
    },

    /// The operation was aborted through its handle before it completed.
    #[error("download aborted: {url}")]
    Aborted {
        /// The URL whose download was aborted.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    ///
    /// Timeouts reported by reqwest are mapped to [`DownloadError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a client configuration error.
    pub fn client(source: reqwest::Error) -> Self {
        Self::Client {
            source: Arc::new(source),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an invalid filename error.
    pub fn invalid_filename(name: impl Into<String>) -> Self {
        Self::InvalidFilename { name: name.into() }
    }

    /// Creates an aborted error.
    pub fn aborted(url: impl Into<String>) -> Self {
        Self::Aborted { url: url.into() }
    }

    /// Returns true if this error reports an aborted operation.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

impl From<ExtractError> for DownloadError {
    fn from(source: ExtractError) -> Self {
        Self::Extraction { source }
    }
}

// Note: there is no `From<reqwest::Error>` or `From<std::io::Error>`.
// Those variants need context (url, path) the source errors don't carry, so
// the helper constructors above are used instead.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::timeout("https://example.com/file.pdf");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("https://example.com/file.pdf"));
    }

    #[test]
    fn test_download_error_io_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = DownloadError::io(PathBuf::from("/tmp/test.pdf"), io_error);
        let msg = error.to_string();
        assert!(msg.contains("/tmp/test.pdf"), "Expected path in: {msg}");
    }

    #[test]
    fn test_download_error_invalid_url_display() {
        let error = DownloadError::invalid_url("not-a-url");
        let msg = error.to_string();
        assert!(
            msg.contains("invalid URL"),
            "Expected 'invalid URL' in: {msg}"
        );
        assert!(msg.contains("not-a-url"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_download_error_aborted_is_detectable() {
        let error = DownloadError::aborted("https://example.com/big.iso");
        assert!(error.is_aborted());
        assert!(error.to_string().contains("aborted"));
        assert!(!DownloadError::timeout("https://example.com").is_aborted());
    }

    #[test]
    fn test_download_error_extraction_wraps_source() {
        let error = DownloadError::from(ExtractError::Corrupted {
            reason: "bad header".to_string(),
        });
        assert!(matches!(error, DownloadError::Extraction { .. }));
        assert!(error.to_string().contains("bad header"));
    }

    #[test]
    fn test_download_error_clone_keeps_io_source() {
        let io_error = std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full");
        let error = DownloadError::io("/data/out.bin", io_error);
        let cloned = error.clone();
        let source = std::error::Error::source(&cloned).unwrap();
        assert!(source.to_string().contains("disk full"));
    }
}
