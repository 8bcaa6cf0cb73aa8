//! Archive detection and extraction.
//!
//! Payloads are probed by signature ([`detect_format`]) and unpacked from an
//! in-memory buffer ([`extract`]), either into a destination directory or
//! into memory. Supported containers are zip and tar. Tar may be wrapped in
//! gzip, bzip2, xz, or zstd, and a bare compressed stream unpacks to one file.
//! Member paths are confined to the destination.

mod detect;
mod error;
mod extract;
mod options;
mod sanitize;

pub use detect::{ArchiveFormat, detect_format, is_tar_archive};
pub use error::ExtractError;
pub use extract::{EntryKind, ExtractedEntry, Extractor, extract};
pub use options::DecompressOptions;
