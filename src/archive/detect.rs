//! Archive signature detection.
//!
//! Looks at the leading bytes of a buffer and reports which container or
//! compression format they belong to. Detection never mutates or copies the
//! buffer.

use std::fmt;

const ZIP_MAGIC: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
const ZIP_EMPTY_MAGIC: &[u8] = &[0x50, 0x4B, 0x05, 0x06];
const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
const BZIP2_MAGIC: &[u8] = b"BZh";
const XZ_MAGIC: &[u8] = &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];
const SEVEN_ZIP_MAGIC: &[u8] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];
const RAR_MAGIC: &[u8] = &[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07];

/// Offset of the `ustar` magic inside a tar header block.
const TAR_MAGIC_OFFSET: usize = 257;
const TAR_MAGIC: &[u8] = b"ustar";

/// Archive or compressed-stream formats recognized by [`detect_format`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
    SevenZip,
    Rar,
}

impl ArchiveFormat {
    /// Conventional file extension for the format, without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::Gzip => "gz",
            Self::Bzip2 => "bz2",
            Self::Xz => "xz",
            Self::Zstd => "zst",
            Self::SevenZip => "7z",
            Self::Rar => "rar",
        }
    }

    /// Returns true for single-stream compression formats that may or may not
    /// wrap a tar archive.
    #[must_use]
    pub fn is_compressed_stream(self) -> bool {
        matches!(self, Self::Gzip | Self::Bzip2 | Self::Xz | Self::Zstd)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Detects the archive format of `data` from its leading bytes.
///
/// Returns `None` when the buffer does not start with a known archive or
/// compression signature.
#[must_use]
pub fn detect_format(data: &[u8]) -> Option<ArchiveFormat> {
    if data.starts_with(ZIP_MAGIC) || data.starts_with(ZIP_EMPTY_MAGIC) {
        Some(ArchiveFormat::Zip)
    } else if data.starts_with(GZIP_MAGIC) {
        Some(ArchiveFormat::Gzip)
    } else if data.starts_with(XZ_MAGIC) {
        Some(ArchiveFormat::Xz)
    } else if data.starts_with(ZSTD_MAGIC) {
        Some(ArchiveFormat::Zstd)
    } else if data.starts_with(BZIP2_MAGIC) {
        Some(ArchiveFormat::Bzip2)
    } else if data.starts_with(SEVEN_ZIP_MAGIC) {
        Some(ArchiveFormat::SevenZip)
    } else if data.starts_with(RAR_MAGIC) {
        Some(ArchiveFormat::Rar)
    } else if is_tar_archive(data) {
        Some(ArchiveFormat::Tar)
    } else {
        None
    }
}

/// Check if data appears to be a tar archive.
///
/// Both POSIX (`ustar\0`) and GNU (`ustar  \0`) headers carry `ustar` at
/// offset 257.
#[must_use]
pub fn is_tar_archive(data: &[u8]) -> bool {
    data.get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len())
        .is_some_and(|magic| magic == TAR_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_zip_format() {
        let zip_header = [0x50, 0x4B, 0x03, 0x04, 0x14, 0x00, 0x00, 0x00];
        assert_eq!(detect_format(&zip_header), Some(ArchiveFormat::Zip));
    }

    #[test]
    fn test_detect_empty_zip_format() {
        let empty_zip = [0x50, 0x4B, 0x05, 0x06, 0x00, 0x00];
        assert_eq!(detect_format(&empty_zip), Some(ArchiveFormat::Zip));
    }

    #[test]
    fn test_detect_compressed_streams() {
        assert_eq!(
            detect_format(&[0x1F, 0x8B, 0x08, 0x00]),
            Some(ArchiveFormat::Gzip)
        );
        assert_eq!(
            detect_format(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, 0x00]),
            Some(ArchiveFormat::Xz)
        );
        assert_eq!(
            detect_format(&[0x28, 0xB5, 0x2F, 0xFD, 0x00]),
            Some(ArchiveFormat::Zstd)
        );
        assert_eq!(detect_format(b"BZh91AY&SY"), Some(ArchiveFormat::Bzip2));
    }

    #[test]
    fn test_detect_plain_tar_posix_and_gnu() {
        let mut posix = [0u8; 512];
        posix[257..263].copy_from_slice(b"ustar\0");
        assert_eq!(detect_format(&posix), Some(ArchiveFormat::Tar));

        let mut gnu = [0u8; 512];
        gnu[257..265].copy_from_slice(b"ustar  \0");
        assert_eq!(detect_format(&gnu), Some(ArchiveFormat::Tar));
    }

    #[test]
    fn test_detect_seven_zip_and_rar() {
        assert_eq!(
            detect_format(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00]),
            Some(ArchiveFormat::SevenZip)
        );
        assert_eq!(
            detect_format(&[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x00]),
            Some(ArchiveFormat::Rar)
        );
    }

    #[test]
    fn test_detect_unknown_and_short_input() {
        assert_eq!(detect_format(&[0xDE, 0xAD, 0xBE, 0xEF]), None);
        assert_eq!(detect_format(&[0u8; 256]), None);
        assert_eq!(detect_format(&[]), None);
        assert_eq!(detect_format(b"%PDF-1.7"), None);
    }

    #[test]
    fn test_compressed_stream_classification() {
        assert!(ArchiveFormat::Gzip.is_compressed_stream());
        assert!(ArchiveFormat::Zstd.is_compressed_stream());
        assert!(!ArchiveFormat::Zip.is_compressed_stream());
        assert!(!ArchiveFormat::Tar.is_compressed_stream());
        assert_eq!(ArchiveFormat::Zstd.to_string(), "zst");
    }
}
