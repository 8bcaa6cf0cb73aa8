//! Options for unpacking archives.

use serde::{Deserialize, Serialize};

/// Options controlling how archives are unpacked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompressOptions {
    /// Number of leading path components removed from every member.
    /// Members with nothing left after stripping are skipped.
    pub strip: usize,
    /// Apply the unix permission bits recorded in the archive to extracted files.
    pub preserve_mode: bool,
}

impl Default for DecompressOptions {
    fn default() -> Self {
        Self {
            strip: 0,
            preserve_mode: true,
        }
    }
}

impl DecompressOptions {
    #[must_use]
    pub fn strip(mut self, count: usize) -> Self {
        self.strip = count;
        self
    }

    #[must_use]
    pub fn preserve_mode(mut self, preserve: bool) -> Self {
        self.preserve_mode = preserve;
        self
    }
}
