//! Unpacking zip, tar, and compressed tar payloads.
//!
//! Archives are read fully into members first, then placed. Symlinks are
//! placed after every other member, and no member may pass through one.

use std::borrow::Cow;
use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tracing::{debug, warn};

use super::detect::{ArchiveFormat, detect_format, is_tar_archive};
use super::error::ExtractError;
use super::options::DecompressOptions;
use super::sanitize::{
    confine, confine_symlink_target, is_symlink_on_disk, reject_linked_ancestors, strip_components,
};

/// Name given to a single decompressed payload when nothing better is known.
const FALLBACK_MEMBER_NAME: &str = "data";

/// Unix file-type bits marking a symbolic link.
const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// One member produced by extraction.
///
/// When extracting to disk `path` is the written location and `data` is
/// `None`. When extracting in memory `path` is the member path inside the
/// archive (after stripping) and files carry their contents in `data`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub mode: Option<u32>,
    pub data: Option<Bytes>,
}

struct Member {
    path: PathBuf,
    kind: EntryKind,
    mode: Option<u32>,
    data: Vec<u8>,
    link_target: Option<PathBuf>,
    strippable: bool,
}

/// Unpacks an in-memory archive either into a directory or into memory.
pub struct Extractor<'a> {
    options: &'a DecompressOptions,
    name_hint: Option<&'a str>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Extractor<'a> {
    #[must_use]
    pub fn new(options: &'a DecompressOptions) -> Self {
        Self {
            options,
            name_hint: None,
            cancel: None,
        }
    }

    /// Name used for a bare compressed stream (e.g. `notes.txt.gz`) that does
    /// not record its own filename. The compression suffix is removed.
    #[must_use]
    pub fn name_hint(mut self, name: &'a str) -> Self {
        self.name_hint = Some(name);
        self
    }

    /// Stops before the next member once `flag` is set, returning
    /// [`ExtractError::Cancelled`]. Members already placed stay on disk.
    #[must_use]
    pub fn cancel_on(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Extracts `data`, writing below `destination` when given.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when the buffer is not a supported archive, is
    /// corrupted, contains a member escaping the destination, or a file cannot
    /// be written. Returns [`ExtractError::Cancelled`] once the cancel flag is
    /// observed.
    pub fn extract(
        &self,
        data: &[u8],
        destination: Option<&Path>,
    ) -> Result<Vec<ExtractedEntry>, ExtractError> {
        let format =
            detect_format(data).ok_or_else(|| ExtractError::corrupted("no archive signature"))?;
        let members = self.read_members(format, data)?;
        debug!(%format, members = members.len(), "archive read");

        let mut placed = Vec::with_capacity(members.len());
        for member in members {
            if let Some(relative) = self.relative_path(&member)? {
                placed.push((relative, member));
            }
        }
        let links: HashSet<PathBuf> = placed
            .iter()
            .filter(|(_, member)| member.kind == EntryKind::Symlink)
            .map(|(relative, _)| relative.clone())
            .collect();
        placed.sort_by_key(|(_, member)| member.kind == EntryKind::Symlink);

        let mut entries = Vec::with_capacity(placed.len());
        for (relative, member) in placed {
            if self.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                debug!(placed = entries.len(), "extraction cancelled");
                return Err(ExtractError::Cancelled);
            }
            let entry = match destination {
                Some(root) => self.place_on_disk(&relative, member, root, &links)?,
                None => Some(place_in_memory(relative, member)),
            };
            entries.extend(entry);
        }
        Ok(entries)
    }

    fn read_members(&self, format: ArchiveFormat, data: &[u8]) -> Result<Vec<Member>, ExtractError> {
        match format {
            ArchiveFormat::Zip => read_zip(data),
            ArchiveFormat::Tar => read_tar(data),
            ArchiveFormat::Gzip | ArchiveFormat::Bzip2 | ArchiveFormat::Xz | ArchiveFormat::Zstd => {
                let (decoded, embedded_name) = decompress_stream(format, data)?;
                if is_tar_archive(&decoded) {
                    return read_tar(&decoded);
                }
                let name = embedded_name
                    .or_else(|| self.name_hint.map(|hint| strip_suffix(hint, format)))
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| FALLBACK_MEMBER_NAME.to_string());
                Ok(vec![Member {
                    path: PathBuf::from(name),
                    kind: EntryKind::File,
                    mode: None,
                    data: decoded,
                    link_target: None,
                    strippable: false,
                }])
            }
            ArchiveFormat::SevenZip | ArchiveFormat::Rar => {
                Err(ExtractError::UnsupportedFormat { format })
            }
        }
    }

    /// Confined, stripped path of `member`, or `None` when it is dropped.
    fn relative_path(&self, member: &Member) -> Result<Option<PathBuf>, ExtractError> {
        let confined = confine(&member.path)?;
        let relative = if member.strippable {
            strip_components(&confined, self.options.strip)
        } else {
            Some(confined)
        };
        Ok(relative.filter(|path| !path.as_os_str().is_empty()))
    }

    fn place_on_disk(
        &self,
        relative: &Path,
        member: Member,
        root: &Path,
        links: &HashSet<PathBuf>,
    ) -> Result<Option<ExtractedEntry>, ExtractError> {
        reject_linked_ancestors(relative, root, links)?;

        let target = root.join(relative);
        match member.kind {
            EntryKind::Directory => create_dir_all(&target)?,
            EntryKind::File => {
                if let Some(parent) = target.parent() {
                    create_dir_all(parent)?;
                }
                if is_symlink_on_disk(&target) {
                    std::fs::remove_file(&target).map_err(|e| ExtractError::io(&target, e))?;
                }
                std::fs::write(&target, &member.data)
                    .map_err(|e| ExtractError::io(&target, e))?;
                if self.options.preserve_mode {
                    apply_mode(&target, member.mode)?;
                }
            }
            EntryKind::Symlink => {
                let Some(link_target) = member.link_target.as_deref() else {
                    warn!(path = %relative.display(), "symlink without target skipped");
                    return Ok(None);
                };
                confine_symlink_target(relative, link_target, root, links)?;
                if let Some(parent) = target.parent() {
                    create_dir_all(parent)?;
                }
                create_symlink(link_target, &target)?;
            }
        }
        debug!(path = %target.display(), kind = ?member.kind, "member extracted");

        Ok(Some(ExtractedEntry {
            path: target,
            kind: member.kind,
            mode: member.mode,
            data: None,
        }))
    }
}

fn place_in_memory(relative: PathBuf, member: Member) -> ExtractedEntry {
    let data = (member.kind == EntryKind::File).then(|| Bytes::from(member.data));
    ExtractedEntry {
        path: relative,
        kind: member.kind,
        mode: member.mode,
        data,
    }
}

/// Extracts `data` with default naming. See [`Extractor::extract`].
///
/// # Errors
///
/// Same as [`Extractor::extract`].
pub fn extract(
    data: &[u8],
    destination: Option<&Path>,
    options: &DecompressOptions,
) -> Result<Vec<ExtractedEntry>, ExtractError> {
    Extractor::new(options).extract(data, destination)
}

fn read_zip(data: &[u8]) -> Result<Vec<Member>, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data)).map_err(ExtractError::corrupted)?;
    let mut members = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(ExtractError::corrupted)?;
        let path = PathBuf::from(file.name());
        let mode = file.unix_mode();
        let kind = if file.is_dir() {
            EntryKind::Directory
        } else if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
            EntryKind::Symlink
        } else {
            EntryKind::File
        };

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(ExtractError::corrupted)?;
        let link_target = (kind == EntryKind::Symlink)
            .then(|| PathBuf::from(String::from_utf8_lossy(&content).into_owned()));

        members.push(Member {
            path,
            kind,
            mode,
            data: content,
            link_target,
            strippable: true,
        });
    }

    Ok(members)
}

fn read_tar(data: &[u8]) -> Result<Vec<Member>, ExtractError> {
    let mut archive = tar::Archive::new(data);
    let mut members = Vec::new();

    for entry in archive.entries().map_err(ExtractError::corrupted)? {
        let mut entry = entry.map_err(ExtractError::corrupted)?;
        let path = entry
            .path()
            .map_err(ExtractError::corrupted)?
            .into_owned();
        let entry_type = entry.header().entry_type();
        let mode = entry.header().mode().ok();

        let kind = if entry_type.is_dir() {
            EntryKind::Directory
        } else if entry_type.is_symlink() {
            EntryKind::Symlink
        } else if entry_type.is_file() {
            EntryKind::File
        } else {
            debug!(path = %path.display(), ?entry_type, "unsupported tar entry skipped");
            continue;
        };

        let link_target = if kind == EntryKind::Symlink {
            entry
                .link_name()
                .map_err(ExtractError::corrupted)?
                .map(Cow::into_owned)
        } else {
            None
        };

        let mut content = Vec::new();
        if kind == EntryKind::File {
            entry
                .read_to_end(&mut content)
                .map_err(ExtractError::corrupted)?;
        }

        members.push(Member {
            path,
            kind,
            mode,
            data: content,
            link_target,
            strippable: true,
        });
    }

    Ok(members)
}

/// Fully decodes a single compressed stream. Gzip may carry the original
/// filename in its header, which is returned alongside the data.
fn decompress_stream(
    format: ArchiveFormat,
    data: &[u8],
) -> Result<(Vec<u8>, Option<String>), ExtractError> {
    let mut decoded = Vec::new();
    match format {
        ArchiveFormat::Gzip => {
            let mut decoder = flate2::read::MultiGzDecoder::new(data);
            decoder
                .read_to_end(&mut decoded)
                .map_err(ExtractError::corrupted)?;
            let name = decoder
                .header()
                .and_then(flate2::GzHeader::filename)
                .map(|raw| String::from_utf8_lossy(raw).into_owned());
            Ok((decoded, name))
        }
        ArchiveFormat::Bzip2 => {
            bzip2::read::MultiBzDecoder::new(data)
                .read_to_end(&mut decoded)
                .map_err(ExtractError::corrupted)?;
            Ok((decoded, None))
        }
        ArchiveFormat::Xz => {
            xz2::read::XzDecoder::new(data)
                .read_to_end(&mut decoded)
                .map_err(ExtractError::corrupted)?;
            Ok((decoded, None))
        }
        ArchiveFormat::Zstd => {
            let decoded = zstd::stream::decode_all(data).map_err(ExtractError::corrupted)?;
            Ok((decoded, None))
        }
        _ => Err(ExtractError::UnsupportedFormat { format }),
    }
}

fn strip_suffix(name: &str, format: ArchiveFormat) -> String {
    let suffix = format!(".{}", format.extension());
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(&suffix) && name.len() > suffix.len() {
        name[..name.len() - suffix.len()].to_string()
    } else {
        name.to_string()
    }
}

fn create_dir_all(path: &Path) -> Result<(), ExtractError> {
    std::fs::create_dir_all(path).map_err(|e| ExtractError::io(path, e))
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> Result<(), ExtractError> {
    use std::os::unix::fs::PermissionsExt;

    let Some(mode) = mode else {
        return Ok(());
    };
    let permissions = std::fs::Permissions::from_mode(mode & 0o7777);
    std::fs::set_permissions(path, permissions).map_err(|e| ExtractError::io(path, e))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> Result<(), ExtractError> {
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> Result<(), ExtractError> {
    if std::fs::symlink_metadata(link).is_ok() {
        std::fs::remove_file(link).map_err(|e| ExtractError::io(link, e))?;
    }
    std::os::unix::fs::symlink(target, link).map_err(|e| ExtractError::io(link, e))
}

#[cfg(not(unix))]
fn create_symlink(target: &Path, link: &Path) -> Result<(), ExtractError> {
    debug!(
        link = %link.display(),
        target = %target.display(),
        "symlinks are not created on this platform"
    );
    Ok(())
}
