//! Keeping archive members inside the extraction root.
//!
//! Member paths are normalized lexically. On disk, a lexical check alone is
//! not enough: a symlink created earlier in the same archive can redirect a
//! later member. Symlinks are therefore tracked by their relative path and
//! never traversed, whether they come from the archive (`links`) or already
//! exist below the root.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use super::error::ExtractError;

/// Normalizes an archive member path into a relative path that cannot
/// escape the extraction root.
///
/// `.` components are dropped and `..` pops the previous component. Absolute
/// paths, drive prefixes, and `..` that would climb above the root are
/// rejected.
pub(crate) fn confine(entry: &Path) -> Result<PathBuf, ExtractError> {
    let mut result = PathBuf::new();

    for component in entry.components() {
        match component {
            Component::Normal(part) => result.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    return Err(ExtractError::ZipSlip {
                        entry: entry.to_path_buf(),
                    });
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ExtractError::ZipSlip {
                    entry: entry.to_path_buf(),
                });
            }
        }
    }

    Ok(result)
}

/// Strips `count` leading components.
///
/// Returns `None` when nothing remains, which means the member is dropped.
pub(crate) fn strip_components(path: &Path, count: usize) -> Option<PathBuf> {
    let stripped: PathBuf = path.components().skip(count).collect();
    (!stripped.as_os_str().is_empty()).then_some(stripped)
}

/// Rejects `relative` when one of its ancestors is a symlink, so nothing is
/// ever written through a link.
pub(crate) fn reject_linked_ancestors(
    relative: &Path,
    root: &Path,
    links: &HashSet<PathBuf>,
) -> Result<(), ExtractError> {
    let mut prefix = PathBuf::new();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        prefix.push(component);
        if is_link(&prefix, root, links) {
            return Err(ExtractError::ZipSlip {
                entry: relative.to_path_buf(),
            });
        }
    }
    Ok(())
}

/// Checks that a symlink at `link` (relative to the root) pointing at
/// `target` resolves inside the root.
///
/// The target is walked from the link's directory. Passing through another
/// symlink is rejected, since `..` after a link is resolved by the kernel
/// against the link's destination rather than lexically.
pub(crate) fn confine_symlink_target(
    link: &Path,
    target: &Path,
    root: &Path,
    links: &HashSet<PathBuf>,
) -> Result<(), ExtractError> {
    let escape = || ExtractError::ZipSlip {
        entry: link.to_path_buf(),
    };

    let mut resolved = link.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut components = target.components().peekable();
    while let Some(component) = components.next() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                if components.peek().is_some() && is_link(&resolved, root, links) {
                    return Err(escape());
                }
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(escape());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(escape()),
        }
    }
    Ok(())
}

/// True when `path` is a symlink that already exists on disk.
pub(crate) fn is_symlink_on_disk(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|metadata| metadata.file_type().is_symlink())
}

fn is_link(relative: &Path, root: &Path, links: &HashSet<PathBuf>) -> bool {
    links.contains(relative) || is_symlink_on_disk(&root.join(relative))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_confine_keeps_plain_relative_paths() {
        assert_eq!(
            confine(Path::new("pkg/bin/tool")).unwrap(),
            PathBuf::from("pkg/bin/tool")
        );
        assert_eq!(
            confine(Path::new("./pkg/./lib/../bin")).unwrap(),
            PathBuf::from("pkg/bin")
        );
    }

    #[test]
    fn test_confine_rejects_escape() {
        assert!(matches!(
            confine(Path::new("../../etc/passwd")),
            Err(ExtractError::ZipSlip { .. })
        ));
        assert!(matches!(
            confine(Path::new("a/../../b")),
            Err(ExtractError::ZipSlip { .. })
        ));
    }

    #[test]
    fn test_confine_rejects_absolute() {
        let absolute = if cfg!(windows) {
            "C:\\etc\\passwd"
        } else {
            "/etc/passwd"
        };
        assert!(matches!(
            confine(Path::new(absolute)),
            Err(ExtractError::ZipSlip { .. })
        ));
    }

    #[test]
    fn test_strip_components() {
        assert_eq!(
            strip_components(Path::new("tool-1.0/bin/tool"), 1),
            Some(PathBuf::from("bin/tool"))
        );
        assert_eq!(strip_components(Path::new("tool-1.0"), 1), None);
        assert_eq!(
            strip_components(Path::new("a/b"), 0),
            Some(PathBuf::from("a/b"))
        );
    }

    #[test]
    fn test_symlink_target_must_stay_inside() {
        let root = Path::new("/nonexistent-extraction-root");
        let links = HashSet::new();
        assert!(
            confine_symlink_target(Path::new("bin/link"), Path::new("../lib/x"), root, &links)
                .is_ok()
        );
        assert!(
            confine_symlink_target(
                Path::new("bin/link"),
                Path::new("../../outside"),
                root,
                &links
            )
            .is_err()
        );
        assert!(
            confine_symlink_target(Path::new("link"), Path::new("/etc/passwd"), root, &links)
                .is_err()
        );
    }

    #[test]
    fn test_symlink_target_may_not_traverse_another_link() {
        let root = Path::new("/nonexistent-extraction-root");
        let links: HashSet<PathBuf> = [PathBuf::from("a/b")].into_iter().collect();

        assert!(
            confine_symlink_target(Path::new("l"), Path::new("a/b/../.."), root, &links).is_err()
        );
        // Pointing at a link is fine, walking through it is not.
        assert!(confine_symlink_target(Path::new("l"), Path::new("a/b"), root, &links).is_ok());
    }

    #[test]
    fn test_member_below_archive_link_rejected() {
        let root = Path::new("/nonexistent-extraction-root");
        let links: HashSet<PathBuf> = [PathBuf::from("a/b")].into_iter().collect();

        assert!(matches!(
            reject_linked_ancestors(Path::new("a/b/c/x.txt"), root, &links),
            Err(ExtractError::ZipSlip { .. })
        ));
        assert!(reject_linked_ancestors(Path::new("a/b"), root, &links).is_ok());
        assert!(reject_linked_ancestors(Path::new("a/c/x.txt"), root, &links).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_member_below_existing_disk_link_rejected() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root = temp_dir.path().join("dest");
        std::fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink("..", root.join("up")).unwrap();

        assert!(is_symlink_on_disk(&root.join("up")));
        assert!(reject_linked_ancestors(Path::new("up/x.txt"), &root, &HashSet::new()).is_err());
    }
}
