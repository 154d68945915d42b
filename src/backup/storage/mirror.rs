//! Mirrored-tree snapshots: plain attribute-preserving directory copies.
//!
//! Replaces the original `rsync -a` subprocess with a native recursive copy.
//! Regular files keep their permissions and modification times, directory
//! modes are re-applied after creation, and symlinks are recreated as
//! symlinks. Directory mtimes are not carried over; copying the children
//! would clobber them anyway.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::storage::ensure_relative;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

pub fn build(src_dir: &Path, dst_dir: &Path) -> Result<()> {
    info!("Mirroring {:?} to {:?}", src_dir, dst_dir);
    copy_tree(src_dir, dst_dir)
}

/// Recursive copy of `src` into `dst`, creating `dst` first. Per-entry
/// failures are logged and skipped with the same tolerance as archive
/// builds; only a failure to create the destination root aborts.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for res in WalkDir::new(src).follow_links(false).min_depth(1) {
        let entry = match res {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {:?}: {}", src, e);
                continue;
            }
        };
        let rel = entry.path().strip_prefix(src)?;
        let target = dst.join(rel);

        let file_type = entry.file_type();
        let copied = if file_type.is_dir() {
            copy_dir(entry.path(), &target)
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)
        } else {
            copy_file(entry.path(), &target)
        };

        match copied {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!("Access denied: {:?}", entry.path());
            }
            Err(e) => {
                error!("Failed to copy {:?}: {}", entry.path(), e);
            }
        }
    }
    Ok(())
}

fn copy_file(src: &Path, target: &Path) -> std::io::Result<()> {
    fs::copy(src, target)?;
    let mtime = fs::metadata(src)?.modified()?;
    fs::File::options().write(true).open(target)?.set_modified(mtime)
}

fn copy_dir(src: &Path, target: &Path) -> std::io::Result<()> {
    fs::create_dir_all(target)?;
    let perms = fs::metadata(src)?.permissions();
    fs::set_permissions(target, perms)
}

fn copy_symlink(src: &Path, target: &Path) -> std::io::Result<()> {
    let link_target = fs::read_link(src)?;
    if target.symlink_metadata().is_ok() {
        fs::remove_file(target)?;
    }
    symlink(link_target, target)
}

/// Relative paths of every file and symlink in the stored tree, in walk
/// order. Directories are structure, not entries.
pub fn list_entries(tree_root: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for res in WalkDir::new(tree_root).follow_links(false).min_depth(1) {
        let entry = match res {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {:?}: {}", tree_root, e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            entries.push(entry.path().strip_prefix(tree_root)?.to_path_buf());
        }
    }
    Ok(entries)
}

pub fn extract_all(tree_root: &Path, target_root: &Path) -> Result<()> {
    copy_tree(tree_root, target_root)
}

pub fn extract_one(tree_root: &Path, entry_path: &Path, target_root: &Path) -> Result<()> {
    ensure_relative(entry_path)?;
    let src = tree_root.join(entry_path);
    if !src.exists() {
        return Err(Error::EntryNotFound {
            backup: tree_root.to_path_buf(),
            entry: entry_path.to_path_buf(),
        });
    }

    let target = target_root.join(entry_path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    copy_file(&src, &target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn make_source(dir: &Path) {
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("a.txt"), "x").unwrap();
        fs::write(dir.join("sub/b.txt"), "y").unwrap();
        symlink("a.txt", dir.join("link")).unwrap();
    }

    #[test]
    fn test_mirror_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("home");
        make_source(&src);
        let stored = temp_dir.path().join("backup_2024-01-01_00-00-00");

        build(&src, &stored).unwrap();
        assert_eq!(fs::read_to_string(stored.join("a.txt")).unwrap(), "x");
        assert_eq!(fs::read_to_string(stored.join("sub/b.txt")).unwrap(), "y");
        assert!(stored.join("link").symlink_metadata().unwrap().is_symlink());

        let target = temp_dir.path().join("restored");
        extract_all(&stored, &target).unwrap();
        assert_eq!(fs::read_to_string(target.join("sub/b.txt")).unwrap(), "y");
    }

    #[test]
    fn test_mirror_preserves_file_mtime() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("home");
        make_source(&src);
        let hour_ago = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(src.join("a.txt"))
            .unwrap()
            .set_modified(hour_ago)
            .unwrap();

        let stored = temp_dir.path().join("backup_2024-01-01_00-00-00");
        build(&src, &stored).unwrap();

        let src_mtime = fs::metadata(src.join("a.txt")).unwrap().modified().unwrap();
        let dst_mtime = fs::metadata(stored.join("a.txt")).unwrap().modified().unwrap();
        assert_eq!(src_mtime, dst_mtime);
    }

    #[test]
    fn test_list_entries_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("home");
        make_source(&src);

        let entries: HashSet<_> = list_entries(&src).unwrap().into_iter().collect();
        let expected: HashSet<_> = [
            PathBuf::from("a.txt"),
            PathBuf::from("sub/b.txt"),
            PathBuf::from("link"),
        ]
        .into_iter()
        .collect();
        assert_eq!(entries, expected);
    }

    #[test]
    fn test_extract_one_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("home");
        make_source(&src);
        let stored = temp_dir.path().join("backup_2024-01-01_00-00-00");
        build(&src, &stored).unwrap();

        let target = temp_dir.path().join("restored");
        extract_one(&stored, Path::new("sub/b.txt"), &target).unwrap();
        assert_eq!(fs::read_to_string(target.join("sub/b.txt")).unwrap(), "y");
        assert!(!target.join("a.txt").exists());
    }

    #[test]
    fn test_extract_one_missing_entry() {
        let temp_dir = TempDir::new().unwrap();
        let stored = temp_dir.path().join("backup_2024-01-01_00-00-00");
        fs::create_dir_all(&stored).unwrap();

        assert!(matches!(
            extract_one(&stored, Path::new("nope.txt"), temp_dir.path()),
            Err(Error::EntryNotFound { .. })
        ));
    }

    #[test]
    fn test_extract_one_rejects_unsafe_entry() {
        let temp_dir = TempDir::new().unwrap();
        let stored = temp_dir.path().join("backup_2024-01-01_00-00-00");
        fs::create_dir_all(&stored).unwrap();

        assert!(matches!(
            extract_one(&stored, Path::new("/etc/passwd"), temp_dir.path()),
            Err(Error::UnsafeEntryPath(_))
        ));
    }
}
