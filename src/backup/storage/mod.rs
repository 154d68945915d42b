//! Snapshot materialization, listing, and extraction.
//!
//! The two storage kinds share one interface: `build`, `list_entries`,
//! `extract_all`, `extract_one`, dispatched on [`StorageKind`] rather than by
//! inspecting filename suffixes. Entry names are always relative to the
//! owning user's home directory; restore rebases them under the target home.

pub mod mirror;
pub mod tar_gz;

use crate::backup::record::StorageKind;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use std::path::{Component, Path, PathBuf};

impl StorageKind {
    /// Snapshots `src_dir` to `dst_path`, which must carry this kind's
    /// backup name.
    pub fn build<P1: AsRef<Path>, P2: AsRef<Path>>(&self, src_dir: P1, dst_path: P2) -> Result<()> {
        match self {
            StorageKind::Archive => tar_gz::build(src_dir.as_ref(), dst_path.as_ref()),
            StorageKind::MirroredTree => mirror::build(src_dir.as_ref(), dst_path.as_ref()),
        }
    }

    /// Entry paths inside the snapshot, relative to the snapshotted root,
    /// without extracting anything.
    pub fn list_entries<P: AsRef<Path>>(&self, backup_path: P) -> Result<Vec<PathBuf>> {
        match self {
            StorageKind::Archive => tar_gz::list_entries(backup_path.as_ref()),
            StorageKind::MirroredTree => mirror::list_entries(backup_path.as_ref()),
        }
    }

    /// Reconstructs the whole snapshot under `target_root`.
    pub fn extract_all<P1: AsRef<Path>, P2: AsRef<Path>>(
        &self,
        backup_path: P1,
        target_root: P2,
    ) -> Result<()> {
        match self {
            StorageKind::Archive => {
                tar_gz::extract_all(backup_path.as_ref(), target_root.as_ref())
            }
            StorageKind::MirroredTree => {
                mirror::extract_all(backup_path.as_ref(), target_root.as_ref())
            }
        }
    }

    /// Reconstructs a single entry under `target_root`, creating intermediate
    /// directories as needed.
    pub fn extract_one<P1: AsRef<Path>, P2: AsRef<Path>, P3: AsRef<Path>>(
        &self,
        backup_path: P1,
        entry: P2,
        target_root: P3,
    ) -> Result<()> {
        match self {
            StorageKind::Archive => {
                tar_gz::extract_one(backup_path.as_ref(), entry.as_ref(), target_root.as_ref())
            }
            StorageKind::MirroredTree => {
                mirror::extract_one(backup_path.as_ref(), entry.as_ref(), target_root.as_ref())
            }
        }
    }
}

/// Rejects entry paths that could escape the restore root. Checked before
/// any filesystem write derived from an entry name.
pub fn ensure_relative(entry: &Path) -> Result<()> {
    let safe = !entry.as_os_str().is_empty()
        && entry.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if safe {
        Ok(())
    } else {
        Err(Error::UnsafeEntryPath(entry.to_path_buf()))
    }
}
