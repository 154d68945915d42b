//! Snapshot identity: storage kinds and the timestamped naming scheme.
//!
//! Every stored snapshot lives at `<mount>/<host>/<owner>/backup_<ts>[.tar.gz]`.
//! The timestamp embedded in the name is the sole source of truth for a
//! snapshot's age; there is no separate metadata file.

use bon::Builder;
use chrono::NaiveDateTime;
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Second-resolution, zero-padded, so lexicographic name order is chronological.
pub static TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
pub static BACKUP_PREFIX: &str = "backup_";
pub static ARCHIVE_SUFFIX: &str = ".tar.gz";

/// How a snapshot is materialized on the storage mount.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// A single gzip-compressed tar file.
    Archive,
    /// A plain directory copy of the source tree.
    MirroredTree,
}

impl StorageKind {
    pub fn from_compress_flag(compress: bool) -> Self {
        if compress {
            StorageKind::Archive
        } else {
            StorageKind::MirroredTree
        }
    }

    /// Name suffix is the only on-disk marker distinguishing the kinds.
    pub fn suffix(&self) -> &'static str {
        match self {
            StorageKind::Archive => ARCHIVE_SUFFIX,
            StorageKind::MirroredTree => "",
        }
    }

    pub fn backup_name(&self, timestamp: NaiveDateTime) -> String {
        format!(
            "{}{}{}",
            BACKUP_PREFIX,
            timestamp.format(TIMESTAMP_FORMAT),
            self.suffix()
        )
    }
}

/// Parses a stored entry name back into its creation time and storage kind.
///
/// Returns `None` for anything that does not follow the naming scheme, so
/// foreign files coexisting in a backup directory are simply not records.
pub fn parse_backup_name(name: &str) -> Option<(NaiveDateTime, StorageKind)> {
    let rest = name.strip_prefix(BACKUP_PREFIX)?;
    let (rest, kind) = match rest.strip_suffix(ARCHIVE_SUFFIX) {
        Some(stripped) => (stripped, StorageKind::Archive),
        None => (rest, StorageKind::MirroredTree),
    };
    NaiveDateTime::parse_from_str(rest, TIMESTAMP_FORMAT)
        .ok()
        .map(|ts| (ts, kind))
}

/// One stored snapshot: created by the backup run, read by catalog, restore
/// and search, deleted only by rotation.
#[derive(Clone, Debug, Builder, Getters, PartialEq, Eq)]
#[getset(get = "pub")]
pub struct BackupRecord {
    #[builder(into)]
    owner: String,
    #[builder(into)]
    host: String,
    timestamp: NaiveDateTime,
    kind: StorageKind,
    #[builder(into)]
    path: PathBuf,
}

impl BackupRecord {
    /// Builds a record from one entry of an owner's backup directory,
    /// or `None` if the entry name does not parse as a backup name.
    pub fn from_stored_entry<S1, S2, P>(host: S1, owner: S2, path: P) -> Option<BackupRecord>
    where
        S1: Into<String>,
        S2: Into<String>,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let name = path.file_name()?.to_str()?;
        let (timestamp, kind) = parse_backup_name(name)?;
        Some(
            BackupRecord::builder()
                .host(host.into())
                .owner(owner.into())
                .timestamp(timestamp)
                .kind(kind)
                .path(path)
                .build(),
        )
    }

    /// The timestamped file or directory name on storage.
    pub fn backup_name(&self) -> String {
        self.kind.backup_name(self.timestamp)
    }
}
