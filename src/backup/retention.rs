//! Age-based retention: deletes snapshots older than the configured horizon.

use crate::backup::notifications::Notification;
use crate::backup::record::parse_backup_name;
use crate::backup::result_error::result::Result;
use bon::Builder;
use chrono::{Duration, NaiveDateTime};
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, trace, warn};

/// A snapshot is expired iff its age is strictly greater than the horizon.
/// Applied independently per owner; owners are never compared against each
/// other.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Builder, Getters, PartialEq, Eq)]
#[getset(get = "pub")]
pub struct RetentionPolicy {
    retention_days: u32,
}

impl RetentionPolicy {
    pub fn new(retention_days: u32) -> Self {
        Self { retention_days }
    }

    pub fn is_expired(&self, timestamp: NaiveDateTime, now: NaiveDateTime) -> bool {
        now.signed_duration_since(timestamp) > Duration::days(self.retention_days as i64)
    }
}

/// Deletes every expired snapshot under `<mount>/<host>/*/*`, returning the
/// deleted paths.
///
/// The timestamp parsed from the entry name is the sole source of age;
/// entries whose names do not parse are foreign files and are silently left
/// alone. Deletion matches the entry's actual filesystem kind, so a
/// tampered-with record (archive replaced by a directory or vice versa) is
/// still removed. Repeated sweeps over an already-clean tree delete
/// nothing.
pub fn sweep<P, N>(
    mount_point: P,
    host: &str,
    policy: RetentionPolicy,
    notifier: &N,
    now: NaiveDateTime,
) -> Result<Vec<PathBuf>>
where
    P: AsRef<Path>,
    N: Notification,
{
    let host_dir = mount_point.as_ref().join(host);
    if !host_dir.exists() {
        return Ok(Vec::new());
    }

    let mut deleted = Vec::new();
    for owner_entry in fs::read_dir(&host_dir)? {
        let owner_dir = owner_entry?.path();
        if !owner_dir.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&owner_dir)? {
            let entry_path = entry?.path();
            let name = match entry_path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            let timestamp = match parse_backup_name(name) {
                Some((timestamp, _)) => timestamp,
                None => {
                    trace!("Skipping {:?}, not a backup name", entry_path);
                    continue;
                }
            };
            if !policy.is_expired(timestamp, now) {
                continue;
            }

            match delete_entry(&entry_path) {
                Ok(()) => {
                    info!("Deleted expired backup {:?}", entry_path);
                    if let Err(e) = notifier.send(format!("🟡 Deleted old backup: {}", entry_path.display())) {
                        warn!("Failed to send notification: {}", e);
                    }
                    deleted.push(entry_path);
                }
                Err(e) => {
                    error!("Failed to delete expired backup {:?}: {}", entry_path, e);
                }
            }
        }
    }
    Ok(deleted)
}

/// Removes a file or symlink directly, a directory tree recursively.
fn delete_entry(path: &Path) -> std::io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
