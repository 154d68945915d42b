//! Enumeration of stored snapshots for one host.

use crate::backup::record::BackupRecord;
use crate::backup::result_error::result::Result;
use itertools::Itertools;
use std::fs;
use std::path::Path;

/// All backup records under `<mount>/<host>/*/*`, sorted lexicographically
/// by backup name, which is chronological order because the embedded
/// timestamp is zero-padded. A host directory that does not exist yet
/// yields an empty list, not an error. Entries whose names do not parse as
/// backup names are not records and are omitted.
pub fn list_backups<P: AsRef<Path>>(mount_point: P, host: &str) -> Result<Vec<BackupRecord>> {
    let host_dir = mount_point.as_ref().join(host);
    if !host_dir.exists() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for owner_entry in fs::read_dir(&host_dir)? {
        let owner_entry = owner_entry?;
        if !owner_entry.file_type()?.is_dir() {
            continue;
        }
        let owner = owner_entry.file_name().to_string_lossy().into_owned();
        for entry in fs::read_dir(owner_entry.path())? {
            let entry = entry?;
            if let Some(record) = BackupRecord::from_stored_entry(host, &owner, entry.path()) {
                records.push(record);
            }
        }
    }

    Ok(records
        .into_iter()
        .sorted_by_key(BackupRecord::backup_name)
        .collect())
}
