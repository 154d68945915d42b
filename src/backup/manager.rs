//! The backup lifecycle engine: per-user snapshot creation, rotation,
//! catalog access, restore, and in-snapshot search.
//!
//! One manager instance is shared between the foreground caller and the
//! background scheduler. There is deliberately no lock between a manual and
//! a scheduled run; both drive the same storage tree.

use crate::backup::catalog;
use crate::backup::mount::MountGuard;
use crate::backup::notifications::{Notification, Notifier};
use crate::backup::record::{BackupRecord, StorageKind};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use crate::backup::retention::{self, RetentionPolicy};
use crate::backup::settings::Settings;
use bon::Builder;
use chrono::{Local, Timelike};
use getset::Getters;
use itertools::Itertools;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Builder, Getters)]
#[getset(get = "pub")]
pub struct BackupManager<N = Notifier> {
    /// Storage root; must be an active mount when a backup run starts.
    #[builder(into)]
    mount_point: PathBuf,
    /// Namespace segment for this machine under the storage root.
    #[builder(into)]
    host: String,
    /// Directory whose immediate subdirectories are the per-user homes.
    #[builder(into)]
    home_root: PathBuf,
    retention: RetentionPolicy,
    kind: StorageKind,
    notifier: N,
    #[builder(default)]
    mount_guard: MountGuard,
}

impl BackupManager<Notifier> {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let host = hostname::get()?.to_string_lossy().into_owned();
        Ok(BackupManager::builder()
            .mount_point(settings.nfs_mount_point().clone())
            .host(host)
            .home_root(settings.home_root().clone())
            .retention(RetentionPolicy::new(*settings.retention_days()))
            .kind(settings.storage_kind())
            .notifier(Notifier::from_webhook_url(settings.discord_webhook_url()))
            .build())
    }
}

impl<N: Notification> BackupManager<N> {
    /// Snapshots every home directory to `<mount>/<host>/<owner>/`.
    ///
    /// The whole run shares one timestamp, taken at the start. The mount is
    /// verified before anything is written; a failed check aborts with zero
    /// new files under any owner. A single owner's failure also aborts the
    /// run, so owners after it receive no backup for this invocation.
    /// One notification is sent per owner, success or failure.
    pub fn backup_homes(&self) -> Result<Vec<BackupRecord>> {
        let now = Local::now().naive_local();
        let now = now.with_nanosecond(0).unwrap_or(now);

        if let Err(e) = self.mount_guard.verify(&self.mount_point) {
            error!("{}", e);
            self.notify(format!(
                "🔴 Backup failed: {} is not an active mount point",
                self.mount_point.display()
            ));
            return Err(e);
        }

        let host_dir = self.mount_point.join(&self.host);
        if let Err(e) = fs::create_dir_all(&host_dir) {
            let e = Error::from(e).add_msg(format!("Creating host directory {host_dir:?} failed"));
            error!("{}", e);
            self.notify(format!("🔴 Backup failed: {}", e));
            return Err(e);
        }

        let mut records = Vec::new();
        for owner in discover_owners(&self.home_root)? {
            let user_home = self.home_root.join(&owner);
            let owner_dir = host_dir.join(&owner);
            let backup_path = owner_dir.join(self.kind.backup_name(now));

            let built = fs::create_dir_all(&owner_dir)
                .map_err(Error::from)
                .and_then(|_| self.kind.build(&user_home, &backup_path));
            match built {
                Ok(()) => {
                    info!("Backup for user {} created at {:?}", owner, backup_path);
                    self.notify(format!(
                        "🟢 Backup for user {} created: {}",
                        owner,
                        backup_path.display()
                    ));
                    records.push(
                        BackupRecord::builder()
                            .owner(owner)
                            .host(self.host.clone())
                            .timestamp(now)
                            .kind(self.kind)
                            .path(backup_path)
                            .build(),
                    );
                }
                Err(e) => {
                    error!("Backup for user {} failed: {}", owner, e);
                    self.notify(format!("🔴 Backup for user {} failed: {}", owner, e));
                    return Err(e.add_msg(format!("Backup for user {owner} failed")));
                }
            }
        }
        Ok(records)
    }

    /// Deletes snapshots older than the retention horizon.
    pub fn rotate_backups(&self) -> Result<Vec<PathBuf>> {
        retention::sweep(
            &self.mount_point,
            &self.host,
            self.retention,
            &self.notifier,
            Local::now().naive_local(),
        )
    }

    /// All stored snapshots for this host, oldest first.
    pub fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        catalog::list_backups(&self.mount_point, &self.host)
    }

    /// Restores a whole snapshot back into the owner's home directory.
    pub fn restore_backup(&self, record: &BackupRecord) -> Result<()> {
        if !record.path().exists() {
            let e = Error::MissingBackup(record.path().clone());
            error!("{}", e);
            self.notify(format!(
                "🔴 Restore failed: backup {} does not exist",
                record.path().display()
            ));
            return Err(e);
        }

        let target = self.home_root.join(record.owner());
        match record.kind().extract_all(record.path(), &target) {
            Ok(()) => {
                info!("Backup {:?} restored to {:?}", record.path(), target);
                self.notify(format!("🟢 Restore complete: {}", record.path().display()));
                Ok(())
            }
            Err(e) => {
                error!("Restore of {:?} failed: {}", record.path(), e);
                self.notify(format!("🔴 Restore failed: {}", e));
                Err(e)
            }
        }
    }

    /// Restores a single entry from a snapshot into the owner's home
    /// directory, creating intermediate directories as needed.
    pub fn restore_file(&self, record: &BackupRecord, entry: &Path) -> Result<()> {
        if !record.path().exists() {
            let e = Error::MissingBackup(record.path().clone());
            error!("{}", e);
            self.notify(format!(
                "🔴 Restore failed: backup {} does not exist",
                record.path().display()
            ));
            return Err(e);
        }

        let target = self.home_root.join(record.owner());
        match record.kind().extract_one(record.path(), entry, &target) {
            Ok(()) => {
                info!("Restored {:?} from {:?}", entry, record.path());
                self.notify(format!(
                    "🟢 File {} restored from {}",
                    entry.display(),
                    record.path().display()
                ));
                Ok(())
            }
            Err(e) => {
                error!("Restoring {:?} from {:?} failed: {}", entry, record.path(), e);
                self.notify(format!("🔴 File restore failed: {}", e));
                Err(e)
            }
        }
    }

    /// Entry paths in the snapshot containing `query` (case-sensitive), in
    /// listing order. A listing failure is logged and yields no matches.
    pub fn search(&self, record: &BackupRecord, query: &str) -> Vec<PathBuf> {
        match record.kind().list_entries(record.path()) {
            Ok(entries) => entries
                .into_iter()
                .filter(|entry| entry.to_string_lossy().contains(query))
                .collect(),
            Err(e) => {
                error!("Listing entries of {:?} failed: {}", record.path(), e);
                Vec::new()
            }
        }
    }

    fn notify<D: Display>(&self, msg: D) {
        if let Err(e) = self.notifier.send(msg) {
            warn!("Failed to send notification: {}", e);
        }
    }
}

/// Home-directory owners, sorted for a deterministic run order.
fn discover_owners(home_root: &Path) -> Result<Vec<String>> {
    Ok(fs::read_dir(home_root)
        .map_err(Error::from)
        .add_msg(format!("Listing home root {home_root:?} failed"))?
        .filter_map(|res| res.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .sorted()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::notifications::recorder::RecordingNotifier;
    use crate::backup::record::parse_backup_name;
    use tempfile::TempDir;

    fn make_homes(home_root: &Path) {
        for owner in ["alice", "bob"] {
            let home = home_root.join(owner);
            fs::create_dir_all(home.join("sub")).unwrap();
            fs::write(home.join("a.txt"), "x").unwrap();
            fs::write(home.join("sub/b.txt"), "y").unwrap();
        }
    }

    fn manager(temp_dir: &TempDir, kind: StorageKind) -> BackupManager<RecordingNotifier> {
        let mount = temp_dir.path().join("mnt");
        let home_root = temp_dir.path().join("home");
        fs::create_dir_all(&mount).unwrap();
        make_homes(&home_root);
        BackupManager::builder()
            .mount_point(mount)
            .host("testhost")
            .home_root(home_root)
            .retention(RetentionPolicy::new(7))
            .kind(kind)
            .notifier(RecordingNotifier::default())
            .mount_guard(MountGuard::AssumeMounted)
            .build()
    }

    #[test]
    fn test_backup_homes_creates_one_snapshot_per_owner() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir, StorageKind::Archive);

        let records = manager.backup_homes().unwrap();
        assert_eq!(records.len(), 2);
        for record in &records {
            assert!(record.path().is_file());
            // stored name parses back to the run timestamp
            let (parsed, _) = parse_backup_name(&record.backup_name()).unwrap();
            assert_eq!(&parsed, record.timestamp());
        }
        // both owners share the run timestamp
        assert_eq!(records[0].timestamp(), records[1].timestamp());
        assert_eq!(manager.notifier().messages().len(), 2);

        let listed = manager.list_backups().unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn test_mount_guard_failure_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = manager(&temp_dir, StorageKind::Archive);
        manager.mount_guard = MountGuard::ActiveMount;

        match manager.backup_homes() {
            Err(Error::MountNotActive(_)) => {}
            other => panic!("Expected MountNotActive, got {other:?}"),
        }
        // zero new files under any owner directory
        let entries: Vec<_> = fs::read_dir(temp_dir.path().join("mnt"))
            .unwrap()
            .collect();
        assert!(entries.is_empty());
        let messages = manager.notifier().messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("🔴"));
    }

    #[test]
    fn test_host_dir_creation_failure_notifies() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir, StorageKind::Archive);
        // a file where the host directory should go makes creation fail
        fs::write(manager.mount_point().join("testhost"), "in the way").unwrap();

        assert!(manager.backup_homes().is_err());
        let messages = manager.notifier().messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("🔴"));
    }

    #[test]
    fn test_fail_fast_aborts_remaining_owners() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir, StorageKind::Archive);
        // a file where alice's backup directory should go makes her build fail
        let host_dir = manager.mount_point().join("testhost");
        fs::create_dir_all(&host_dir).unwrap();
        fs::write(host_dir.join("alice"), "in the way").unwrap();

        assert!(manager.backup_homes().is_err());
        assert!(!host_dir.join("bob").exists());
    }

    #[test]
    fn test_full_restore_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir, StorageKind::MirroredTree);
        let records = manager.backup_homes().unwrap();
        let alice = records.iter().find(|r| r.owner() == "alice").unwrap();

        let damaged = manager.home_root().join("alice/a.txt");
        fs::remove_file(&damaged).unwrap();

        manager.restore_backup(alice).unwrap();
        assert_eq!(fs::read_to_string(&damaged).unwrap(), "x");
    }

    #[test]
    fn test_single_file_restore_from_archive() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir, StorageKind::Archive);
        let records = manager.backup_homes().unwrap();
        let alice = records.iter().find(|r| r.owner() == "alice").unwrap();

        let damaged = manager.home_root().join("alice/sub/b.txt");
        fs::remove_file(&damaged).unwrap();
        fs::remove_dir(manager.home_root().join("alice/sub")).unwrap();

        manager
            .restore_file(alice, Path::new("sub/b.txt"))
            .unwrap();
        assert_eq!(fs::read_to_string(&damaged).unwrap(), "y");
    }

    #[test]
    fn test_restore_missing_backup_is_failure_not_panic() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir, StorageKind::Archive);
        let record = BackupRecord::builder()
            .owner("alice")
            .host("testhost")
            .timestamp(chrono::NaiveDateTime::default())
            .kind(StorageKind::Archive)
            .path(temp_dir.path().join("mnt/testhost/alice/backup_x.tar.gz"))
            .build();

        match manager.restore_backup(&record) {
            Err(Error::MissingBackup(_)) => {}
            other => panic!("Expected MissingBackup, got {other:?}"),
        }
        assert_eq!(manager.notifier().messages().len(), 1);
    }

    #[test]
    fn test_search_is_case_sensitive_substring() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir, StorageKind::Archive);
        let records = manager.backup_homes().unwrap();
        let alice = records.iter().find(|r| r.owner() == "alice").unwrap();

        let matches = manager.search(alice, "b.txt");
        assert_eq!(matches, vec![PathBuf::from("sub/b.txt")]);
        assert!(manager.search(alice, "B.TXT").is_empty());
    }

    #[test]
    fn test_search_listing_failure_yields_empty() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir, StorageKind::Archive);
        let record = BackupRecord::builder()
            .owner("alice")
            .host("testhost")
            .timestamp(chrono::NaiveDateTime::default())
            .kind(StorageKind::Archive)
            .path(temp_dir.path().join("missing.tar.gz"))
            .build();

        assert!(manager.search(&record, "anything").is_empty());
    }

    #[test]
    fn test_rotation_after_backup_keeps_fresh_snapshots() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir, StorageKind::Archive);
        manager.backup_homes().unwrap();

        let deleted = manager.rotate_backups().unwrap();
        assert!(deleted.is_empty());
        assert_eq!(manager.list_backups().unwrap().len(), 2);
    }
}
