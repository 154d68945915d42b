//! Persisted key/value settings for the backup service.
//!
//! Loaded from a YAML file; a default file is written out on first load so a
//! fresh install always has an editable config on disk.

use crate::backup::record::StorageKind;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use crate::backup::validate::validate_webhook_url;
use bon::Builder;
use chrono::NaiveTime;
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use validator::Validate;

#[derive(Clone, Serialize, Deserialize, Debug, Validate, Builder, Getters, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
#[getset(get = "pub")]
pub struct Settings {
    /// Root of the backup storage; must be an active mount at write time.
    #[builder(into)]
    nfs_mount_point: PathBuf,
    /// Snapshots older than this many days are deleted by rotation.
    retention_days: u32,
    #[validate(range(max = 23))]
    backup_hour: u8,
    #[validate(range(max = 59))]
    backup_minute: u8,
    /// Empty disables notifications.
    #[validate(custom(function = validate_webhook_url))]
    #[builder(into)]
    discord_webhook_url: String,
    /// Selects Archive (.tar.gz) over MirroredTree storage.
    compress_backups: bool,
    /// Directory whose immediate subdirectories are the per-user homes.
    #[builder(into)]
    home_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::builder()
            .nfs_mount_point("/mnt/backup")
            .retention_days(7)
            .backup_hour(2)
            .backup_minute(0)
            .discord_webhook_url("")
            .compress_backups(false)
            .home_root("/home")
            .build()
    }
}

impl Settings {
    /// Reads settings from `path`, writing and returning the defaults if no
    /// file exists there yet.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Settings> {
        let path = path.as_ref();
        if !path.exists() {
            let defaults = Settings::default();
            defaults
                .save(path)
                .add_msg(format!("Writing default config {path:?} failed"))?;
            info!("Wrote default config to {:?}", path);
            return Ok(defaults);
        }

        File::open(path)
            .map_err(Error::from)
            .and_then(|f| serde_yml::from_reader::<_, Settings>(f).map_err(Error::from))
            .add_msg(format!("Parse YAML config failed: {path:?}"))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_yml::to_writer(file, self)?;
        Ok(())
    }

    /// Updates one setting by its persisted key name. The new value is
    /// validated before the update is accepted.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();
        match key {
            "nfs_mount_point" => updated.nfs_mount_point = PathBuf::from(value),
            "retention_days" => updated.retention_days = parse_value(key, value)?,
            "backup_hour" => updated.backup_hour = parse_value(key, value)?,
            "backup_minute" => updated.backup_minute = parse_value(key, value)?,
            "discord_webhook_url" => updated.discord_webhook_url = value.to_string(),
            "compress_backups" => updated.compress_backups = parse_value(key, value)?,
            "home_root" => updated.home_root = PathBuf::from(value),
            _ => return Err(Error::UnknownSetting(key.to_string())),
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn storage_kind(&self) -> StorageKind {
        StorageKind::from_compress_flag(self.compress_backups)
    }

    /// Daily trigger time for the scheduler.
    pub fn backup_time(&self) -> NaiveTime {
        // validated to hour <= 23 and minute <= 59
        NaiveTime::from_hms_opt(self.backup_hour as u32, self.backup_minute as u32, 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| Error::InvalidSettingValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_writes_defaults_when_absent() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("backup_config.yml");

        let settings = Settings::load(&config_path).unwrap();
        assert!(config_path.is_file());
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.retention_days(), &7);
        assert_eq!(settings.nfs_mount_point(), &PathBuf::from("/mnt/backup"));

        // Second load reads the written file back unchanged
        let reloaded = Settings::load(&config_path).unwrap();
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("backup_config.yml");

        let mut settings = Settings::default();
        settings.set("retention_days", "30").unwrap();
        settings.set("compress_backups", "true").unwrap();
        settings
            .set("discord_webhook_url", "https://discord.com/api/webhooks/1/a")
            .unwrap();
        settings.save(&config_path).unwrap();

        let reloaded = Settings::load(&config_path).unwrap();
        assert_eq!(reloaded, settings);
        assert_eq!(reloaded.storage_kind(), StorageKind::Archive);
    }

    #[test]
    fn test_set_rejects_unknown_key() {
        let mut settings = Settings::default();
        match settings.set("no_such_key", "1") {
            Err(Error::UnknownSetting(key)) => assert_eq!(key, "no_such_key"),
            other => panic!("Expected UnknownSetting, got {other:?}"),
        }
    }

    #[test]
    fn test_set_rejects_bad_value() {
        let mut settings = Settings::default();
        assert!(settings.set("retention_days", "soon").is_err());
        assert!(settings.set("compress_backups", "maybe").is_err());
        // failed updates leave settings untouched
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_set_validates_schedule_range() {
        let mut settings = Settings::default();
        assert!(settings.set("backup_hour", "24").is_err());
        assert!(settings.set("backup_minute", "60").is_err());
        settings.set("backup_hour", "23").unwrap();
        settings.set("backup_minute", "59").unwrap();
        assert_eq!(
            settings.backup_time(),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap()
        );
    }

    #[test]
    fn test_defaults_validate() {
        assert!(Settings::default().validate().is_ok());
    }
}
