//! # homevault
//!
//! An automated home-directory backup tool with rotation, restore, and
//! in-archive search.
//!
//! ## Features
//!
//! - **Scheduled Backups**: Daily background trigger at a configured time
//! - **Per-User Snapshots**: One snapshot per home directory, namespaced by host
//! - **Two Storage Kinds**: Gzip-compressed tar archives or plain mirrored trees
//! - **Retention Management**: Age-based rotation with a configurable horizon
//! - **Restore**: Full snapshot or single-file recovery
//! - **Notifications**: Webhook push on every backup, rotation, and restore outcome
//!
//! ## Quick Start
//!
//! ```no_run
//! use homevault::backup::manager::BackupManager;
//! use homevault::backup::settings::Settings;
//!
//! // Load settings, writing defaults on first run
//! let settings = Settings::load("backup_config.yml")?;
//!
//! // Run one backup + rotation cycle
//! let manager = BackupManager::from_settings(&settings)?;
//! manager.backup_homes()?;
//! manager.rotate_backups()?;
//! # Ok::<(), homevault::backup::result_error::error::Error>(())
//! ```

pub mod backup;
