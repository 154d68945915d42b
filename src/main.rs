use clap::{Parser, Subcommand};
use homevault::backup::manager::BackupManager;
use homevault::backup::record::BackupRecord;
use homevault::backup::result_error::error::Error;
use homevault::backup::result_error::result::Result;
use homevault::backup::scheduler::Scheduler;
use homevault::backup::settings::Settings;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use tracing::error;
use validator::Validate;

/// Scheduled home-directory backups with rotation, restore, and search
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of the settings file (created with defaults if absent)
    #[arg(short, long, default_value = "backup_config.yml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Back up every home directory now, then rotate old backups
    Backup,
    /// Run one backup + rotation cycle and exit (for cron/systemd)
    Service,
    /// Start the daily scheduler and block
    Daemon,
    /// List stored backups, oldest first
    List {
        /// Only show backups for this owner
        #[arg(short, long)]
        owner: Option<String>,
    },
    /// Restore a whole backup into the owner's home directory
    Restore {
        /// Backup number as printed by `list`
        index: usize,
    },
    /// Restore a single file from a backup
    RestoreFile {
        /// Backup number as printed by `list`
        index: usize,
        /// Entry path inside the backup, relative to the home directory
        entry: PathBuf,
    },
    /// Search entry paths inside a backup
    Search {
        /// Backup number as printed by `list`
        index: usize,
        /// Case-sensitive substring to match
        query: String,
    },
    /// Set the daily backup time
    Schedule { hour: u8, minute: u8 },
    /// Change one setting by its key name
    Set { key: String, value: String },
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        error!("{e}");
        exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut settings = Settings::load(&args.config)?;
    settings.validate()?;

    match args.command {
        Command::Backup | Command::Service => {
            let manager = BackupManager::from_settings(&settings)?;
            manager.backup_homes()?;
            manager.rotate_backups()?;
        }
        Command::Daemon => {
            let manager = Arc::new(BackupManager::from_settings(&settings)?);
            Scheduler::start(manager, settings.backup_time()).join();
        }
        Command::List { owner } => {
            let manager = BackupManager::from_settings(&settings)?;
            for (idx, record) in manager.list_backups()?.iter().enumerate() {
                if owner.as_deref().map_or(true, |o| o == record.owner()) {
                    println!("{}. {} {}", idx + 1, record.owner(), record.backup_name());
                }
            }
        }
        Command::Restore { index } => {
            let manager = BackupManager::from_settings(&settings)?;
            let record = select_record(&manager, index)?;
            manager.restore_backup(&record)?;
        }
        Command::RestoreFile { index, entry } => {
            let manager = BackupManager::from_settings(&settings)?;
            let record = select_record(&manager, index)?;
            manager.restore_file(&record, &entry)?;
        }
        Command::Search { index, query } => {
            let manager = BackupManager::from_settings(&settings)?;
            let record = select_record(&manager, index)?;
            for entry in manager.search(&record, &query) {
                println!("{}", entry.display());
            }
        }
        Command::Schedule { hour, minute } => {
            settings.set("backup_hour", &hour.to_string())?;
            settings.set("backup_minute", &minute.to_string())?;
            settings.save(&args.config)?;
            println!("Daily backup time set to {:02}:{:02}", hour, minute);
        }
        Command::Set { key, value } => {
            settings.set(&key, &value)?;
            settings.save(&args.config)?;
            println!("{key} = {value}");
        }
    }

    Ok(())
}

/// Resolves a 1-based index from `list` output into a record.
fn select_record(manager: &BackupManager, index: usize) -> Result<BackupRecord> {
    let records = manager.list_backups()?;
    index
        .checked_sub(1)
        .and_then(|i| records.into_iter().nth(i))
        .ok_or(Error::NoSuchBackup(index))
}
