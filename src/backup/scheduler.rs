//! Background daily trigger for backup + rotation.
//!
//! One worker thread sleeps until the next occurrence of the configured
//! time-of-day or until the stop signal, whichever comes first. The stop
//! channel doubles as the cancellable sleep: `recv_timeout` wakes early the
//! moment `stop` sends. The signal is one-shot; reconfiguring the daily time
//! means stopping this instance and starting a new one.

use crate::backup::manager::BackupManager;
use crate::backup::notifications::Notification;
use chrono::{Duration, Local, NaiveDateTime, NaiveTime};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info};

pub struct Scheduler {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawns the worker; it waits for the next occurrence of `daily_time`
    /// (today if still ahead, else tomorrow) before its first run.
    pub fn start<N>(manager: Arc<BackupManager<N>>, daily_time: NaiveTime) -> Scheduler
    where
        N: Notification + Send + Sync + 'static,
    {
        let (stop_tx, stop_rx) = channel();
        let handle = std::thread::spawn(move || run_loop(manager, daily_time, stop_rx));
        Scheduler {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signals the worker and blocks until its thread has exited, so no
    /// timer outlives a reconfiguration or process shutdown. A worker in the
    /// middle of a backup finishes that cycle first.
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Blocks until the worker exits on its own; used by the daemon mode,
    /// which runs until the process is killed.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_loop<N: Notification>(
    manager: Arc<BackupManager<N>>,
    daily_time: NaiveTime,
    stop_rx: Receiver<()>,
) {
    loop {
        let now = Local::now().naive_local();
        let deadline = next_occurrence(now, daily_time);
        let wait = (deadline - now).to_std().unwrap_or_default();
        info!("Next scheduled backup at {}", deadline);

        match stop_rx.recv_timeout(wait) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                info!("Scheduler stopped");
                return;
            }
            Err(RecvTimeoutError::Timeout) => {
                // a failed cycle must not kill the loop; the next deadline
                // is computed fresh after the run completes
                info!("Scheduled backup triggered");
                if let Err(e) = manager.backup_homes() {
                    error!("Scheduled backup failed: {}", e);
                }
                if let Err(e) = manager.rotate_backups() {
                    error!("Scheduled rotation failed: {}", e);
                }
            }
        }
    }
}

/// Next occurrence of `at`: today if not yet passed, otherwise tomorrow.
fn next_occurrence(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if now < today {
        today
    } else {
        today + Duration::days(1)
    }
}
