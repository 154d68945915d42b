//! Active-mount verification for the backup destination.
//!
//! The storage root is expected to be a network mount. Writing while it is
//! not mounted would silently land on the local disk the mount overlays, so
//! every backup run verifies the mount first and aborts without touching
//! storage when the check fails.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Passed down to the backup manager instead of being probed ad hoc, so
/// tests can substitute a permissive guard for tempdir-backed storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MountGuard {
    /// Require the storage root to be an active mount point.
    #[default]
    ActiveMount,
    /// Skip the check entirely.
    AssumeMounted,
}

impl MountGuard {
    pub fn verify<P: AsRef<Path>>(&self, mount_point: P) -> Result<()> {
        let mount_point = mount_point.as_ref();
        match self {
            MountGuard::AssumeMounted => Ok(()),
            MountGuard::ActiveMount => {
                if is_mount_point(mount_point)? {
                    Ok(())
                } else {
                    Err(Error::MountNotActive(mount_point.to_path_buf()))
                }
            }
        }
    }
}

/// Checks `/proc/self/mounts` for the canonicalized path, falling back to a
/// device-id comparison with the parent directory where procfs is absent.
pub fn is_mount_point<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(false);
    }
    let canonical = fs::canonicalize(path)?;

    match fs::read_to_string("/proc/self/mounts") {
        Ok(contents) => {
            for line in contents.lines() {
                let mut fields = line.split_whitespace();
                let target = fields.nth(1);
                if target.map(unescape_mount_target) == Some(canonical.clone()) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Err(_) => {
            let parent = match canonical.parent() {
                Some(parent) => parent,
                // filesystem root is always a mount point
                None => return Ok(true),
            };
            Ok(fs::metadata(&canonical)?.dev() != fs::metadata(parent)?.dev())
        }
    }
}

/// Mount targets in `/proc/self/mounts` carry whitespace and backslashes as
/// three-digit octal escapes (a space is `\040`).
fn unescape_mount_target(field: &str) -> PathBuf {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let digits: String = chars.clone().take(3).collect();
            if digits.len() == 3 {
                if let Ok(byte) = u8::from_str_radix(&digits, 8) {
                    out.push(byte as char);
                    chars.nth(2);
                    continue;
                }
            }
        }
        out.push(c);
    }
    PathBuf::from(out)
}
