//! Gzip-compressed tar snapshots.
//!
//! A build enumerates the source tree up front to know the total byte size,
//! then streams every regular file into the archive with byte-scaled progress
//! feedback. Per-file failures are logged and skipped; only errors on the
//! archive itself abort the build.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::storage::ensure_relative;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, IntoInnerError};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{error, info, warn};
use walkdir::WalkDir;

pub fn build(src_dir: &Path, dst_path: &Path) -> Result<()> {
    let files = collect_files(src_dir);
    let total_size: u64 = files.iter().map(|(_, size)| size).sum();
    info!(
        "Archiving {} files ({} bytes) from {:?} to {:?}",
        files.len(),
        total_size,
        src_dir,
        dst_path
    );

    // Written to a .tmp sibling first so a failed build never leaves a
    // half-written archive under its final name.
    let tmp_path = dst_path.with_file_name(format!(
        "{}.tmp",
        dst_path.file_name().unwrap_or_default().to_string_lossy()
    ));

    let res = write_archive(src_dir, &tmp_path, &files, total_size)
        .and_then(|_| fs::rename(&tmp_path, dst_path).map_err(Error::from));
    if res.is_err() {
        if let Err(e) = fs::remove_file(&tmp_path) {
            warn!("Removing temporary archive {:?} failed: {}", tmp_path, e);
        }
    }
    res
}

/// Every regular file under `src_dir` with its size. Files that vanish or
/// cannot be statted between enumeration and size-read are skipped.
fn collect_files(src_dir: &Path) -> Vec<(PathBuf, u64)> {
    WalkDir::new(src_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|res| match res {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry under {:?}: {}", src_dir, e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| match entry.metadata() {
            Ok(md) => Some((entry.into_path(), md.len())),
            Err(_) => None,
        })
        .collect()
}

fn write_archive(
    src_dir: &Path,
    tmp_path: &Path,
    files: &[(PathBuf, u64)],
    total_size: u64,
) -> Result<()> {
    let mut writer = File::create_new(tmp_path)
        .map(BufWriter::new)
        .map(|f| GzEncoder::new(f, Compression::default()))
        .map(tar::Builder::new)?;
    writer.follow_symlinks(false);

    let progress = ProgressBar::new(total_size);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    for (path, size) in files {
        let rel = path.strip_prefix(src_dir)?;
        match writer.append_path_with_name(path, rel) {
            Ok(()) => {
                progress.inc(*size);
                progress.set_message(rel.display().to_string());
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!("Access denied: {:?}", path);
            }
            Err(e) => {
                error!("Failed to add {:?} to archive: {}", path, e);
            }
        }
    }
    progress.finish_and_clear();

    writer
        .into_inner()?
        .finish()?
        .into_inner()
        .map_err(IntoInnerError::into_error)?;

    Ok(())
}

pub fn list_entries(archive_path: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = open_archive(archive_path)?;
    archive
        .entries()?
        .map(|entry| Ok(entry?.path()?.into_owned()))
        .collect()
}

pub fn extract_all(archive_path: &Path, target_root: &Path) -> Result<()> {
    fs::create_dir_all(target_root)?;

    // Pre-create every directory named in the archive index so extraction
    // never fails on a missing parent.
    let mut archive = open_archive(archive_path)?;
    for entry in archive.entries()? {
        let entry = entry?;
        if entry.header().entry_type().is_dir() {
            let rel = entry.path()?.into_owned();
            ensure_relative(&rel)?;
            fs::create_dir_all(target_root.join(rel))?;
        }
    }

    let mut archive = open_archive(archive_path)?;
    archive.unpack(target_root)?;
    Ok(())
}

pub fn extract_one(archive_path: &Path, entry_path: &Path, target_root: &Path) -> Result<()> {
    ensure_relative(entry_path)?;
    fs::create_dir_all(target_root)?;
    let mut archive = open_archive(archive_path)?;
    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.path()? == entry_path {
            entry.unpack_in(target_root)?;
            return Ok(());
        }
    }
    Err(Error::EntryNotFound {
        backup: archive_path.to_path_buf(),
        entry: entry_path.to_path_buf(),
    })
}

fn open_archive(archive_path: &Path) -> Result<Archive<GzDecoder<BufReader<File>>>> {
    let file = File::open(archive_path)?;
    Ok(Archive::new(GzDecoder::new(BufReader::new(file))))
}
