//! Moving files into the host tree with backup-on-collision.
//!
//! Every file that would be overwritten is first moved to
//! `<backup_dir>/<session stamp>/<root-relative path>`. Moves fall back to
//! copy-then-delete when source and destination are on different devices.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::InstallOutcome;
use crate::host::{HostLayout, IdentityReader};

/// Destination and backup settings shared by one install call.
#[derive(Clone, Copy)]
pub struct Placement<'a> {
    /// Host directories.
    pub layout: &'a HostLayout,
    /// Session backup folder name.
    pub stamp: &'a str,
}

impl Placement<'_> {
    /// Move `source` to `dest`, backing up whatever is at `dest`.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error; a failed move leaves any backup in
    /// place.
    pub fn place_file(&self, source: &Path, dest: &Path) -> io::Result<()> {
        if dest.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a directory", dest.display()),
            ));
        }
        if dest.exists() {
            self.backup(dest)?;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        move_file(source, dest)
    }

    /// Move `source` and its identity companions into `dest`.
    ///
    /// Companions keep their file names and land next to `dest`.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error.
    pub fn place_with_companions(
        &self,
        source: &Path,
        dest: &Path,
        identities: &dyn IdentityReader,
    ) -> io::Result<()> {
        let companions = identities.companions(source);
        for stale in identities.companions(dest) {
            self.backup(&stale)?;
        }
        self.place_file(source, dest)?;
        for companion in companions {
            if let (Some(name), Some(dir)) = (companion.file_name(), dest.parent()) {
                self.place_file(&companion, &dir.join(name))?;
            }
        }
        Ok(())
    }

    /// Move `target` (and nothing else) into the session backup folder.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error.
    pub fn backup(&self, target: &Path) -> io::Result<PathBuf> {
        let backup = self.layout.backup_path(self.stamp, target);
        if let Some(parent) = backup.parent() {
            fs::create_dir_all(parent)?;
        }
        if backup.exists() {
            // Keep the copy taken first in this session.
            fs::remove_file(target)?;
        } else {
            move_file(target, &backup)?;
        }
        log::info!("backed up {} to {}", target.display(), backup.display());
        Ok(backup)
    }

    /// Move `source` to `dest` as one counted file.
    #[must_use]
    pub fn place_counted(&self, source: &Path, dest: &Path) -> InstallOutcome {
        match self.place_file(source, dest) {
            Ok(()) => {
                log::debug!("installed {}", dest.display());
                InstallOutcome::success()
            }
            Err(e) => {
                log::error!("failed to install {}: {e}", dest.display());
                InstallOutcome::failure()
            }
        }
    }
}

/// Paths of every regular file below `dir`, relative to it, depth first
/// with siblings in name order. Symbolic links are not followed.
///
/// # Errors
///
/// Returns the first error hit while walking.
pub fn files_below(dir: &Path) -> walkdir::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(dir) {
            files.push(relative.to_owned());
        }
    }
    Ok(files)
}

fn move_file(source: &Path, dest: &Path) -> io::Result<()> {
    if fs::rename(source, dest).is_ok() {
        return Ok(());
    }
    fs::copy(source, dest)?;
    fs::remove_file(source)
}
