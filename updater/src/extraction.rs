//! Archive extraction for downloaded packages.
//!
//! Three container formats are understood: zip, gzip-compressed tar, and
//! zstd-compressed tar. Entry paths are checked before anything is written,
//! so an archive can only ever populate its destination directory.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// Unpacks one container format into a directory.
///
/// # Examples
///
/// ```
/// use modsync_updater::extraction::{ArchiveExtractor, TarGzExtractor};
///
/// assert!(TarGzExtractor.extensions().contains(&"tgz"));
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Lower-case file extensions this extractor understands.
    fn extensions(&self) -> &'static [&'static str];

    /// Unpack `archive_path` below `dest_dir` and return the archive-relative
    /// paths of the regular files written, in archive order.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] for an entry that would
    /// land outside `dest_dir`, [`ExtractionError::LinkEntry`] for a tar
    /// link entry, and [`ExtractionError::EmptyArchive`] when
    /// the archive holds no regular files. Container and I/O failures map to
    /// [`ExtractionError::Zip`] and [`ExtractionError::Io`].
    fn extract(&self, archive_path: &Path, dest_dir: &Path)
    -> Result<Vec<PathBuf>, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// Reading the archive or writing an entry failed.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container is malformed.
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An entry path is absolute or climbs out of the destination.
    #[error("archive entry {path} escapes the extraction directory")]
    PathTraversal {
        /// The entry path as stored in the archive.
        path: String,
    },

    /// A tar entry is a symbolic or hard link.
    #[error("archive entry {path} is a link")]
    LinkEntry {
        /// The entry path as stored in the archive.
        path: String,
    },

    /// Nothing but directories, or nothing at all.
    #[error("archive contains no files")]
    EmptyArchive,
}

/// `.zip` archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extensions(&self) -> &'static [&'static str] {
        &["zip"]
    }

    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;
        let mut dest = Destination::new(dest_dir);
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let raw = PathBuf::from(entry.name());
            if let Some(target) = dest.prepare(&raw, entry.is_dir())? {
                std::io::copy(&mut entry, &mut File::create(target)?)?;
            }
        }
        dest.finish()
    }
}

/// Gzip-compressed tarballs (`.tgz`, `.tar.gz`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn extensions(&self) -> &'static [&'static str] {
        &["tgz", "gz"]
    }

    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        unpack_tar(
            flate2::read::GzDecoder::new(File::open(archive_path)?),
            dest_dir,
        )
    }
}

/// Zstd-compressed tarballs (`.tar.zst`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TarZstdExtractor;

impl ArchiveExtractor for TarZstdExtractor {
    fn extensions(&self) -> &'static [&'static str] {
        &["zst"]
    }

    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        unpack_tar(zstd::Decoder::new(File::open(archive_path)?)?, dest_dir)
    }
}

fn unpack_tar(reader: impl Read, dest_dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    let mut dest = Destination::new(dest_dir);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw = entry.path()?.into_owned();
        let kind = entry.header().entry_type();
        if kind.is_symlink() || kind.is_hard_link() {
            return Err(ExtractionError::LinkEntry {
                path: raw.display().to_string(),
            });
        }
        if !kind.is_file() && !kind.is_dir() {
            log::debug!("skipping special tar entry {}", raw.display());
            continue;
        }
        if dest.prepare(&raw, kind.is_dir())?.is_some() && !entry.unpack_in(dest.root)? {
            return Err(ExtractionError::PathTraversal {
                path: raw.display().to_string(),
            });
        }
    }
    dest.finish()
}

/// The directory an archive is unpacked into, plus the files written so
/// far.
struct Destination<'a> {
    root: &'a Path,
    files: Vec<PathBuf>,
}

impl<'a> Destination<'a> {
    const fn new(root: &'a Path) -> Self {
        Self {
            root,
            files: Vec::new(),
        }
    }

    /// Create whatever `raw` needs on disk. Returns the target path for a
    /// regular file, `None` for a directory.
    fn prepare(&mut self, raw: &Path, is_dir: bool) -> Result<Option<PathBuf>, ExtractionError> {
        let relative = contained(raw)?;
        let target = self.root.join(&relative);
        if is_dir {
            fs::create_dir_all(&target)?;
            return Ok(None);
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        self.files.push(relative);
        Ok(Some(target))
    }

    fn finish(self) -> Result<Vec<PathBuf>, ExtractionError> {
        if self.files.is_empty() {
            Err(ExtractionError::EmptyArchive)
        } else {
            Ok(self.files)
        }
    }
}

/// `raw` with `.` components dropped, provided it stays below the
/// extraction root.
fn contained(raw: &Path) -> Result<PathBuf, ExtractionError> {
    let escapes = || ExtractionError::PathTraversal {
        path: raw.display().to_string(),
    };
    let mut relative = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(escapes());
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(escapes());
    }
    Ok(relative)
}
