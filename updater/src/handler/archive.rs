//! Archive packages.
//!
//! The archive is extracted into a private directory under the host's
//! scratch directory, which is removed when installation finishes however it
//! ends. Each top-level entry is then installed on its own:
//!
//! - a folder named after a host category merges into that category's
//!   directory, subject to the package's include/exclude patterns;
//! - any other folder merges wholesale into a same-named folder at the host
//!   root;
//! - a loose file moves into the package directory.
//!
//! Every raw binary, at the top level or inside a merged folder, follows the
//! [`AssemblyHandler`] rules at its destination. Other files are moved as-is.

use std::path::{Path, PathBuf};

use modsync_common::{ProviderDescriptor, SemanticVersion};
use walkdir::WalkDir;

use super::assembly::AssemblyHandler;
use super::placement::{Placement, files_below};
use super::{InstallContext, InstallError, InstallHandler, InstallOutcome, extension_of};
use crate::extraction::{ArchiveExtractor, TarGzExtractor, TarZstdExtractor, ZipExtractor};
use crate::filter::PathFilter;

/// Handler for one archive format.
pub struct ArchiveHandler<E> {
    descriptor: ProviderDescriptor,
    extractor: E,
    assembly: AssemblyHandler,
}

impl ArchiveHandler<ZipExtractor> {
    /// Handler for `.zip` archives.
    #[must_use]
    pub fn zip() -> Self {
        Self::new("Zip archive", ZipExtractor)
    }
}

impl ArchiveHandler<TarGzExtractor> {
    /// Handler for gzip-compressed tarballs.
    #[must_use]
    pub fn tar_gz() -> Self {
        Self::new("Gzip tarball", TarGzExtractor)
    }
}

impl ArchiveHandler<TarZstdExtractor> {
    /// Handler for zstd-compressed tarballs.
    #[must_use]
    pub fn tar_zstd() -> Self {
        Self::new("Zstd tarball", TarZstdExtractor)
    }
}

impl<E: ArchiveExtractor> ArchiveHandler<E> {
    /// Create a handler named `name` around `extractor`.
    #[must_use]
    pub fn new(name: &str, extractor: E) -> Self {
        Self {
            descriptor: ProviderDescriptor::new(
                name,
                "modsync",
                SemanticVersion::new(1, 1, 0),
                "https://github.com/modsync/modsync",
            ),
            extractor,
            assembly: AssemblyHandler::new(),
        }
    }

    fn install_entry(
        &self,
        entry: &Path,
        name: &Path,
        ctx: &mut InstallContext<'_>,
        stamp: &str,
    ) -> Result<InstallOutcome, InstallError> {
        if entry.is_dir() {
            let label = name.to_string_lossy();
            return match ctx.layout.category(&label) {
                Some(category) => {
                    let filter = ctx.filter;
                    self.merge_dir(entry, category.as_std_path(), name, filter, ctx, stamp)
                }
                None => {
                    let dest = ctx.layout.root().as_std_path().join(name);
                    self.merge_dir(entry, &dest, name, &PathFilter::allow_all(), ctx, stamp)
                }
            };
        }

        if !ctx.filter.allows(name) {
            log::debug!("filtered out {}", name.display());
            return Ok(InstallOutcome::handled());
        }
        let dest = ctx.layout.packages_dir().as_std_path().join(name);
        self.install_file(entry, &dest, ctx, stamp)
    }

    /// Merge every file under `source_dir` into `dest_dir`.
    ///
    /// `prefix` is prepended to each file's path below `source_dir` before
    /// it is tested against `filter`; filtered files are left behind
    /// uncounted.
    fn merge_dir(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        prefix: &Path,
        filter: &PathFilter,
        ctx: &mut InstallContext<'_>,
        stamp: &str,
    ) -> Result<InstallOutcome, InstallError> {
        let mut outcome = InstallOutcome::handled();
        let files = match files_below(source_dir) {
            Ok(files) => files,
            Err(e) => {
                log::error!("cannot read {}: {e}", source_dir.display());
                outcome.failed += 1;
                return Ok(outcome);
            }
        };
        for relative in files {
            let filtered_name = prefix.join(&relative);
            if !filter.allows(&filtered_name) {
                log::debug!("filtered out {}", filtered_name.display());
                continue;
            }
            outcome += self.install_file(
                &source_dir.join(&relative),
                &dest_dir.join(&relative),
                ctx,
                stamp,
            )?;
        }
        Ok(outcome)
    }

    /// Install one unpacked file at `dest`. Binaries go through the
    /// assembly rules; anything else is moved with backup-on-collision.
    fn install_file(
        &self,
        source: &Path,
        dest: &Path,
        ctx: &mut InstallContext<'_>,
        stamp: &str,
    ) -> Result<InstallOutcome, InstallError> {
        let is_assembly = extension_of(source).is_some_and(|ext| self.assembly.can_handle(&ext));
        if !is_assembly {
            let placement = Placement {
                layout: ctx.layout,
                stamp,
            };
            return Ok(placement.place_counted(source, dest));
        }
        match self.assembly.install_to(source, dest, ctx) {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_fatal() => Err(e),
            Err(InstallError::Conflict { identity }) => {
                log::warn!("left {identity} untouched: competing files are unreadable");
                Ok(InstallOutcome::handled())
            }
            Err(e) => {
                log::error!("failed to install {}: {e}", source.display());
                Ok(InstallOutcome::failure())
            }
        }
    }
}

impl<E: ArchiveExtractor> InstallHandler for ArchiveHandler<E> {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn extensions(&self) -> &[&'static str] {
        self.extractor.extensions()
    }

    fn install(
        &self,
        file: &Path,
        ctx: &mut InstallContext<'_>,
    ) -> Result<InstallOutcome, InstallError> {
        if !ctx.session.is_installable(file) {
            log::info!("skipping {}: another candidate was chosen", file.display());
            return Ok(InstallOutcome::handled());
        }
        let scratch_root = ctx.layout.scratch_dir();
        let scratch = tempfile::Builder::new()
            .prefix("modsync-")
            .tempdir_in(scratch_root)
            .map_err(|e| InstallError::HostDirectory {
                path: scratch_root.to_owned(),
                reason: e.to_string(),
            })?;

        let extracted = self.extractor.extract(file, scratch.path())?;
        log::debug!(
            "extracted {} files from {} into {}",
            extracted.len(),
            file.display(),
            scratch.path().display()
        );

        let mut names = Vec::new();
        for entry in WalkDir::new(scratch.path())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| InstallError::Io {
                path: scratch.path().to_owned(),
                source: e.into(),
            })?;
            names.push(PathBuf::from(entry.file_name()));
        }

        let stamp = ctx.session.stamp().to_owned();
        let mut outcome = InstallOutcome::handled();
        for name in names {
            outcome += self.install_entry(&scratch.path().join(&name), &name, ctx, &stamp)?;
        }

        if let Err(e) = scratch.close() {
            log::warn!("failed to remove extraction directory: {e}");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
