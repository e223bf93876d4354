//! Raw binary packages.
//!
//! A raw binary carries its own identity. It is installed into the host's
//! package directory unless another candidate for the same identity (queued
//! in this run or already installed) is the better choice.

use std::path::{Path, PathBuf};

use modsync_common::{PackageIdentity, ProviderDescriptor, SemanticVersion};

use super::placement::Placement;
use super::{InstallContext, InstallError, InstallHandler, InstallOutcome};
use crate::conflict::{Candidate, ConflictResolver};
use crate::host::IdentityReader;

const EXTENSIONS: &[&str] = &["dll"];

/// Handler for raw binary packages (`.dll`).
#[derive(Debug, Clone)]
pub struct AssemblyHandler {
    descriptor: ProviderDescriptor,
}

impl Default for AssemblyHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl AssemblyHandler {
    /// Create the handler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: ProviderDescriptor::new(
                "Assembly",
                "modsync",
                SemanticVersion::new(1, 1, 0),
                "https://github.com/modsync/modsync",
            ),
        }
    }

    /// Install `file` at `dest`, unless a competing candidate for the same
    /// identity wins.
    ///
    /// Archive handlers call this for every binary they unpack, wherever it
    /// lands, so all binaries go through the same conflict resolution.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Conflict`] when several candidates compete
    /// and none can be ranked.
    pub fn install_to(
        &self,
        file: &Path,
        dest: &Path,
        ctx: &mut InstallContext<'_>,
    ) -> Result<InstallOutcome, InstallError> {
        if !ctx.session.is_installable(file) {
            log::info!("skipping {}: another candidate was chosen", file.display());
            return Ok(InstallOutcome::handled());
        }
        let stamp = ctx.session.stamp().to_owned();
        let placement = Placement {
            layout: ctx.layout,
            stamp: &stamp,
        };

        let Some(embedded) = ctx.identities.read_identity(file) else {
            log::warn!("{} has no readable identity; copying as-is", file.display());
            if let Err(e) = placement.place_file(file, dest) {
                log::error!("failed to copy {}: {e}", file.display());
            }
            return Ok(InstallOutcome::unhandled());
        };
        let identity = embedded.identity;

        let candidates = self.candidates(file, dest, &identity, ctx);
        let winner = if let [only] = candidates.as_slice() {
            only.clone()
        } else if let Some(winner) = ConflictResolver::new(ctx.identities).resolve(&candidates) {
            log::info!(
                "{identity}: {} candidates, keeping {}",
                candidates.len(),
                winner.path.display()
            );
            winner.clone()
        } else {
            ctx.session.mark_not_installable(file);
            return Err(InstallError::Conflict { identity });
        };

        for loser in candidates.iter().filter(|c| c.path != winner.path && !c.installed) {
            ctx.session.mark_not_installable(&loser.path);
        }
        if winner.path != file {
            return Ok(InstallOutcome::handled());
        }

        for stale in candidates.iter().filter(|c| c.installed && c.path != dest) {
            backup_with_companions(&placement, &stale.path, ctx.identities);
        }
        match placement.place_with_companions(file, dest, ctx.identities) {
            Ok(()) => {
                log::info!("installed {identity} {} to {}", embedded.version, dest.display());
                Ok(InstallOutcome::success())
            }
            Err(e) => {
                log::error!("failed to install {}: {e}", dest.display());
                Ok(InstallOutcome::failure())
            }
        }
    }

    /// Installed binaries whose identity is `identity`, sorted by path:
    /// those below the package directory plus whatever already sits at
    /// `dest`.
    fn installed_with(
        &self,
        identity: &PackageIdentity,
        dest: &Path,
        ctx: &InstallContext<'_>,
    ) -> Vec<PathBuf> {
        let root = glob::Pattern::escape(ctx.layout.packages_dir().as_str());
        let options = glob::MatchOptions {
            case_sensitive: false,
            ..glob::MatchOptions::new()
        };
        let mut found: Vec<PathBuf> = EXTENSIONS
            .iter()
            .filter_map(|ext| glob::glob_with(&format!("{root}/**/*.{ext}"), options).ok())
            .flatten()
            .filter_map(Result::ok)
            .chain(dest.is_file().then(|| dest.to_owned()))
            .filter(|path| has_identity(ctx.identities, path, identity))
            .collect();
        found.sort();
        found.dedup();
        found
    }

    /// Gather every candidate for `identity`: installable queued files in
    /// queue order (with `file` at its own position, or last when it was
    /// never queued), then installed files.
    fn candidates(
        &self,
        file: &Path,
        dest: &Path,
        identity: &PackageIdentity,
        ctx: &InstallContext<'_>,
    ) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = ctx
            .session
            .queued()
            .iter()
            .filter(|queued| queued.installable)
            .filter(|queued| {
                queued.path == file || has_identity(ctx.identities, &queued.path, identity)
            })
            .map(|queued| Candidate::incoming(queued.path.clone()))
            .collect();
        if !candidates.iter().any(|c| c.path == file) {
            candidates.push(Candidate::incoming(file));
        }
        candidates.extend(
            self.installed_with(identity, dest, ctx)
                .into_iter()
                .map(Candidate::installed),
        );
        candidates
    }
}

impl InstallHandler for AssemblyHandler {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn extensions(&self) -> &[&'static str] {
        EXTENSIONS
    }

    fn install(
        &self,
        file: &Path,
        ctx: &mut InstallContext<'_>,
    ) -> Result<InstallOutcome, InstallError> {
        let Some(file_name) = file.file_name() else {
            return Err(InstallError::Io {
                path: file.to_owned(),
                source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
            });
        };
        let dest = ctx.layout.packages_dir().as_std_path().join(file_name);
        self.install_to(file, &dest, ctx)
    }
}

fn has_identity(reader: &dyn IdentityReader, path: &Path, identity: &PackageIdentity) -> bool {
    reader
        .read_identity(path)
        .is_some_and(|found| found.identity == *identity)
}

fn backup_with_companions(placement: &Placement<'_>, path: &Path, reader: &dyn IdentityReader) {
    let companions = reader.companions(path);
    for target in std::iter::once(path.to_owned()).chain(companions) {
        if let Err(e) = placement.backup(&target) {
            log::warn!("failed to back up {}: {e}", target.display());
        }
    }
}

#[cfg(test)]
#[path = "assembly_tests.rs"]
mod tests;
