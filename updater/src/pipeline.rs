//! Update pipeline orchestration.
//!
//! A run has two phases. First every package is resolved and its eligible
//! files are downloaded into a per-run scratch directory and queued in one
//! [`InstallSession`]. Then each package's files are installed in catalog
//! order, so conflict resolution sees every file queued in the run.
//! Failures stay with the package that caused them.

use std::path::PathBuf;

use modsync_common::{ArtifactFile, InstalledPackage, PackageIdentity};
use tempfile::TempDir;

use crate::catalog::CatalogEntry;
use crate::clock::{Clock, backup_stamp};
use crate::download::ArtifactDownloader;
use crate::filter::PathFilter;
use crate::handler::{InstallContext, InstallError, InstallOutcome, extension_of};
use crate::host::{HostLayout, IdentityReader};
use crate::registry::ProviderRegistry;
use crate::resolver::{Resolution, UpdateResolver};
use crate::session::InstallSession;

/// Reason reported for catalog entries whose version cannot be parsed.
pub const VERSION_UNKNOWN: &str = "version unknown";

/// What happened to one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReport {
    /// The package.
    pub identity: PackageIdentity,
    /// Resolution result, or the error that aborted the package.
    pub resolution: Resolution,
    /// Install counts; `None` when nothing was installed or attempted.
    pub outcome: Option<InstallOutcome>,
}

impl PackageReport {
    fn new(identity: PackageIdentity, resolution: Resolution) -> Self {
        Self {
            identity,
            resolution,
            outcome: None,
        }
    }

    /// Returns true when the package ended in an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.resolution.is_error()
    }
}

/// Options for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Resolve only; download and install nothing.
    pub check_only: bool,
    /// Restrict the run to packages with this name (ASCII case ignored).
    pub package: Option<String>,
}

impl RunOptions {
    fn selects(&self, identity: &PackageIdentity) -> bool {
        self.package
            .as_deref()
            .is_none_or(|wanted| identity.name.eq_ignore_ascii_case(wanted))
    }
}

struct Pending {
    report: usize,
    files: Vec<PathBuf>,
    filter: PathFilter,
    failed_downloads: u32,
}

/// Collaborators shared by every package in a run.
pub struct UpdatePipeline<'a> {
    registry: &'a mut ProviderRegistry,
    layout: &'a HostLayout,
    downloader: &'a dyn ArtifactDownloader,
    identities: &'a dyn IdentityReader,
    clock: &'a dyn Clock,
}

impl<'a> UpdatePipeline<'a> {
    /// Assemble a pipeline.
    pub fn new(
        registry: &'a mut ProviderRegistry,
        layout: &'a HostLayout,
        downloader: &'a dyn ArtifactDownloader,
        identities: &'a dyn IdentityReader,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            registry,
            layout,
            downloader,
            identities,
            clock,
        }
    }

    /// Process `entries` and report on each selected package, in order.
    pub fn run(&mut self, entries: &[CatalogEntry], options: &RunOptions) -> Vec<PackageReport> {
        let mut session = InstallSession::new(backup_stamp(self.clock.now()));
        let mut scratch: Option<TempDir> = None;
        let mut reports = Vec::new();
        let mut pending = Vec::new();

        for entry in entries.iter().filter(|e| options.selects(e.identity())) {
            let package = match entry {
                CatalogEntry::Installed(package) => package,
                CatalogEntry::Invalid { identity, reason } => {
                    log::warn!("{identity}: {reason}");
                    reports.push(PackageReport::new(
                        identity.clone(),
                        Resolution::Error(VERSION_UNKNOWN.to_owned()),
                    ));
                    continue;
                }
            };
            let resolution = UpdateResolver::new(self.registry.providers_mut()).resolve(package);
            let files = match &resolution {
                Resolution::UpdateFound(update) if !options.check_only => update.files.clone(),
                _ => {
                    reports.push(PackageReport::new(package.identity.clone(), resolution));
                    continue;
                }
            };

            let index = reports.len();
            reports.push(PackageReport::new(package.identity.clone(), resolution));
            match self.fetch(package, index, &files, &mut scratch) {
                Ok((downloaded, failed_downloads)) => {
                    for path in &downloaded {
                        session.enqueue(path);
                    }
                    pending.push(Pending {
                        report: index,
                        files: downloaded,
                        filter: PathFilter::for_package(&package.options),
                        failed_downloads,
                    });
                }
                Err(e) => {
                    log::error!("{}: {e}", package.identity);
                    if let Some(report) = reports.get_mut(index) {
                        report.resolution = Resolution::Error(e.to_string());
                    }
                }
            }
        }

        for job in pending {
            let Some(report) = reports.get_mut(job.report) else {
                continue;
            };
            match self.install(&job, &mut session) {
                Ok(outcome) => report.outcome = Some(outcome),
                Err(e) => {
                    log::error!("{}: {e}", report.identity);
                    report.resolution = Resolution::Error(e.to_string());
                }
            }
        }

        if let Some(dir) = scratch {
            if let Err(e) = dir.close() {
                log::warn!("failed to remove download directory: {e}");
            }
        }
        reports
    }

    /// Download `files` for the package at report `index`, returning the
    /// local paths and the number of failed downloads.
    fn fetch(
        &self,
        package: &InstalledPackage,
        index: usize,
        files: &[ArtifactFile],
        scratch: &mut Option<TempDir>,
    ) -> Result<(Vec<PathBuf>, u32), InstallError> {
        if files.is_empty() {
            log::warn!("{}: the release has no eligible files", package.identity);
            return Ok((Vec::new(), 0));
        }
        self.layout.ensure_writable()?;
        let root = match scratch {
            Some(dir) => dir.path().to_owned(),
            None => {
                let dir = self.create_scratch()?;
                let path = dir.path().to_owned();
                *scratch = Some(dir);
                path
            }
        };
        let dir = root.join(format!(
            "{index:03}-{}-{}",
            package.author(),
            package.name()
        ));
        std::fs::create_dir_all(&dir).map_err(|source| InstallError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut downloaded = Vec::new();
        let mut failed = 0;
        for file in files {
            let dest = dir.join(file.local_name());
            match self.downloader.download(file, &dest) {
                Ok(()) => {
                    log::debug!("downloaded {} to {}", file.download_url, dest.display());
                    downloaded.push(dest);
                }
                Err(e) => {
                    log::error!("{}: {e}", package.identity);
                    failed += 1;
                }
            }
        }
        Ok((downloaded, failed))
    }

    fn create_scratch(&self) -> Result<TempDir, InstallError> {
        let root = self.layout.scratch_dir();
        tempfile::Builder::new()
            .prefix("modsync-run-")
            .tempdir_in(root)
            .map_err(|e| InstallError::HostDirectory {
                path: root.to_owned(),
                reason: e.to_string(),
            })
    }

    fn install(
        &self,
        job: &Pending,
        session: &mut InstallSession,
    ) -> Result<InstallOutcome, InstallError> {
        let mut total = InstallOutcome {
            failed: job.failed_downloads,
            ..InstallOutcome::default()
        };
        for file in &job.files {
            let handler = extension_of(file).and_then(|ext| self.registry.handler_for(&ext));
            let Some(handler) = handler else {
                log::warn!("no install handler for {}", file.display());
                total += InstallOutcome::failure();
                continue;
            };
            let mut ctx = InstallContext {
                layout: self.layout,
                session: &mut *session,
                identities: self.identities,
                filter: &job.filter,
            };
            match handler.install(file, &mut ctx) {
                Ok(outcome) => total += outcome,
                Err(e) if e.is_fatal() => return Err(e),
                Err(InstallError::Conflict { identity }) => {
                    log::warn!("left {identity} untouched: competing files are unreadable");
                }
                Err(e) => {
                    log::error!("failed to install {}: {e}", file.display());
                    total += InstallOutcome::failure();
                }
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
