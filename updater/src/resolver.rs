//! Per-package update resolution.
//!
//! The resolver asks providers for the latest release of one installed
//! package: first by its source URL, then by brute check on name and author.
//! Provider failures, panics included, are logged and treated as "not
//! found" so resolution always falls through to the next provider or
//! strategy.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use modsync_common::{ArtifactFile, InstalledPackage, ReleaseInfo};

use crate::filter::select_files;
use crate::provider::{ProviderError, SearchProvider};

/// A newer release and the files to fetch for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// The release that was found.
    pub release: ReleaseInfo,
    /// Files the package allows to be downloaded, in release order.
    pub files: Vec<ArtifactFile>,
    /// Name of the provider that reported the release.
    pub provider: String,
}

/// Terminal state of resolving one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Up to date, ignored, or nothing usable was found.
    NoUpdate,
    /// A strictly newer release exists.
    UpdateFound(Update),
    /// The package could not be processed.
    Error(String),
}

impl Resolution {
    /// Returns true for [`Resolution::Error`].
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Drives providers, in registry order, for one package at a time.
pub struct UpdateResolver<'a> {
    providers: &'a mut [Box<dyn SearchProvider>],
}

impl<'a> UpdateResolver<'a> {
    /// Create a resolver over `providers`, already in resolution order.
    pub fn new(providers: &'a mut [Box<dyn SearchProvider>]) -> Self {
        Self { providers }
    }

    /// Resolve `package` to [`Resolution::NoUpdate`] or
    /// [`Resolution::UpdateFound`].
    pub fn resolve(&mut self, package: &InstalledPackage) -> Resolution {
        if package.options.ignore_update {
            log::debug!("{}: updates are ignored", package.identity);
            return Resolution::NoUpdate;
        }

        let found = package
            .source_url
            .as_deref()
            .and_then(|url| self.search(package, url))
            .or_else(|| self.brute_check(package));
        let Some((provider, release)) = found else {
            log::info!("{}: no release found", package.identity);
            return Resolution::NoUpdate;
        };

        if release.version() <= &package.current_version {
            log::info!(
                "{}: {} is up to date ({provider} reports {})",
                package.identity,
                package.current_version,
                release.version()
            );
            return Resolution::NoUpdate;
        }

        log::info!(
            "{}: update {} -> {} from {provider}",
            package.identity,
            package.current_version,
            release.version()
        );
        let files = select_files(release.files(), &package.options.allowed_files);
        Resolution::UpdateFound(Update {
            release,
            files,
            provider,
        })
    }

    fn search(&mut self, package: &InstalledPackage, url: &str) -> Option<(String, ReleaseInfo)> {
        self.providers.iter_mut().find_map(|provider| {
            guarded(package, provider.as_mut(), |p| {
                p.search(url, &package.current_version)
            })
        })
    }

    fn brute_check(&mut self, package: &InstalledPackage) -> Option<(String, ReleaseInfo)> {
        self.providers
            .iter_mut()
            .filter(|provider| provider.descriptor().brute_check_capable)
            .find_map(|provider| {
                guarded(package, provider.as_mut(), |p| {
                    p.brute_check(package.name(), package.author(), &package.current_version)
                })
            })
    }
}

/// Run one provider call. A panic inside the provider is logged and treated
/// like any other failure, so one broken provider cannot end the run.
fn guarded(
    package: &InstalledPackage,
    provider: &mut dyn SearchProvider,
    call: impl FnOnce(&mut dyn SearchProvider) -> Result<ReleaseInfo, ProviderError>,
) -> Option<(String, ReleaseInfo)> {
    match panic::catch_unwind(AssertUnwindSafe(|| call(&mut *provider))) {
        Ok(result) => accept(package, provider, result),
        Err(payload) => {
            log::error!(
                "{}: {} failed unexpectedly: {}",
                package.identity,
                provider.descriptor().name,
                panic_message(payload.as_ref())
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn accept(
    package: &InstalledPackage,
    provider: &dyn SearchProvider,
    result: Result<ReleaseInfo, ProviderError>,
) -> Option<(String, ReleaseInfo)> {
    let name = provider.descriptor().name.clone();
    match result {
        Ok(release) => Some((name, release)),
        Err(e) => {
            log::log!(e.log_level(), "{}: {name}: {e}", package.identity);
            None
        }
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
