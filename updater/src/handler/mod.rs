//! Install handlers: format-specific placement of downloaded files into the
//! host tree.
//!
//! # Sub-modules
//!
//! - [`assembly`] - Raw binary packages with embedded identity.
//! - [`archive`] - Archives whose top-level folders map onto host folders.
//! - [`placement`] - Backup-on-collision file moves shared by both.

pub mod archive;
pub mod assembly;
pub mod placement;

use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use modsync_common::{PackageIdentity, ProviderDescriptor};

use crate::extraction::ExtractionError;
use crate::filter::PathFilter;
use crate::host::{HostLayout, IdentityReader};
use crate::session::InstallSession;

/// Result of installing one downloaded file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Whether the handler recognised and processed the file.
    pub handled: bool,
    /// Files placed successfully.
    pub succeeded: u32,
    /// Files that failed to install.
    pub failed: u32,
}

impl InstallOutcome {
    /// Processed, with nothing counted (yet).
    #[must_use]
    pub const fn handled() -> Self {
        Self {
            handled: true,
            succeeded: 0,
            failed: 0,
        }
    }

    /// Not recognised; copied as-is at most.
    #[must_use]
    pub const fn unhandled() -> Self {
        Self {
            handled: false,
            succeeded: 0,
            failed: 0,
        }
    }

    /// One file placed.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            handled: true,
            succeeded: 1,
            failed: 0,
        }
    }

    /// One file failed.
    #[must_use]
    pub const fn failure() -> Self {
        Self {
            handled: true,
            succeeded: 0,
            failed: 1,
        }
    }
}

impl AddAssign for InstallOutcome {
    fn add_assign(&mut self, other: Self) {
        self.handled |= other.handled;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// Errors that stop a handler from processing a file.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// A host directory is missing or not writable. Aborts the current
    /// package.
    #[error("host directory {path} is not usable: {reason}")]
    HostDirectory {
        /// The directory.
        path: Utf8PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A file could not be read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The archive could not be extracted.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Competing candidates could not be ranked; existing state is kept.
    #[error("no candidate for {identity} has a readable identity")]
    Conflict {
        /// The contested package.
        identity: PackageIdentity,
    },
}

impl InstallError {
    /// Returns true when the error must abort the whole package.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::HostDirectory { .. })
    }
}

/// Everything a handler needs besides the file itself.
pub struct InstallContext<'a> {
    /// Host directories.
    pub layout: &'a HostLayout,
    /// Run-wide install queue.
    pub session: &'a mut InstallSession,
    /// Identity reader for raw binaries.
    pub identities: &'a dyn IdentityReader,
    /// Per-package path filter.
    pub filter: &'a PathFilter,
}

/// A pluggable installer for one family of file formats.
pub trait InstallHandler {
    /// Identity of this handler.
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Lower-case file extensions (without the dot) this handler claims.
    fn extensions(&self) -> &[&'static str];

    /// Returns true when `extension` is one of [`Self::extensions`],
    /// ignoring ASCII case.
    fn can_handle(&self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|known| known.eq_ignore_ascii_case(extension))
    }

    /// Install `file` into the host.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError`] when the file cannot be processed at all;
    /// per-file placement failures inside an archive are counted in the
    /// outcome instead.
    fn install(
        &self,
        file: &Path,
        ctx: &mut InstallContext<'_>,
    ) -> Result<InstallOutcome, InstallError>;
}

/// Lower-case extension of `path`, if any.
#[must_use]
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}
