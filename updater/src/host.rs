//! Host collaborators: the directory layout packages are installed into and
//! the reader that recovers a package identity from a raw binary.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use modsync_common::{PackageIdentity, SemanticVersion};
use serde::Deserialize;

use crate::config::HostConfig;
use crate::handler::InstallError;

/// Resolved absolute directories of the host installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    root: Utf8PathBuf,
    packages: Utf8PathBuf,
    backup: Utf8PathBuf,
    scratch: Utf8PathBuf,
    categories: BTreeMap<String, Utf8PathBuf>,
}

impl HostLayout {
    /// Resolve the layout described by `config`.
    ///
    /// Relative directories are joined onto the host root. Without an
    /// explicit scratch directory the system temporary directory is used,
    /// or `<root>/.modsync` when that path is not UTF-8.
    #[must_use]
    pub fn from_config(config: &HostConfig) -> Self {
        let root = config.root.clone();
        let resolve = |path: &Utf8Path| root.join(path);
        let scratch = config.scratch_dir.as_deref().map_or_else(
            || {
                Utf8PathBuf::from_path_buf(std::env::temp_dir())
                    .unwrap_or_else(|_| root.join(".modsync"))
            },
            resolve,
        );
        Self {
            packages: resolve(&config.packages_dir),
            backup: resolve(&config.backup_dir),
            categories: config
                .categories
                .iter()
                .map(|(name, dir)| (name.to_ascii_lowercase(), resolve(dir)))
                .collect(),
            scratch,
            root,
        }
    }

    /// Host root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Directory raw binary packages are installed into.
    #[must_use]
    pub fn packages_dir(&self) -> &Utf8Path {
        &self.packages
    }

    /// Directory overwritten files are moved into.
    #[must_use]
    pub fn backup_dir(&self) -> &Utf8Path {
        &self.backup
    }

    /// Directory downloads and archive extractions are staged in.
    #[must_use]
    pub fn scratch_dir(&self) -> &Utf8Path {
        &self.scratch
    }

    /// Host directory for a top-level archive folder, if the folder names a
    /// known category. Matching ignores ASCII case.
    #[must_use]
    pub fn category(&self, name: &str) -> Option<&Utf8Path> {
        self.categories
            .get(&name.to_ascii_lowercase())
            .map(Utf8PathBuf::as_path)
    }

    /// Where the backup of `target` taken during session `stamp` lives.
    ///
    /// Paths under the host root keep their root-relative layout; anything
    /// else keeps only its file name.
    #[must_use]
    pub fn backup_path(&self, stamp: &str, target: &Path) -> PathBuf {
        let base = self.backup.as_std_path().join(stamp);
        match target.strip_prefix(self.root.as_std_path()) {
            Ok(relative) => base.join(relative),
            Err(_) => base.join(target.file_name().unwrap_or(target.as_os_str())),
        }
    }

    /// Ensure the packages, backup, and scratch directories exist and are
    /// writable.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::HostDirectory`] for the first directory that
    /// cannot be created or written.
    pub fn ensure_writable(&self) -> Result<(), InstallError> {
        for dir in [&self.packages, &self.backup, &self.scratch] {
            ensure_dir_writable(dir)?;
        }
        Ok(())
    }
}

fn ensure_dir_writable(dir: &Utf8Path) -> Result<(), InstallError> {
    let not_usable = |reason: String| InstallError::HostDirectory {
        path: dir.to_owned(),
        reason,
    };
    fs::create_dir_all(dir).map_err(|e| not_usable(e.to_string()))?;

    let probe = dir.join(".modsync-write-test");
    match fs::write(&probe, b"probe") {
        Ok(()) => {
            if let Err(e) = fs::remove_file(&probe) {
                log::debug!("could not remove {probe}: {e}");
            }
            Ok(())
        }
        Err(e) => Err(not_usable(e.to_string())),
    }
}

/// Identity and version recorded inside (or alongside) a raw binary package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedIdentity {
    /// Name and author.
    pub identity: PackageIdentity,
    /// Version of this particular file.
    pub version: SemanticVersion,
}

/// Reads the package identity of a raw binary package file.
///
/// Abstractions allow tests to assign identities without real binaries.
#[cfg_attr(test, mockall::automock)]
pub trait IdentityReader {
    /// Read the identity of `path`; `None` when it cannot be determined.
    fn read_identity(&self, path: &Path) -> Option<EmbeddedIdentity>;

    /// Metadata files that must travel with `path` when it is moved.
    fn companions(&self, _path: &Path) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Suffix appended to a binary's file name to form its identity sidecar.
pub const SIDECAR_SUFFIX: &str = ".identity.json";

/// File name of a Thunderstore package manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Deserialize)]
struct SidecarDocument {
    name: String,
    author: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    name: String,
    #[serde(alias = "namespace")]
    author: Option<String>,
    version_number: String,
}

/// [`IdentityReader`] backed by JSON metadata next to the binary.
///
/// The identity comes from `<file>.identity.json`. When no sidecar exists
/// and the binary is the only file with its extension in its directory, a
/// Thunderstore `manifest.json` in that directory is used instead, provided
/// it names an author. Manifests in shared directories, where several
/// packages drop their metadata side by side, never identify a binary.
#[derive(Debug, Clone, Default)]
pub struct SidecarIdentityReader {
    shared_dirs: Vec<PathBuf>,
}

impl SidecarIdentityReader {
    /// A reader that trusts a manifest in any directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A reader for `layout`: the package directory and every category
    /// directory are shared.
    #[must_use]
    pub fn for_layout(layout: &HostLayout) -> Self {
        let mut reader = Self::new().with_shared_dir(layout.packages_dir().as_std_path());
        for dir in layout.categories.values() {
            reader = reader.with_shared_dir(dir.as_std_path());
        }
        reader
    }

    /// Ignore any manifest sitting directly in `dir`.
    #[must_use]
    pub fn with_shared_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if !self.shared_dirs.contains(&dir) {
            self.shared_dirs.push(dir);
        }
        self
    }

    /// Sidecar path for `path`.
    #[must_use]
    pub fn sidecar_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    fn from_sidecar(sidecar: &Path) -> Option<EmbeddedIdentity> {
        let text = fs::read_to_string(sidecar).ok()?;
        let document: SidecarDocument = match serde_json::from_str(&text) {
            Ok(document) => document,
            Err(e) => {
                log::debug!("ignoring unreadable identity sidecar {}: {e}", sidecar.display());
                return None;
            }
        };
        embedded(document.name, document.author, &document.version)
    }

    fn from_manifest(&self, path: &Path) -> Option<EmbeddedIdentity> {
        let dir = path.parent()?;
        if self.shared_dirs.iter().any(|shared| shared == dir) || !is_sole_binary(dir, path) {
            return None;
        }
        let text = fs::read_to_string(dir.join(MANIFEST_FILE)).ok()?;
        let document: ManifestDocument = serde_json::from_str(&text).ok()?;
        embedded(document.name, document.author?, &document.version_number)
    }
}

impl IdentityReader for SidecarIdentityReader {
    fn read_identity(&self, path: &Path) -> Option<EmbeddedIdentity> {
        let sidecar = Self::sidecar_path(path);
        if sidecar.is_file() {
            Self::from_sidecar(&sidecar)
        } else {
            self.from_manifest(path)
        }
    }

    fn companions(&self, path: &Path) -> Vec<PathBuf> {
        let sidecar = Self::sidecar_path(path);
        if sidecar.is_file() { vec![sidecar] } else { Vec::new() }
    }
}

fn embedded(name: String, author: String, version: &str) -> Option<EmbeddedIdentity> {
    let version = SemanticVersion::parse(modsync_common::strip_version_prefix(version)).ok()?;
    Some(EmbeddedIdentity {
        identity: PackageIdentity::new(name, author),
        version,
    })
}

fn is_sole_binary(dir: &Path, path: &Path) -> bool {
    let Some(extension) = path.extension() else {
        return false;
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension() == Some(extension))
        .count()
        == 1
}
