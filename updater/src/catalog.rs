//! Installed-package enumeration.
//!
//! The host reports what is installed through a [`PackageCatalog`]. The
//! default [`TomlCatalog`] reads `[[package]]` tables from a TOML file. An
//! entry whose version cannot be parsed does not spoil the rest of the
//! catalog; it is reported as [`CatalogEntry::Invalid`] so the pipeline can
//! flag that one package.

use camino::{Utf8Path, Utf8PathBuf};
use modsync_common::{InstalledPackage, PackageIdentity, PackageOptions, SemanticVersion};
use serde::Deserialize;

/// Errors raised while reading a catalog as a whole.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read package catalog {path}: {source}")]
    Read {
        /// The catalog path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The catalog file is not valid TOML or has the wrong shape.
    #[error("invalid package catalog {path}: {source}")]
    Parse {
        /// The catalog path.
        path: Utf8PathBuf,
        /// The TOML error.
        #[source]
        source: toml::de::Error,
    },
}

/// One package reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEntry {
    /// A package with a usable version.
    Installed(InstalledPackage),
    /// A package the engine cannot process.
    Invalid {
        /// Name and author as reported.
        identity: PackageIdentity,
        /// Why the entry is unusable.
        reason: String,
    },
}

impl CatalogEntry {
    /// Name and author of the entry.
    #[must_use]
    pub fn identity(&self) -> &PackageIdentity {
        match self {
            Self::Installed(package) => &package.identity,
            Self::Invalid { identity, .. } => identity,
        }
    }
}

/// Source of installed-package metadata.
#[cfg_attr(test, mockall::automock)]
pub trait PackageCatalog {
    /// Enumerate installed packages in catalog order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the catalog as a whole is unreadable.
    fn packages(&self) -> Result<Vec<CatalogEntry>, CatalogError>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CatalogDocument {
    package: Vec<PackageDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageDocument {
    name: String,
    author: String,
    version: String,
    source_url: Option<String>,
    #[serde(default)]
    ignore_update: bool,
    #[serde(default)]
    allowed_files: Vec<String>,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
}

impl From<PackageDocument> for CatalogEntry {
    fn from(doc: PackageDocument) -> Self {
        let identity = PackageIdentity::new(doc.name, doc.author);
        let version = match SemanticVersion::parse(&doc.version) {
            Ok(version) => version,
            Err(e) => {
                log::warn!("{identity}: {e}");
                return Self::Invalid {
                    identity,
                    reason: "version unknown".to_owned(),
                };
            }
        };
        let options = PackageOptions {
            ignore_update: doc.ignore_update,
            allowed_files: doc.allowed_files,
            include: doc.include,
            exclude: doc.exclude,
        };
        let mut package = InstalledPackage::new(identity, version).with_options(options);
        package.source_url = doc.source_url.filter(|url| !url.trim().is_empty());
        Self::Installed(package)
    }
}

/// [`PackageCatalog`] backed by a TOML file.
#[derive(Debug, Clone)]
pub struct TomlCatalog {
    path: Utf8PathBuf,
}

impl TomlCatalog {
    /// Create a catalog reading `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The catalog file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Parse catalog text.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] when `text` is not a valid catalog.
    pub fn parse(&self, text: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
        let document: CatalogDocument =
            toml::from_str(text).map_err(|source| CatalogError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(document.package.into_iter().map(CatalogEntry::from).collect())
    }
}

impl PackageCatalog for TomlCatalog {
    fn packages(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| CatalogError::Read {
            path: self.path.clone(),
            source,
        })?;
        self.parse(&text)
    }
}
