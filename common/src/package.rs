//! Installed-package metadata supplied by the host.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::SemanticVersion;

/// The logical identity of a package: exact name and author.
///
/// Two identities match only when both strings are byte-for-byte equal; no
/// case folding or normalisation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentity {
    /// Package name.
    pub name: String,
    /// Package author or namespace.
    pub author: String,
}

impl PackageIdentity {
    /// Create an identity from name and author.
    #[must_use]
    pub fn new(name: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            author: author.into(),
        }
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", self.name, self.author)
    }
}

/// Per-package update and installation options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageOptions {
    /// Never look for updates for this package.
    pub ignore_update: bool,
    /// File-name patterns selecting which release files are downloaded.
    /// Empty means every file is eligible.
    pub allowed_files: Vec<String>,
    /// Archive-relative path patterns that may be installed. Empty allows all.
    pub include: Vec<String>,
    /// Archive-relative path patterns that are never installed.
    pub exclude: Vec<String>,
}

/// A package the host reports as installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    /// Name and author.
    pub identity: PackageIdentity,
    /// Version currently installed.
    pub current_version: SemanticVersion,
    /// Registry page the package was obtained from, if known.
    pub source_url: Option<String>,
    /// Update and installation options.
    pub options: PackageOptions,
}

impl InstalledPackage {
    /// Create a package with default options and no source URL.
    #[must_use]
    pub fn new(identity: PackageIdentity, current_version: SemanticVersion) -> Self {
        Self {
            identity,
            current_version,
            source_url: None,
            options: PackageOptions::default(),
        }
    }

    /// Attach a source URL.
    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Replace the package options.
    #[must_use]
    pub fn with_options(mut self, options: PackageOptions) -> Self {
        self.options = options;
        self
    }

    /// Package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// Package author.
    #[must_use]
    pub fn author(&self) -> &str {
        &self.identity.author
    }
}
