//! Per-package allow/deny predicates built from `glob` patterns.
//!
//! Invalid patterns are not fatal: they are logged and matched literally.

use std::path::Path;

use glob::Pattern;
use modsync_common::{ArtifactFile, PackageOptions};

fn compile(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .map(|raw| {
            Pattern::new(raw).unwrap_or_else(|e| {
                log::warn!("invalid pattern \"{raw}\" ({e}); matching it literally");
                Pattern::new(&Pattern::escape(raw)).unwrap_or_default()
            })
        })
        .collect()
}

/// Include/exclude predicate over archive-relative paths.
///
/// A path is allowed when no exclude pattern matches it and either the
/// include list is empty or one include pattern matches it.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl PathFilter {
    /// Build a filter from raw patterns.
    #[must_use]
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        Self {
            include: compile(include),
            exclude: compile(exclude),
        }
    }

    /// Build the filter configured for a package.
    #[must_use]
    pub fn for_package(options: &PackageOptions) -> Self {
        Self::new(&options.include, &options.exclude)
    }

    /// A filter allowing everything.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Returns true when `relative` may be installed.
    ///
    /// Paths are compared with `/` separators regardless of platform.
    #[must_use]
    pub fn allows(&self, relative: &Path) -> bool {
        let normalised = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if self.exclude.iter().any(|p| p.matches(&normalised)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| p.matches(&normalised))
    }
}

/// Select the release files a package allows to be downloaded.
///
/// With no patterns every file is eligible. Files without an explicit name
/// cannot be filtered and are always kept. Order is preserved.
#[must_use]
pub fn select_files(files: &[ArtifactFile], allowed: &[String]) -> Vec<ArtifactFile> {
    if allowed.is_empty() {
        return files.to_vec();
    }
    let patterns = compile(allowed);
    files
        .iter()
        .filter(|file| {
            file.file_name
                .as_deref()
                .is_none_or(|name| patterns.iter().any(|p| p.matches(name)))
        })
        .cloned()
        .collect()
}
