//! Release descriptions returned by search providers.

use serde::{Deserialize, Serialize};

use crate::version::SemanticVersion;

/// One downloadable file belonging to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    /// File name reported by the registry, when it reports one.
    pub file_name: Option<String>,
    /// Absolute download URL.
    pub download_url: String,
    /// MIME type reported by the registry.
    pub content_type: Option<String>,
    /// Lower-case hex SHA-256 digest when the registry publishes one.
    pub sha256: Option<String>,
}

impl ArtifactFile {
    /// Create a named artifact with no content type or digest.
    #[must_use]
    pub fn named(file_name: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            download_url: download_url.into(),
            content_type: None,
            sha256: None,
        }
    }

    /// Attach a content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Attach a SHA-256 digest.
    #[must_use]
    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }

    /// Name to store the download under.
    ///
    /// Uses the reported file name, then the last path segment of the
    /// download URL (query and fragment removed), then `download.bin`.
    ///
    /// # Examples
    ///
    /// ```
    /// use modsync_common::release::ArtifactFile;
    ///
    /// let file = ArtifactFile {
    ///     file_name: None,
    ///     download_url: "https://example.test/files/Foo.dll?token=1".to_owned(),
    ///     content_type: None,
    ///     sha256: None,
    /// };
    /// assert_eq!(file.local_name(), "Foo.dll");
    /// ```
    #[must_use]
    pub fn local_name(&self) -> String {
        if let Some(name) = self.file_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_owned();
        }
        let without_query = self
            .download_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        without_query
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty() && !segment.contains(':'))
            .map_or_else(|| "download.bin".to_owned(), str::to_owned)
    }
}

/// A versioned publication discovered on a remote registry.
///
/// File order is the order the registry reported, which callers rely on when
/// they pick the first usable file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    version: SemanticVersion,
    files: Vec<ArtifactFile>,
    source_link: String,
}

impl ReleaseInfo {
    /// Build a release description.
    #[must_use]
    pub fn new(
        version: SemanticVersion,
        files: Vec<ArtifactFile>,
        source_link: impl Into<String>,
    ) -> Self {
        Self {
            version,
            files,
            source_link: source_link.into(),
        }
    }

    /// Version of the release.
    #[must_use]
    pub fn version(&self) -> &SemanticVersion {
        &self.version
    }

    /// Downloadable files in registry order.
    #[must_use]
    pub fn files(&self) -> &[ArtifactFile] {
        &self.files
    }

    /// Canonical page for the release.
    #[must_use]
    pub fn source_link(&self) -> &str {
        &self.source_link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn unnamed(url: &str) -> ArtifactFile {
        ArtifactFile {
            file_name: None,
            download_url: url.to_owned(),
            content_type: None,
            sha256: None,
        }
    }

    #[rstest]
    #[case::plain("https://host.test/a/Plugin.zip", "Plugin.zip")]
    #[case::trailing_slash("https://thunderstore.io/package/download/Ns/Pkg/1.0.0/", "1.0.0")]
    #[case::fragment("https://host.test/a/b.dll#frag", "b.dll")]
    #[case::bare_host("https://", "download.bin")]
    fn derives_local_name_from_url(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(unnamed(url).local_name(), expected);
    }

    #[test]
    fn prefers_reported_name() {
        let file = ArtifactFile::named("Foo.dll", "https://host.test/blob/123");
        assert_eq!(file.local_name(), "Foo.dll");
    }

    #[test]
    fn blank_reported_name_falls_back_to_url() {
        let mut file = ArtifactFile::named("  ", "https://host.test/blob/Foo.dll");
        assert_eq!(file.local_name(), "Foo.dll");
        file.file_name = None;
        assert_eq!(file.local_name(), "Foo.dll");
    }

    #[test]
    fn release_preserves_file_order() {
        let release = ReleaseInfo::new(
            SemanticVersion::new(1, 1, 0),
            vec![
                ArtifactFile::named("b.zip", "https://host.test/b.zip"),
                ArtifactFile::named("a.zip", "https://host.test/a.zip"),
            ],
            "https://host.test/release",
        );
        let names: Vec<_> = release.files().iter().map(ArtifactFile::local_name).collect();
        assert_eq!(names, ["b.zip", "a.zip"]);
        assert_eq!(release.source_link(), "https://host.test/release");
    }
}
