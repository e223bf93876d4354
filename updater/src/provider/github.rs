//! GitHub Releases: a repository-addressed, quota-limited registry.
//!
//! Repositories are addressed as `https://github.com/<owner>/<repo>`. The
//! releases list is newest-first; the first non-draft release (pre-releases
//! only when enabled) is reported. Every response carries
//! `x-ratelimit-*` headers; once the remaining quota reaches zero or the API
//! answers 403/429, the provider disables itself until the reported reset
//! time.

use std::rc::Rc;
use std::sync::LazyLock;

use chrono::TimeDelta;
use modsync_common::{ArtifactFile, ProviderDescriptor, ReleaseInfo, SemanticVersion};
use regex::Regex;
use serde::Deserialize;

use super::cooldown::{Cooldown, Quota, is_rate_limit_status};
use super::naming::GITHUB;
use super::{ProviderError, SearchProvider, parse_release_version, status_error};
use crate::clock::Clock;
use crate::http::RegistryClient;

/// Default REST API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const RELEASES_PER_PAGE: u8 = 30;

#[allow(clippy::expect_used, reason = "the pattern is a literal")]
static REPOSITORY_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?github\.com/(?P<owner>[^/?#]+)/(?P<repo>[^/?#]+)")
        .expect("valid GitHub repository URL pattern")
});

#[derive(Debug, Deserialize)]
struct ReleaseDocument {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    html_url: String,
    #[serde(default)]
    assets: Vec<AssetDocument>,
}

#[derive(Debug, Deserialize)]
struct AssetDocument {
    name: String,
    browser_download_url: String,
    content_type: Option<String>,
    digest: Option<String>,
}

impl From<AssetDocument> for ArtifactFile {
    fn from(asset: AssetDocument) -> Self {
        Self {
            file_name: Some(asset.name),
            download_url: asset.browser_download_url,
            content_type: asset.content_type,
            sha256: asset
                .digest
                .as_deref()
                .and_then(|digest| digest.strip_prefix("sha256:"))
                .map(str::to_owned),
        }
    }
}

/// Options for [`GitHubProvider`].
#[derive(Debug, Clone, Default)]
pub struct GitHubOptions {
    /// API root; [`DEFAULT_API_URL`] when `None`.
    pub api_url: Option<String>,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Report pre-releases as candidates.
    pub include_prereleases: bool,
    /// Cooldown used when the registry reports no reset time.
    pub fallback_cooldown: TimeDelta,
}

/// Search provider for GitHub Releases.
pub struct GitHubProvider {
    descriptor: ProviderDescriptor,
    client: Rc<dyn RegistryClient>,
    clock: Rc<dyn Clock>,
    api_url: String,
    token: Option<String>,
    include_prereleases: bool,
    fallback_cooldown: TimeDelta,
    cooldown: Cooldown,
}

impl GitHubProvider {
    /// Create a provider.
    #[must_use]
    pub fn new(client: Rc<dyn RegistryClient>, clock: Rc<dyn Clock>, options: GitHubOptions) -> Self {
        Self {
            descriptor: ProviderDescriptor::new(
                "GitHub",
                "modsync",
                SemanticVersion::new(1, 3, 0),
                "https://github.com",
            )
            .with_brute_check(),
            client,
            clock,
            api_url: options
                .api_url
                .as_deref()
                .unwrap_or(DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_owned(),
            token: options.token.filter(|t| !t.trim().is_empty()),
            include_prereleases: options.include_prereleases,
            fallback_cooldown: options.fallback_cooldown,
            cooldown: Cooldown::default(),
        }
    }

    /// Extract `(owner, repo)` from a repository URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use modsync_updater::provider::github::GitHubProvider;
    ///
    /// let repo = GitHubProvider::parse_repository_url("https://github.com/Bar/Foo.git");
    /// assert_eq!(repo, Some(("Bar".to_owned(), "Foo".to_owned())));
    /// ```
    #[must_use]
    pub fn parse_repository_url(url: &str) -> Option<(String, String)> {
        let captures = REPOSITORY_URL.captures(url.trim())?;
        let owner = captures.name("owner")?.as_str();
        let repo = captures.name("repo")?.as_str();
        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        Some((owner.to_owned(), repo.to_owned()))
    }

    /// Rate-limit state of this provider.
    #[must_use]
    pub const fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Accept".to_owned(), "application/vnd.github+json".to_owned()),
            ("X-GitHub-Api-Version".to_owned(), API_VERSION.to_owned()),
        ];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_owned(), format!("Bearer {token}")));
        }
        headers
    }

    fn query(&mut self, owner: &str, repo: &str) -> Result<ReleaseInfo, ProviderError> {
        let now = self.clock.now();
        self.cooldown.check(&self.descriptor, now)?;

        let url = format!(
            "{}/repos/{owner}/{repo}/releases?per_page={RELEASES_PER_PAGE}",
            self.api_url
        );
        log::debug!("querying {url}");
        let response = self.client.get(&url, &self.headers())?;
        let quota = Quota::from_response(&response);

        if is_rate_limit_status(response.status) {
            let until = quota.cooldown_until(now, self.fallback_cooldown);
            self.cooldown.engage(until);
            return Err(ProviderError::RateLimited {
                provider: self.descriptor.name.clone(),
                until,
            });
        }
        if quota.is_exhausted() {
            let until = quota.cooldown_until(now, self.fallback_cooldown);
            log::warn!(
                "{} quota of {} requests exhausted; pausing until {until}",
                self.descriptor.name,
                quota.limit.map_or_else(|| "?".to_owned(), |l| l.to_string()),
            );
            self.cooldown.engage(until);
        }
        if !response.is_success() {
            return Err(status_error(&url, response.status));
        }

        let releases: Vec<ReleaseDocument> =
            serde_json::from_str(&response.body).map_err(|e| ProviderError::Malformed {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        let release = releases
            .into_iter()
            .find(|r| !r.draft && (self.include_prereleases || !r.prerelease))
            .ok_or_else(|| ProviderError::NotFound { url: url.clone() })?;

        let version = parse_release_version(&url, &release.tag_name)?;
        let files = release.assets.into_iter().map(ArtifactFile::from).collect();
        Ok(ReleaseInfo::new(version, files, release.html_url))
    }
}

impl SearchProvider for GitHubProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn search(
        &mut self,
        url: &str,
        _current: &SemanticVersion,
    ) -> Result<ReleaseInfo, ProviderError> {
        let Some((owner, repo)) = Self::parse_repository_url(url) else {
            return Err(ProviderError::Unsupported {
                provider: self.descriptor.name.clone(),
                target: url.to_owned(),
            });
        };
        self.query(&owner, &repo)
    }

    fn brute_check(
        &mut self,
        name: &str,
        author: &str,
        _current: &SemanticVersion,
    ) -> Result<ReleaseInfo, ProviderError> {
        GITHUB.validate(name)?;
        GITHUB.validate(author)?;
        self.query(author, name)
    }
}

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;
