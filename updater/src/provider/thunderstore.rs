//! Thunderstore: a slug-addressed registry.
//!
//! Packages live at `https://thunderstore.io/c/<community>/p/<namespace>/<name>/`
//! (or the older `/package/<namespace>/<name>/` form). The experimental API
//! returns a single document whose `latest` block describes the newest
//! release and its download URL.

use std::rc::Rc;
use std::sync::LazyLock;

use chrono::TimeDelta;
use modsync_common::{ArtifactFile, ProviderDescriptor, ReleaseInfo, SemanticVersion};
use regex::Regex;
use serde::Deserialize;

use super::cooldown::{Cooldown, is_rate_limit_status};
use super::naming::THUNDERSTORE;
use super::{ProviderError, SearchProvider, parse_release_version, status_error};
use crate::clock::Clock;
use crate::http::RegistryClient;

/// Default public Thunderstore instance.
pub const DEFAULT_BASE_URL: &str = "https://thunderstore.io";

#[allow(clippy::expect_used, reason = "the pattern is a literal")]
static PACKAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:[\w-]+\.)?thunderstore\.io/(?:c/[^/?#]+/p|package)/(?P<namespace>[^/?#]+)/(?P<name>[^/?#]+)",
    )
    .expect("valid Thunderstore package URL pattern")
});

#[derive(Debug, Deserialize)]
struct PackageDocument {
    package_url: Option<String>,
    latest: LatestVersion,
}

#[derive(Debug, Deserialize)]
struct LatestVersion {
    version_number: String,
    download_url: String,
}

/// Search provider for Thunderstore.
pub struct ThunderstoreProvider {
    descriptor: ProviderDescriptor,
    client: Rc<dyn RegistryClient>,
    clock: Rc<dyn Clock>,
    base_url: String,
    cooldown_length: TimeDelta,
    cooldown: Cooldown,
}

impl ThunderstoreProvider {
    /// Create a provider querying `base_url` (no trailing slash needed).
    #[must_use]
    pub fn new(
        client: Rc<dyn RegistryClient>,
        clock: Rc<dyn Clock>,
        base_url: &str,
        cooldown_length: TimeDelta,
    ) -> Self {
        Self {
            descriptor: ProviderDescriptor::new(
                "Thunderstore",
                "modsync",
                SemanticVersion::new(1, 2, 0),
                DEFAULT_BASE_URL,
            )
            .with_brute_check(),
            client,
            clock,
            base_url: base_url.trim_end_matches('/').to_owned(),
            cooldown_length,
            cooldown: Cooldown::default(),
        }
    }

    /// Extract `(namespace, name)` from a package page URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use modsync_updater::provider::thunderstore::ThunderstoreProvider;
    ///
    /// let slug = ThunderstoreProvider::parse_package_url(
    ///     "https://thunderstore.io/c/lethal-company/p/Bar/Foo/",
    /// );
    /// assert_eq!(slug, Some(("Bar".to_owned(), "Foo".to_owned())));
    /// ```
    #[must_use]
    pub fn parse_package_url(url: &str) -> Option<(String, String)> {
        let captures = PACKAGE_URL.captures(url.trim())?;
        Some((
            captures.name("namespace")?.as_str().to_owned(),
            captures.name("name")?.as_str().to_owned(),
        ))
    }

    /// Rate-limit state of this provider.
    #[must_use]
    pub const fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    fn query(&mut self, namespace: &str, name: &str) -> Result<ReleaseInfo, ProviderError> {
        let now = self.clock.now();
        self.cooldown.check(&self.descriptor, now)?;

        let url = format!(
            "{}/api/experimental/package/{namespace}/{name}/",
            self.base_url
        );
        log::debug!("querying {url}");
        let response = self.client.get(&url, &[])?;

        if is_rate_limit_status(response.status) {
            let until = now + self.cooldown_length;
            self.cooldown.engage(until);
            return Err(ProviderError::RateLimited {
                provider: self.descriptor.name.clone(),
                until,
            });
        }
        if !response.is_success() {
            return Err(status_error(&url, response.status));
        }

        let document: PackageDocument =
            serde_json::from_str(&response.body).map_err(|e| ProviderError::Malformed {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        let version = parse_release_version(&url, &document.latest.version_number)?;
        let file = ArtifactFile::named(
            format!("{namespace}-{name}-{version}.zip"),
            document.latest.download_url,
        )
        .with_content_type("application/zip");
        let source_link = document.package_url.unwrap_or_else(|| {
            format!("{}/package/{namespace}/{name}/", self.base_url)
        });
        Ok(ReleaseInfo::new(version, vec![file], source_link))
    }
}

impl SearchProvider for ThunderstoreProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn search(
        &mut self,
        url: &str,
        _current: &SemanticVersion,
    ) -> Result<ReleaseInfo, ProviderError> {
        let Some((namespace, name)) = Self::parse_package_url(url) else {
            return Err(ProviderError::Unsupported {
                provider: self.descriptor.name.clone(),
                target: url.to_owned(),
            });
        };
        self.query(&namespace, &name)
    }

    fn brute_check(
        &mut self,
        name: &str,
        author: &str,
        _current: &SemanticVersion,
    ) -> Result<ReleaseInfo, ProviderError> {
        THUNDERSTORE.validate(name)?;
        THUNDERSTORE.validate(author)?;
        self.query(author, name)
    }
}

#[cfg(test)]
#[path = "thunderstore_tests.rs"]
mod tests;
