//! Search providers: remote registry lookups that turn a package into its
//! latest [`ReleaseInfo`].
//!
//! # Sub-modules
//!
//! - [`cooldown`] - Per-provider rate-limit state.
//! - [`naming`] - Registry naming rules applied before brute checks.
//! - [`thunderstore`] - Slug-addressed registry (`namespace/name`).
//! - [`github`] - Repository-addressed registry with quota headers.

pub mod cooldown;
pub mod github;
pub mod naming;
pub mod thunderstore;

use chrono::{DateTime, Utc};
use log::Level;
use modsync_common::{ProviderDescriptor, ReleaseInfo, SemanticVersion, VersionError};

use crate::http::TransportError;

/// Why a provider produced no release.
///
/// The resolver treats every variant as "not found" and moves on to the next
/// provider or strategy; the variants only decide how loudly the outcome is
/// logged (see [`ProviderError::log_level`]).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The URL does not use this provider's addressing scheme, or the
    /// provider does not support the requested strategy.
    #[error("{provider} does not handle {target}")]
    Unsupported {
        /// Provider name.
        provider: String,
        /// The URL or strategy that was declined.
        target: String,
    },

    /// The registry has no matching package (HTTP 404).
    #[error("package not found at {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The registry answered with a non-success status other than 404.
    #[error("registry returned HTTP {status} for {url}")]
    RegistryError {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The provider is cooling down after a rate-limit signal.
    #[error("{provider} is rate limited until {until}")]
    RateLimited {
        /// Provider name.
        provider: String,
        /// When the provider re-enables itself.
        until: DateTime<Utc>,
    },

    /// The registry reported a version that is not a semantic version.
    #[error("release from {url} has an unusable version: {source}")]
    InvalidVersion {
        /// The URL that was queried.
        url: String,
        /// The parse failure.
        #[source]
        source: VersionError,
    },

    /// A brute-check name or author breaks the registry's naming rules.
    #[error("\"{value}\" is not a valid registry identifier: {reason}")]
    InvalidName {
        /// The rejected identifier.
        value: String,
        /// Which rule was broken.
        reason: &'static str,
    },

    /// The registry answered with a document the provider cannot read.
    #[error("unreadable registry response from {url}: {reason}")]
    Malformed {
        /// The URL that was queried.
        url: String,
        /// Description of the problem.
        reason: String,
    },

    /// No response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ProviderError {
    /// Log level the resolver uses when it swallows this error.
    ///
    /// Missing packages, naming rejections, and cooldowns are expected
    /// during normal operation; broken registries and unusable versions are
    /// not.
    #[must_use]
    pub const fn log_level(&self) -> Level {
        match self {
            Self::Unsupported { .. } => Level::Debug,
            Self::NotFound { .. } | Self::RateLimited { .. } | Self::InvalidName { .. } => {
                Level::Warn
            }
            Self::RegistryError { .. }
            | Self::InvalidVersion { .. }
            | Self::Malformed { .. }
            | Self::Transport(_) => Level::Error,
        }
    }
}

/// A pluggable registry lookup.
///
/// Implementations own their rate-limit state, which is why lookups take
/// `&mut self`.
#[cfg_attr(test, mockall::automock)]
pub trait SearchProvider {
    /// Identity of this provider.
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Look up the latest release for a package whose source URL is known.
    ///
    /// Must return [`ProviderError::Unsupported`] without any network call
    /// when `url` does not use this provider's addressing scheme.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] whenever no release can be produced.
    fn search(
        &mut self,
        url: &str,
        current: &SemanticVersion,
    ) -> Result<ReleaseInfo, ProviderError>;

    /// Look up the latest release using `name` and `author` as literal
    /// registry identifiers.
    ///
    /// Only called when the descriptor is brute-check capable.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] whenever no release can be produced.
    fn brute_check(
        &mut self,
        name: &str,
        author: &str,
        current: &SemanticVersion,
    ) -> Result<ReleaseInfo, ProviderError>;
}

/// Parse a registry-reported version string, stripping a tag prefix.
pub(crate) fn parse_release_version(
    url: &str,
    raw: &str,
) -> Result<SemanticVersion, ProviderError> {
    SemanticVersion::parse(modsync_common::strip_version_prefix(raw)).map_err(|source| {
        ProviderError::InvalidVersion {
            url: url.to_owned(),
            source,
        }
    })
}

/// Classify a non-success, non-rate-limit response.
pub(crate) fn status_error(url: &str, status: u16) -> ProviderError {
    if status == 404 {
        ProviderError::NotFound {
            url: url.to_owned(),
        }
    } else {
        ProviderError::RegistryError {
            url: url.to_owned(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::not_found(404, Level::Warn)]
    #[case::server_error(500, Level::Error)]
    #[case::bad_gateway(502, Level::Error)]
    fn status_errors_log_by_severity(#[case] status: u16, #[case] level: Level) {
        assert_eq!(status_error("https://r.test/p", status).log_level(), level);
    }

    #[test]
    fn release_version_strips_prefix() {
        let version = parse_release_version("u", "v1.2.3").expect("valid");
        assert_eq!(version, SemanticVersion::new(1, 2, 3));
    }

    #[test]
    fn invalid_release_version_is_an_error() {
        let err = parse_release_version("https://r.test/p", "not-a-version").expect_err("invalid");
        assert!(matches!(err, ProviderError::InvalidVersion { .. }));
        assert_eq!(err.log_level(), Level::Error);
    }

    #[test]
    fn unsupported_is_quiet() {
        let err = ProviderError::Unsupported {
            provider: "GitHub".to_owned(),
            target: "https://thunderstore.io/package/A/B".to_owned(),
        };
        assert_eq!(err.log_level(), Level::Debug);
    }
}
