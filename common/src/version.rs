//! Semantic version value type with release-precedence ordering.
//!
//! Registries and package metadata report versions in slightly different
//! shapes (`1.2`, `v1.2.3`, `1.2.3-beta.1`). [`SemanticVersion`] accepts a
//! short core (missing minor/patch components default to zero) but otherwise
//! follows semantic-version syntax. Ordering and equality follow semver
//! precedence: build metadata is ignored and pre-release versions sort below
//! the corresponding release.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a version string cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The string is not a semantic version.
    #[error("invalid version format \"{value}\": {reason}")]
    InvalidVersionFormat {
        /// The rejected input.
        value: String,
        /// Description of the parse failure.
        reason: String,
    },
}

/// An immutable, parsed semantic version.
///
/// # Examples
///
/// ```
/// use modsync_common::version::SemanticVersion;
///
/// let release: SemanticVersion = "1.2.0".parse().expect("valid version");
/// let beta: SemanticVersion = "1.2.0-beta.1".parse().expect("valid version");
/// assert!(beta < release);
/// assert_eq!(SemanticVersion::parse("1.2").expect("short form"), release);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemanticVersion(semver::Version);

impl SemanticVersion {
    /// Construct a release version from its numeric components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Parse a version string.
    ///
    /// Leading and trailing whitespace is ignored. A version core with one or
    /// two numeric components is padded with zeroes; four or more components
    /// are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidVersionFormat`] when the input is not a
    /// semantic version.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid(raw, "empty version string"));
        }

        let core_end = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
        let (core, suffix) = trimmed.split_at(core_end);
        let padded = match core.matches('.').count() {
            0 => format!("{core}.0.0{suffix}"),
            1 => format!("{core}.0{suffix}"),
            _ => trimmed.to_owned(),
        };

        semver::Version::parse(&padded)
            .map(Self)
            .map_err(|e| invalid(raw, &e.to_string()))
    }

    /// Major version component.
    #[must_use]
    pub const fn major(&self) -> u64 {
        self.0.major
    }

    /// Minor version component.
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0.minor
    }

    /// Patch version component.
    #[must_use]
    pub const fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Returns true when the version carries a pre-release tag.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }
}

/// Strip a single leading `v`/`V` tag prefix, as used by release tags such
/// as `v1.4.0`.
///
/// # Examples
///
/// ```
/// use modsync_common::version::strip_version_prefix;
///
/// assert_eq!(strip_version_prefix("v1.4.0"), "1.4.0");
/// assert_eq!(strip_version_prefix("1.4.0"), "1.4.0");
/// ```
#[must_use]
pub fn strip_version_prefix(tag: &str) -> &str {
    let trimmed = tag.trim();
    trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed)
}

fn invalid(value: &str, reason: &str) -> VersionError {
    VersionError::InvalidVersionFormat {
        value: value.to_owned(),
        reason: reason.to_owned(),
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .major
            .cmp(&other.0.major)
            .then_with(|| self.0.minor.cmp(&other.0.minor))
            .then_with(|| self.0.patch.cmp(&other.0.patch))
            .then_with(|| self.0.pre.cmp(&other.0.pre))
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.major.hash(state);
        self.0.minor.hash(state);
        self.0.patch.hash(state);
        self.0.pre.hash(state);
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SemanticVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SemanticVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SemanticVersion> for String {
    fn from(value: SemanticVersion) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn v(raw: &str) -> SemanticVersion {
        SemanticVersion::parse(raw).expect("valid version")
    }

    #[rstest]
    #[case::patch("1.0.0", "1.0.1")]
    #[case::minor("1.0.9", "1.1.0")]
    #[case::major("1.9.9", "2.0.0")]
    #[case::numeric_not_lexical("1.2.0", "1.10.0")]
    #[case::prerelease_below_release("1.2.0-beta", "1.2.0")]
    #[case::prerelease_numeric("1.2.0-beta.2", "1.2.0-beta.11")]
    #[case::alpha_before_beta("1.2.0-alpha", "1.2.0-beta")]
    fn orders_by_precedence(#[case] lower: &str, #[case] higher: &str) {
        assert!(v(lower) < v(higher), "{lower} should sort below {higher}");
        assert!(v(higher) > v(lower));
    }

    #[rstest]
    #[case::short_major("1", "1.0.0")]
    #[case::short_minor("1.2", "1.2.0")]
    #[case::short_with_pre("1.2-rc.1", "1.2.0-rc.1")]
    #[case::whitespace(" 1.2.3 ", "1.2.3")]
    fn pads_short_versions(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(v(raw).to_string(), expected);
    }

    #[test]
    fn build_metadata_is_ignored_for_equality() {
        assert_eq!(v("1.0.0+build.1"), v("1.0.0+build.2"));
        assert_eq!(v("1.0.0+build.1").cmp(&v("1.0.0")), Ordering::Equal);
    }

    #[rstest]
    #[case::empty("")]
    #[case::text("not-a-version")]
    #[case::four_parts("1.2.3.4")]
    #[case::leading_zero("01.2.3")]
    #[case::prefix_not_stripped("v1.2.3")]
    #[case::negative("-1.0.0")]
    fn rejects_malformed_versions(#[case] raw: &str) {
        let err = SemanticVersion::parse(raw).expect_err("should fail");
        assert!(matches!(err, VersionError::InvalidVersionFormat { .. }));
        assert!(err.to_string().contains("invalid version format"));
    }

    #[rstest]
    #[case::lower_v("v2.0.1", "2.0.1")]
    #[case::upper_v("V2.0.1", "2.0.1")]
    #[case::none("2.0.1", "2.0.1")]
    #[case::only_one_stripped("vv2", "v2")]
    fn strips_tag_prefix(#[case] tag: &str, #[case] expected: &str) {
        assert_eq!(strip_version_prefix(tag), expected);
    }

    #[test]
    fn serde_round_trips_through_strings() {
        let parsed: SemanticVersion = serde_json::from_str("\"1.4\"").expect("deserialise");
        assert_eq!(parsed, SemanticVersion::new(1, 4, 0));
        let invalid = serde_json::from_str::<SemanticVersion>("\"banana\"");
        assert!(invalid.is_err());
    }
}
