//! Identity records for loaded providers and install handlers.

use std::fmt;

use crate::version::SemanticVersion;

/// Extension contract revision this build of the engine understands.
///
/// Providers and handlers report the revision they were written against;
/// the registry refuses anything else.
pub const EXTENSION_API_VERSION: u32 = 2;

/// Describes one loaded search provider or install handler.
///
/// Used for logging and ordering only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    /// Display name, unique within a registry.
    pub name: String,
    /// Author of the extension.
    pub author: String,
    /// Version of the extension itself.
    pub version: SemanticVersion,
    /// Where the extension is published.
    pub source_link: String,
    /// Whether the provider supports name/author brute checks.
    pub brute_check_capable: bool,
    /// Extension contract revision the implementation targets.
    pub api_version: u32,
}

impl ProviderDescriptor {
    /// Create a descriptor targeting the current [`EXTENSION_API_VERSION`].
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        author: impl Into<String>,
        version: SemanticVersion,
        source_link: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            author: author.into(),
            version,
            source_link: source_link.into(),
            brute_check_capable: false,
            api_version: EXTENSION_API_VERSION,
        }
    }

    /// Mark the provider as able to run brute checks.
    #[must_use]
    pub fn with_brute_check(mut self) -> Self {
        self.brute_check_capable = true;
        self
    }

    /// Returns true when the descriptor targets this engine's contract.
    #[must_use]
    pub const fn is_compatible(&self) -> bool {
        self.api_version == EXTENSION_API_VERSION
    }
}

impl fmt::Display for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} by {}", self.name, self.version, self.author)
    }
}
