//! Registry naming rules checked before a brute check hits the network.

use super::ProviderError;

/// Character rules for identifiers on one registry.
#[derive(Debug, Clone, Copy)]
pub struct NamingRules {
    /// Characters that may appear inside an identifier but not at either end.
    pub separators: &'static [char],
    /// Whether a character may appear at all.
    pub is_allowed: fn(char) -> bool,
}

impl NamingRules {
    /// Validate `value` against these rules.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidName`] naming the broken rule.
    pub fn validate(&self, value: &str) -> Result<(), ProviderError> {
        let reject = |reason| {
            Err(ProviderError::InvalidName {
                value: value.to_owned(),
                reason,
            })
        };
        if value.is_empty() {
            return reject("identifier is empty");
        }
        if value.starts_with(self.separators) {
            return reject("identifier starts with a separator");
        }
        if value.ends_with(self.separators) {
            return reject("identifier ends with a separator");
        }
        if !value.chars().all(self.is_allowed) {
            return reject("identifier contains a disallowed character");
        }
        Ok(())
    }
}

/// Thunderstore namespaces and package names: ASCII letters, digits, `_`.
pub const THUNDERSTORE: NamingRules = NamingRules {
    separators: &['_'],
    is_allowed: |c| c.is_ascii_alphanumeric() || c == '_',
};

/// GitHub owners and repositories: ASCII letters, digits, `-`, `_`, `.`.
pub const GITHUB: NamingRules = NamingRules {
    separators: &['-', '_', '.'],
    is_allowed: |c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'),
};
