//! Selection between install candidates for the same logical package.

use std::path::PathBuf;

use crate::host::{EmbeddedIdentity, IdentityReader};

/// One file competing to be the installed copy of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Local path of the file.
    pub path: PathBuf,
    /// Whether the file is already in the host's package tree.
    pub installed: bool,
}

impl Candidate {
    /// A freshly downloaded or extracted file.
    #[must_use]
    pub fn incoming(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            installed: false,
        }
    }

    /// A file already installed in the host.
    #[must_use]
    pub fn installed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            installed: true,
        }
    }
}

/// Picks the single most appropriate candidate.
///
/// The highest version wins. Between equal versions an installed file beats
/// an incoming one, and otherwise the earlier candidate wins. Candidates
/// whose identity cannot be read do not compete.
pub struct ConflictResolver<'a> {
    identities: &'a dyn IdentityReader,
}

impl<'a> ConflictResolver<'a> {
    /// Create a resolver reading identities with `identities`.
    #[must_use]
    pub fn new(identities: &'a dyn IdentityReader) -> Self {
        Self { identities }
    }

    /// Select the winner, or `None` when no candidate's identity is
    /// readable.
    #[must_use]
    pub fn resolve<'c>(&self, candidates: &'c [Candidate]) -> Option<&'c Candidate> {
        let mut best: Option<(&Candidate, EmbeddedIdentity)> = None;
        for candidate in candidates {
            let Some(identity) = self.identities.read_identity(&candidate.path) else {
                log::debug!(
                    "{} has no readable identity; not competing",
                    candidate.path.display()
                );
                continue;
            };
            let replace = best.as_ref().is_none_or(|(current, current_identity)| {
                identity.version > current_identity.version
                    || (identity.version == current_identity.version
                        && candidate.installed
                        && !current.installed)
            });
            if replace {
                best = Some((candidate, identity));
            }
        }
        best.map(|(winner, _)| winner)
    }
}
