//! Error type for the `modsync` binary.
//!
//! Library modules report failures through their own error enums; this type
//! gathers the ones that can end a CLI invocation and adds recovery hints
//! where a user can act on them.

use thiserror::Error;

use crate::auth::AuthError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::handler::InstallError;

/// Errors that end a CLI invocation.
#[derive(Debug, Error)]
pub enum UpdaterError {
    /// The configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The installed-package catalog could not be loaded.
    #[error("{source}; create it or set host.catalog in modsync.toml")]
    Catalog {
        /// The catalog failure.
        #[from]
        source: CatalogError,
    },

    /// The host tree is unusable before any package is processed.
    #[error(transparent)]
    Host(#[from] InstallError),

    /// Device authorisation failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// No package in the catalog matches `--package`.
    #[error("no installed package named {name}")]
    UnknownPackage {
        /// The requested name.
        name: String,
    },

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for CLI operations.
pub type Result<T> = std::result::Result<T, UpdaterError>;
