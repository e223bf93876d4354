//! Shared value types for the modsync update engine: semantic versions,
//! release descriptions, installed-package metadata, and extension
//! descriptors.

pub mod descriptor;
pub mod package;
pub mod release;
pub mod version;

pub use descriptor::{EXTENSION_API_VERSION, ProviderDescriptor};
pub use package::{InstalledPackage, PackageIdentity, PackageOptions};
pub use release::{ArtifactFile, ReleaseInfo};
pub use version::{SemanticVersion, VersionError, strip_version_prefix};
