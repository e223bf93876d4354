//! Shared fixtures for the end-to-end update suites.
//!
//! Each test binary pulls in a subset of these helpers.
#![allow(dead_code, reason = "each integration test binary uses a subset")]

use chrono::{DateTime, TimeZone, Utc};
use modsync_common::{InstalledPackage, PackageIdentity, SemanticVersion};
use modsync_updater::catalog::{CatalogEntry, PackageCatalog, TomlCatalog};
use modsync_updater::clock::Clock;
use modsync_updater::pipeline::{PackageReport, RunOptions, UpdatePipeline};
use modsync_updater::registry::ProviderRegistry;
use modsync_updater::test_utils::{StubDownloader, StubIdentityReader, TestHost};

/// Source URL of the `Foo` package on Thunderstore.
pub const FOO_URL: &str = "https://thunderstore.io/c/x/p/Bar/Foo";

/// Source URL of the `Baz` package on Thunderstore.
pub const BAZ_URL: &str = "https://thunderstore.io/c/x/p/Bar/Baz";

/// A fixed instant that every run starts at.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 18, 9, 30, 12)
        .single()
        .expect("valid start time")
}

/// Backup folder name for runs started at [`start`].
pub const STAMP: &str = "20250118-093012";

pub fn v(major: u64, minor: u64, patch: u64) -> SemanticVersion {
    SemanticVersion::new(major, minor, patch)
}

/// An installed package authored by `Bar`.
pub fn installed(name: &str, url: &str, version: SemanticVersion) -> CatalogEntry {
    CatalogEntry::Installed(
        InstalledPackage::new(PackageIdentity::new(name, "Bar"), version).with_source_url(url),
    )
}

/// Write `text` as the host's package catalog and read it back.
pub fn catalog(host: &TestHost, text: &str) -> Vec<CatalogEntry> {
    let path = host.write("modsync-packages.toml", text);
    let path = camino::Utf8PathBuf::from_path_buf(path).expect("utf-8 catalog path");
    TomlCatalog::new(path).packages().expect("readable catalog")
}

/// Run the pipeline once over `entries`.
pub fn run(
    host: &TestHost,
    registry: &mut ProviderRegistry,
    downloader: &StubDownloader,
    clock: &dyn Clock,
    entries: &[CatalogEntry],
    options: &RunOptions,
) -> Vec<PackageReport> {
    UpdatePipeline::new(
        registry,
        host.layout(),
        downloader,
        &StubIdentityReader,
        clock,
    )
    .run(entries, options)
}

/// Whether any per-run scratch directory survived.
pub fn run_dirs_left(host: &TestHost) -> bool {
    host.scratch_entries()
        .iter()
        .any(|entry| entry.to_string_lossy().starts_with("modsync-"))
}
