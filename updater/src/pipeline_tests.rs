//! Unit tests for pipeline orchestration.

use super::*;
use crate::config::HostConfig;
use crate::test_utils::{
    ManualClock, StubDownloader, StubIdentityReader, StubProvider, StubSource, TestHost, release,
    zip_bytes,
};
use camino::Utf8PathBuf;
use chrono::{TimeZone, Utc};
use modsync_common::SemanticVersion;

const FOO_URL: &str = "https://thunderstore.io/c/x/p/Bar/Foo";
const BAZ_URL: &str = "https://thunderstore.io/c/x/p/Bar/Baz";

fn clock() -> ManualClock {
    ManualClock::new(
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .expect("time"),
    )
}

fn v(major: u64, minor: u64, patch: u64) -> SemanticVersion {
    SemanticVersion::new(major, minor, patch)
}

fn installed(name: &str, url: &str, version: SemanticVersion) -> CatalogEntry {
    CatalogEntry::Installed(
        InstalledPackage::new(PackageIdentity::new(name, "Bar"), version).with_source_url(url),
    )
}

fn foo_provider() -> StubProvider {
    StubProvider::new("Thunderstore").on_search(
        FOO_URL,
        Ok(release(v(1, 1, 0), &[("Foo.dll", "https://cdn.test/Foo.dll")])),
    )
}

fn foo_downloader() -> StubDownloader {
    StubDownloader::new().with_file(
        "https://cdn.test/Foo.dll",
        StubIdentityReader::content("Foo", "Bar", "1.1.0"),
    )
}

fn run(
    host: &TestHost,
    providers: Vec<StubProvider>,
    downloader: &StubDownloader,
    entries: &[CatalogEntry],
    options: &RunOptions,
) -> Vec<PackageReport> {
    let mut registry = StubSource::registry(providers);
    let clock = clock();
    UpdatePipeline::new(
        &mut registry,
        host.layout(),
        downloader,
        &StubIdentityReader,
        &clock,
    )
    .run(entries, options)
}

fn no_run_dirs(host: &TestHost) -> bool {
    host.scratch_entries()
        .iter()
        .all(|entry| !entry.to_string_lossy().starts_with("modsync-"))
}

#[test]
fn update_downloads_and_installs() {
    let host = TestHost::new();
    let downloader = foo_downloader();

    let reports = run(
        &host,
        vec![foo_provider()],
        &downloader,
        &[installed("Foo", FOO_URL, v(1, 0, 0))],
        &RunOptions::default(),
    );

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert!(matches!(report.resolution, Resolution::UpdateFound(_)));
    assert_eq!(report.outcome, Some(InstallOutcome::success()));
    assert_eq!(
        host.read("BepInEx/plugins/Foo.dll"),
        Some(StubIdentityReader::content("Foo", "Bar", "1.1.0"))
    );
    assert!(no_run_dirs(&host));
}

#[test]
fn check_only_installs_nothing() {
    let host = TestHost::new();
    let downloader = foo_downloader();

    let reports = run(
        &host,
        vec![foo_provider()],
        &downloader,
        &[installed("Foo", FOO_URL, v(1, 0, 0))],
        &RunOptions {
            check_only: true,
            ..RunOptions::default()
        },
    );

    assert!(matches!(reports[0].resolution, Resolution::UpdateFound(_)));
    assert_eq!(reports[0].outcome, None);
    assert!(downloader.downloads().is_empty());
    assert!(!host.plugin("Foo.dll").exists());
}

#[test]
fn invalid_entry_is_an_error_for_that_package_only() {
    let host = TestHost::new();
    let downloader = foo_downloader();
    let entries = [
        CatalogEntry::Invalid {
            identity: PackageIdentity::new("Broken", "Bar"),
            reason: "version unknown".to_owned(),
        },
        installed("Foo", FOO_URL, v(1, 0, 0)),
    ];

    let reports = run(
        &host,
        vec![foo_provider()],
        &downloader,
        &entries,
        &RunOptions::default(),
    );

    assert_eq!(
        reports[0].resolution,
        Resolution::Error(VERSION_UNKNOWN.to_owned())
    );
    assert!(reports[0].is_error());
    assert_eq!(reports[1].outcome, Some(InstallOutcome::success()));
}

#[test]
fn same_identity_across_packages_installs_newest_once() {
    let host = TestHost::new();
    let provider = StubProvider::new("Thunderstore")
        .on_search(
            FOO_URL,
            Ok(release(v(1, 0, 0), &[("Foo.dll", "https://cdn.test/a/Foo.dll")])),
        )
        .on_search(
            BAZ_URL,
            Ok(release(v(2, 0, 0), &[("Foo.dll", "https://cdn.test/b/Foo.dll")])),
        );
    let downloader = StubDownloader::new()
        .with_file(
            "https://cdn.test/a/Foo.dll",
            StubIdentityReader::content("Foo", "Bar", "1.0.0"),
        )
        .with_file(
            "https://cdn.test/b/Foo.dll",
            StubIdentityReader::content("Foo", "Bar", "1.1.0"),
        );

    let reports = run(
        &host,
        vec![provider],
        &downloader,
        &[
            installed("Foo", FOO_URL, v(0, 9, 0)),
            installed("Baz", BAZ_URL, v(1, 0, 0)),
        ],
        &RunOptions::default(),
    );

    assert_eq!(reports[0].outcome, Some(InstallOutcome::handled()));
    assert_eq!(reports[1].outcome, Some(InstallOutcome::success()));
    assert_eq!(
        host.read("BepInEx/plugins/Foo.dll"),
        Some(StubIdentityReader::content("Foo", "Bar", "1.1.0"))
    );
}

#[test]
fn unknown_extension_and_failed_download_count_as_failures() {
    let host = TestHost::new();
    let provider = StubProvider::new("Thunderstore").on_search(
        FOO_URL,
        Ok(release(
            v(1, 1, 0),
            &[
                ("Foo.dll", "https://cdn.test/Foo.dll"),
                ("notes.txt", "https://cdn.test/notes.txt"),
                ("Foo.zip", "https://cdn.test/missing.zip"),
            ],
        )),
    );
    let downloader = foo_downloader().with_file("https://cdn.test/notes.txt", "hello");

    let reports = run(
        &host,
        vec![provider],
        &downloader,
        &[installed("Foo", FOO_URL, v(1, 0, 0))],
        &RunOptions::default(),
    );

    let outcome = reports[0].outcome.expect("installed");
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.failed, 2);
    assert!(!reports[0].is_error());
}

#[test]
fn archive_release_is_extracted_into_the_host() {
    let host = TestHost::new();
    let provider = StubProvider::new("Thunderstore").on_search(
        FOO_URL,
        Ok(release(
            v(1, 1, 0),
            &[("Bar-Foo-1.1.0.zip", "https://cdn.test/Bar-Foo-1.1.0.zip")],
        )),
    );
    let downloader = StubDownloader::new().with_file(
        "https://cdn.test/Bar-Foo-1.1.0.zip",
        zip_bytes(&[("plugins/Foo/Foo.txt", b"x"), ("config/foo.cfg", b"c")]),
    );

    let reports = run(
        &host,
        vec![provider],
        &downloader,
        &[installed("Foo", FOO_URL, v(1, 0, 0))],
        &RunOptions::default(),
    );

    assert_eq!(reports[0].outcome.map(|o| o.succeeded), Some(2));
    assert!(host.plugin("Foo/Foo.txt").is_file());
    assert!(no_run_dirs(&host));
}

#[test]
fn unwritable_host_aborts_the_package() {
    let host = TestHost::new();
    let blocker = host.write("blocker", "not a directory");
    let config = HostConfig {
        root: Utf8PathBuf::from_path_buf(blocker).expect("utf-8 path"),
        ..host.config().clone()
    };
    let layout = HostLayout::from_config(&config);
    let downloader = foo_downloader();
    let mut registry = StubSource::registry(vec![foo_provider()]);
    let clock = clock();

    let reports = UpdatePipeline::new(
        &mut registry,
        &layout,
        &downloader,
        &StubIdentityReader,
        &clock,
    )
    .run(
        &[installed("Foo", FOO_URL, v(1, 0, 0))],
        &RunOptions::default(),
    );

    assert!(reports[0].is_error());
    assert_eq!(reports[0].outcome, None);
    assert!(downloader.downloads().is_empty());
}

#[test]
fn package_option_selects_by_name() {
    let host = TestHost::new();
    let downloader = foo_downloader();
    let provider = foo_provider().on_search(BAZ_URL, Ok(release(v(9, 0, 0), &[])));

    let reports = run(
        &host,
        vec![provider],
        &downloader,
        &[
            installed("Baz", BAZ_URL, v(1, 0, 0)),
            installed("Foo", FOO_URL, v(1, 0, 0)),
        ],
        &RunOptions {
            package: Some("foo".to_owned()),
            ..RunOptions::default()
        },
    );

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].identity.name, "Foo");
}

#[test]
fn up_to_date_package_downloads_nothing() {
    let host = TestHost::new();
    let downloader = foo_downloader();

    let reports = run(
        &host,
        vec![foo_provider()],
        &downloader,
        &[installed("Foo", FOO_URL, v(1, 1, 0))],
        &RunOptions::default(),
    );

    assert_eq!(reports[0].resolution, Resolution::NoUpdate);
    assert_eq!(reports[0].outcome, None);
    assert!(downloader.downloads().is_empty());
}
