//! End-to-end update runs against stub registries.
//!
//! These scenarios drive the whole pipeline from a catalog file through
//! resolution, download, conflict resolution, and installation into a
//! temporary host tree.

mod support;

use modsync_updater::handler::InstallOutcome;
use modsync_updater::pipeline::RunOptions;
use modsync_updater::resolver::Resolution;
use modsync_updater::test_utils::{
    CallLog, ManualClock, StubDownloader, StubIdentityReader, StubProvider, StubSource, TestHost,
    release, zip_bytes,
};
use rstest::{fixture, rstest};
use support::{BAZ_URL, FOO_URL, STAMP, catalog, installed, run, run_dirs_left, start, v};

const FOO_CATALOG: &str = concat!(
    "[[package]]\n",
    "name = \"Foo\"\n",
    "author = \"Bar\"\n",
    "version = \"1.0.0\"\n",
    "source_url = \"https://thunderstore.io/c/x/p/Bar/Foo\"\n",
);

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

struct UpdateWorld {
    host: TestHost,
    clock: ManualClock,
}

#[fixture]
fn world() -> UpdateWorld {
    UpdateWorld {
        host: TestHost::new(),
        clock: ManualClock::new(start()),
    }
}

fn foo_release_provider() -> StubProvider {
    StubProvider::new("Thunderstore").on_search(
        FOO_URL,
        Ok(release(v(1, 1, 0), &[("Foo.dll", "https://cdn.test/Foo.dll")])),
    )
}

fn foo_downloader(version: &str) -> StubDownloader {
    StubDownloader::new().with_file(
        "https://cdn.test/Foo.dll",
        StubIdentityReader::content("Foo", "Bar", version),
    )
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[rstest]
fn newer_release_replaces_the_installed_file_and_keeps_a_backup(world: UpdateWorld) {
    let UpdateWorld { host, clock } = world;
    host.write(
        "BepInEx/plugins/Foo.dll",
        StubIdentityReader::content("Foo", "Bar", "1.0.0"),
    );
    let entries = catalog(&host, FOO_CATALOG);
    let downloader = foo_downloader("1.1.0");
    let mut registry = StubSource::registry(vec![foo_release_provider()]);

    let reports = run(
        &host,
        &mut registry,
        &downloader,
        &clock,
        &entries,
        &RunOptions::default(),
    );

    assert_eq!(reports.len(), 1);
    assert!(matches!(reports[0].resolution, Resolution::UpdateFound(_)));
    assert_eq!(reports[0].outcome, Some(InstallOutcome::success()));
    assert_eq!(
        host.read("BepInEx/plugins/Foo.dll"),
        Some(StubIdentityReader::content("Foo", "Bar", "1.1.0"))
    );
    assert_eq!(
        host.read(&format!("BepInEx/backup/{STAMP}/BepInEx/plugins/Foo.dll")),
        Some(StubIdentityReader::content("Foo", "Bar", "1.0.0"))
    );
    assert!(!run_dirs_left(&host));
}

#[rstest]
fn second_run_after_the_host_catches_up_does_nothing(world: UpdateWorld) {
    let UpdateWorld { host, clock } = world;
    let downloader = foo_downloader("1.1.0");
    let mut registry = StubSource::registry(vec![foo_release_provider()]);

    let first = run(
        &host,
        &mut registry,
        &downloader,
        &clock,
        &catalog(&host, FOO_CATALOG),
        &RunOptions::default(),
    );
    assert_eq!(first[0].outcome, Some(InstallOutcome::success()));
    assert_eq!(downloader.downloads().len(), 1);

    let caught_up = FOO_CATALOG.replace("1.0.0", "1.1.0");
    for _ in 0..2 {
        let reports = run(
            &host,
            &mut registry,
            &downloader,
            &clock,
            &catalog(&host, &caught_up),
            &RunOptions::default(),
        );
        assert_eq!(reports[0].resolution, Resolution::NoUpdate);
        assert_eq!(reports[0].outcome, None);
    }
    assert_eq!(downloader.downloads().len(), 1);
}

#[rstest]
fn unparsable_catalog_version_fails_only_that_package(world: UpdateWorld) {
    let UpdateWorld { host, clock } = world;
    let text = format!(
        "{FOO_CATALOG}\n[[package]]\nname = \"Baz\"\nauthor = \"Bar\"\nversion = \"not-a-version\"\n"
    );
    let entries = catalog(&host, &text);
    let downloader = foo_downloader("1.1.0");
    let mut registry = StubSource::registry(vec![foo_release_provider()]);

    let reports = run(
        &host,
        &mut registry,
        &downloader,
        &clock,
        &entries,
        &RunOptions::default(),
    );

    assert_eq!(reports[0].outcome, Some(InstallOutcome::success()));
    assert_eq!(
        reports[1].resolution,
        Resolution::Error("version unknown".to_owned())
    );
}

#[rstest]
fn newer_bundled_copy_of_a_binary_replaces_the_standalone_one(world: UpdateWorld) {
    let UpdateWorld { host, clock } = world;
    let provider = StubProvider::new("Thunderstore")
        .on_search(
            FOO_URL,
            Ok(release(v(1, 1, 0), &[("Foo.dll", "https://cdn.test/a/Foo.dll")])),
        )
        .on_search(
            BAZ_URL,
            Ok(release(
                v(3, 0, 0),
                &[("Bar-Baz.zip", "https://cdn.test/b/Bar-Baz.zip")],
            )),
        );
    let bundled = StubIdentityReader::content("Foo", "Bar", "1.2.0");
    let downloader = StubDownloader::new()
        .with_file(
            "https://cdn.test/a/Foo.dll",
            StubIdentityReader::content("Foo", "Bar", "1.1.0"),
        )
        .with_file(
            "https://cdn.test/b/Bar-Baz.zip",
            zip_bytes(&[("Foo.dll", bundled.as_bytes())]),
        );
    let mut registry = StubSource::registry(vec![provider]);

    let reports = run(
        &host,
        &mut registry,
        &downloader,
        &clock,
        &[
            installed("Foo", FOO_URL, v(1, 0, 0)),
            installed("Baz", BAZ_URL, v(2, 0, 0)),
        ],
        &RunOptions::default(),
    );

    assert_eq!(reports[0].outcome, Some(InstallOutcome::success()));
    assert_eq!(reports[1].outcome.map(|o| o.failed), Some(0));
    assert_eq!(host.read("BepInEx/plugins/Foo.dll"), Some(bundled));
    assert_eq!(
        host.read(&format!("BepInEx/backup/{STAMP}/BepInEx/plugins/Foo.dll")),
        Some(StubIdentityReader::content("Foo", "Bar", "1.1.0"))
    );
    assert!(!run_dirs_left(&host));
}

#[rstest]
fn archive_contents_merge_into_host_categories(world: UpdateWorld) {
    let UpdateWorld { host, clock } = world;
    host.write("BepInEx/config/foo.cfg", "old");
    let provider = StubProvider::new("Thunderstore").on_search(
        FOO_URL,
        Ok(release(
            v(1, 1, 0),
            &[("Bar-Foo-1.1.0.zip", "https://cdn.test/Bar-Foo-1.1.0.zip")],
        )),
    );
    let downloader = StubDownloader::new().with_file(
        "https://cdn.test/Bar-Foo-1.1.0.zip",
        zip_bytes(&[
            ("manifest.json", b"{}"),
            ("Plugins/Foo/Foo.txt", b"plugin"),
            ("config/foo.cfg", b"new"),
        ]),
    );
    let mut registry = StubSource::registry(vec![provider]);

    let reports = run(
        &host,
        &mut registry,
        &downloader,
        &clock,
        &[installed("Foo", FOO_URL, v(1, 0, 0))],
        &RunOptions::default(),
    );

    assert!(reports[0].outcome.is_some_and(|o| o.failed == 0));
    assert_eq!(host.read("BepInEx/plugins/Foo/Foo.txt").as_deref(), Some("plugin"));
    assert_eq!(host.read("BepInEx/config/foo.cfg").as_deref(), Some("new"));
    assert_eq!(
        host.read(&format!("BepInEx/backup/{STAMP}/BepInEx/config/foo.cfg"))
            .as_deref(),
        Some("old")
    );
    assert!(!run_dirs_left(&host));
}

#[rstest]
fn corrupt_archive_fails_its_file_and_leaves_no_scratch(world: UpdateWorld) {
    let UpdateWorld { host, clock } = world;
    let provider = StubProvider::new("Thunderstore").on_search(
        FOO_URL,
        Ok(release(v(1, 1, 0), &[("Foo.zip", "https://cdn.test/Foo.zip")])),
    );
    let downloader = StubDownloader::new().with_file("https://cdn.test/Foo.zip", "not a zip");
    let mut registry = StubSource::registry(vec![provider]);

    let reports = run(
        &host,
        &mut registry,
        &downloader,
        &clock,
        &[installed("Foo", FOO_URL, v(1, 0, 0))],
        &RunOptions::default(),
    );

    assert_eq!(reports[0].outcome.map(|o| o.failed), Some(1));
    assert!(!reports[0].is_error());
    assert!(!run_dirs_left(&host));
}

#[rstest]
fn providers_are_consulted_in_name_order_before_brute_checks(world: UpdateWorld) {
    let UpdateWorld { host, clock } = world;
    let calls = CallLog::default();
    let alpha = StubProvider::new("alpha")
        .with_brute_check()
        .with_call_log(calls.clone());
    let beta = StubProvider::new("Beta").with_call_log(calls.clone());
    let gamma = StubProvider::new("gamma")
        .with_brute_check()
        .with_call_log(calls.clone())
        .on_brute_check(
            "Foo",
            "Bar",
            Ok(release(v(1, 1, 0), &[("Foo.dll", "https://cdn.test/Foo.dll")])),
        );
    let mut registry = StubSource::registry(vec![gamma, beta, alpha]);

    let reports = run(
        &host,
        &mut registry,
        &foo_downloader("1.1.0"),
        &clock,
        &[installed("Foo", FOO_URL, v(1, 0, 0))],
        &RunOptions {
            check_only: true,
            ..RunOptions::default()
        },
    );

    let Resolution::UpdateFound(update) = &reports[0].resolution else {
        panic!("expected an update, got {:?}", reports[0].resolution);
    };
    assert_eq!(update.provider, "gamma");
    assert_eq!(
        *calls.borrow(),
        [
            format!("alpha:search:{FOO_URL}"),
            format!("Beta:search:{FOO_URL}"),
            format!("gamma:search:{FOO_URL}"),
            "alpha:brute:Foo/Bar".to_owned(),
            "gamma:brute:Foo/Bar".to_owned(),
        ]
    );
}

#[rstest]
fn ignored_package_is_never_looked_up(world: UpdateWorld) {
    let UpdateWorld { host, clock } = world;
    let calls = CallLog::default();
    let provider = foo_release_provider().with_call_log(calls.clone());
    let entries = catalog(&host, &format!("{FOO_CATALOG}ignore_update = true\n"));
    let downloader = foo_downloader("1.1.0");
    let mut registry = StubSource::registry(vec![provider]);

    let reports = run(
        &host,
        &mut registry,
        &downloader,
        &clock,
        &entries,
        &RunOptions::default(),
    );

    assert_eq!(reports[0].resolution, Resolution::NoUpdate);
    assert!(calls.borrow().is_empty());
    assert!(downloader.downloads().is_empty());
}
