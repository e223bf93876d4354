//! Unit tests for the Thunderstore provider.

use super::*;
use crate::http::{MockRegistryClient, RegistryResponse};
use crate::test_utils::ManualClock;
use chrono::{DateTime, Utc};
use rstest::rstest;

const BASE: &str = "https://thunderstore.io";
const API_URL: &str = "https://thunderstore.io/api/experimental/package/Bar/Foo/";

fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
}

fn package_json(version: &str) -> String {
    format!(
        r#"{{
            "namespace": "Bar",
            "name": "Foo",
            "package_url": "https://thunderstore.io/c/x/p/Bar/Foo/",
            "latest": {{
                "version_number": "{version}",
                "download_url": "https://thunderstore.io/package/download/Bar/Foo/{version}/"
            }}
        }}"#
    )
}

fn provider(client: MockRegistryClient, clock: Rc<ManualClock>) -> ThunderstoreProvider {
    ThunderstoreProvider::new(Rc::new(client), clock, BASE, TimeDelta::minutes(1))
}

#[rstest]
#[case::community("https://thunderstore.io/c/x/p/Bar/Foo", "Bar", "Foo")]
#[case::community_trailing("https://thunderstore.io/c/lethal-company/p/Bar/Foo/", "Bar", "Foo")]
#[case::legacy("https://thunderstore.io/package/Bar/Foo/", "Bar", "Foo")]
#[case::subdomain("https://valheim.thunderstore.io/package/Bar/Foo/", "Bar", "Foo")]
#[case::versioned_page("https://thunderstore.io/c/x/p/Bar/Foo/v/1.0.0/", "Bar", "Foo")]
fn parses_package_urls(#[case] url: &str, #[case] namespace: &str, #[case] name: &str) {
    assert_eq!(
        ThunderstoreProvider::parse_package_url(url),
        Some((namespace.to_owned(), name.to_owned()))
    );
}

#[rstest]
#[case::github("https://github.com/Bar/Foo")]
#[case::community_only("https://thunderstore.io/c/x/")]
#[case::lookalike("https://thunderstore.io.evil.test/package/Bar/Foo/")]
fn rejects_foreign_urls(#[case] url: &str) {
    assert_eq!(ThunderstoreProvider::parse_package_url(url), None);
}

#[test]
fn foreign_url_makes_no_network_call() {
    let mut client = MockRegistryClient::new();
    client.expect_get().never();
    let mut provider = provider(client, Rc::new(ManualClock::new(start())));

    let err = provider
        .search("https://github.com/Bar/Foo", &SemanticVersion::new(1, 0, 0))
        .expect_err("unsupported");
    assert!(matches!(err, ProviderError::Unsupported { .. }));
}

#[test]
fn search_returns_latest_release() {
    let mut client = MockRegistryClient::new();
    client
        .expect_get()
        .withf(|url, _| url == API_URL)
        .times(1)
        .returning(|_, _| Ok(RegistryResponse::new(200, package_json("1.1.0"))));
    let mut provider = provider(client, Rc::new(ManualClock::new(start())));

    let release = provider
        .search("https://thunderstore.io/c/x/p/Bar/Foo", &SemanticVersion::new(1, 0, 0))
        .expect("release");

    assert_eq!(release.version(), &SemanticVersion::new(1, 1, 0));
    assert_eq!(release.source_link(), "https://thunderstore.io/c/x/p/Bar/Foo/");
    let [file] = release.files() else {
        panic!("expected one file, got {:?}", release.files());
    };
    assert_eq!(file.file_name.as_deref(), Some("Bar-Foo-1.1.0.zip"));
    assert_eq!(file.content_type.as_deref(), Some("application/zip"));
}

#[rstest]
#[case::not_found(404)]
#[case::server_error(500)]
fn failure_statuses_are_classified(#[case] status: u16) {
    let mut client = MockRegistryClient::new();
    client
        .expect_get()
        .returning(move |_, _| Ok(RegistryResponse::new(status, "")));
    let mut provider = provider(client, Rc::new(ManualClock::new(start())));

    let err = provider
        .brute_check("Foo", "Bar", &SemanticVersion::new(1, 0, 0))
        .expect_err("failure");
    match (status, err) {
        (404, ProviderError::NotFound { url }) => assert_eq!(url, API_URL),
        (500, ProviderError::RegistryError { status: 500, .. }) => {}
        (_, other) => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn invalid_version_is_not_a_release() {
    let mut client = MockRegistryClient::new();
    client
        .expect_get()
        .returning(|_, _| Ok(RegistryResponse::new(200, package_json("not-a-version"))));
    let mut provider = provider(client, Rc::new(ManualClock::new(start())));

    let err = provider
        .brute_check("Foo", "Bar", &SemanticVersion::new(1, 0, 0))
        .expect_err("invalid version");
    assert!(matches!(err, ProviderError::InvalidVersion { .. }));
}

#[test]
fn malformed_document_is_reported() {
    let mut client = MockRegistryClient::new();
    client
        .expect_get()
        .returning(|_, _| Ok(RegistryResponse::new(200, "<html>")));
    let mut provider = provider(client, Rc::new(ManualClock::new(start())));

    let err = provider
        .brute_check("Foo", "Bar", &SemanticVersion::new(1, 0, 0))
        .expect_err("malformed");
    assert!(matches!(err, ProviderError::Malformed { .. }));
}

#[rstest]
#[case::bad_name("Foo Bar", "Author")]
#[case::bad_author("Foo", "_Author")]
fn brute_check_validates_names_before_calling(#[case] name: &str, #[case] author: &str) {
    let mut client = MockRegistryClient::new();
    client.expect_get().never();
    let mut provider = provider(client, Rc::new(ManualClock::new(start())));

    let err = provider
        .brute_check(name, author, &SemanticVersion::new(1, 0, 0))
        .expect_err("invalid name");
    assert!(matches!(err, ProviderError::InvalidName { .. }));
}

#[test]
fn rate_limit_disables_provider_for_cooldown() {
    let clock = Rc::new(ManualClock::new(start()));
    let mut client = MockRegistryClient::new();
    let mut seq = mockall::Sequence::new();
    client
        .expect_get()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(RegistryResponse::new(429, "")));
    client
        .expect_get()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(RegistryResponse::new(200, package_json("2.0.0"))));
    let mut provider = provider(client, Rc::clone(&clock));
    let current = SemanticVersion::new(1, 0, 0);

    let first = provider.brute_check("Foo", "Bar", &current);
    assert!(matches!(first, Err(ProviderError::RateLimited { .. })));
    assert_eq!(
        provider.cooldown().disabled_until(),
        Some(start() + TimeDelta::minutes(1))
    );

    clock.advance(TimeDelta::seconds(30));
    let during = provider.brute_check("Foo", "Bar", &current);
    assert!(matches!(during, Err(ProviderError::RateLimited { .. })));

    clock.advance(TimeDelta::seconds(31));
    let after = provider.brute_check("Foo", "Bar", &current).expect("re-enabled");
    assert_eq!(after.version(), &SemanticVersion::new(2, 0, 0));
}
