//! Shared test utilities for the updater crate.
//!
//! Stub collaborators with scripted behaviour, used by the unit tests and,
//! through the `test-support` feature, by the integration suite.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use camino::Utf8PathBuf;
use chrono::{DateTime, TimeDelta, Utc};
use modsync_common::{
    ArtifactFile, PackageIdentity, ProviderDescriptor, ReleaseInfo, SemanticVersion,
};

use crate::clock::Clock;
use crate::config::HostConfig;
use crate::download::{ArtifactDownloader, DownloadError};
use crate::handler::archive::ArchiveHandler;
use crate::handler::assembly::AssemblyHandler;
use crate::host::{EmbeddedIdentity, HostLayout, IdentityReader};
use crate::http::{RegistryClient, RegistryResponse, TransportError};
use crate::provider::{ProviderError, SearchProvider};
use crate::registry::{ExtensionSource, Extensions, ProviderRegistry};

/// Shared, ordered record of calls made to stubs.
pub type CallLog = Rc<RefCell<Vec<String>>>;

/// A clock that only moves when told to.
///
/// `sleep` advances the clock instead of blocking.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock reading `start`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        self.now.set(self.now.get() + delta);
    }

    /// Set the clock to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        self.now.set(at);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX));
    }
}

/// A [`SearchProvider`] returning scripted results.
///
/// `search` answers [`ProviderError::Unsupported`] for URLs without a
/// scripted result; `brute_check` answers [`ProviderError::NotFound`].
#[derive(Debug, Clone)]
pub struct StubProvider {
    descriptor: ProviderDescriptor,
    searches: HashMap<String, Result<ReleaseInfo, ProviderError>>,
    brute_checks: HashMap<(String, String), Result<ReleaseInfo, ProviderError>>,
    calls: CallLog,
}

impl StubProvider {
    /// Create a stub named `name` that is not brute-check capable.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            descriptor: ProviderDescriptor::new(
                name,
                "tests",
                SemanticVersion::new(1, 0, 0),
                format!("https://{}.test", name.to_ascii_lowercase()),
            ),
            searches: HashMap::new(),
            brute_checks: HashMap::new(),
            calls: CallLog::default(),
        }
    }

    /// Mark the stub brute-check capable.
    #[must_use]
    pub fn with_brute_check(mut self) -> Self {
        self.descriptor = self.descriptor.with_brute_check();
        self
    }

    /// Report a different extension contract revision.
    #[must_use]
    pub const fn with_api_version(mut self, api_version: u32) -> Self {
        self.descriptor.api_version = api_version;
        self
    }

    /// Record calls into a log shared with other stubs.
    #[must_use]
    pub fn with_call_log(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }

    /// Script the result of `search(url, _)`.
    #[must_use]
    pub fn on_search(mut self, url: &str, result: Result<ReleaseInfo, ProviderError>) -> Self {
        self.searches.insert(url.to_owned(), result);
        self
    }

    /// Script the result of `brute_check(name, author, _)`.
    #[must_use]
    pub fn on_brute_check(
        mut self,
        name: &str,
        author: &str,
        result: Result<ReleaseInfo, ProviderError>,
    ) -> Self {
        self.brute_checks
            .insert((name.to_owned(), author.to_owned()), result);
        self
    }

    /// The call log, entries formatted `<provider>:search:<url>` or
    /// `<provider>:brute:<name>/<author>`.
    #[must_use]
    pub fn calls(&self) -> CallLog {
        Rc::clone(&self.calls)
    }

    fn not_found(&self, target: String) -> ProviderError {
        ProviderError::NotFound {
            url: format!("{}/{target}", self.descriptor.source_link),
        }
    }
}

impl SearchProvider for StubProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn search(
        &mut self,
        url: &str,
        _current: &SemanticVersion,
    ) -> Result<ReleaseInfo, ProviderError> {
        self.calls
            .borrow_mut()
            .push(format!("{}:search:{url}", self.descriptor.name));
        self.searches.get(url).cloned().unwrap_or_else(|| {
            Err(ProviderError::Unsupported {
                provider: self.descriptor.name.clone(),
                target: url.to_owned(),
            })
        })
    }

    fn brute_check(
        &mut self,
        name: &str,
        author: &str,
        _current: &SemanticVersion,
    ) -> Result<ReleaseInfo, ProviderError> {
        self.calls
            .borrow_mut()
            .push(format!("{}:brute:{name}/{author}", self.descriptor.name));
        self.brute_checks
            .get(&(name.to_owned(), author.to_owned()))
            .cloned()
            .unwrap_or_else(|| Err(self.not_found(format!("{author}/{name}"))))
    }
}

/// An [`ExtensionSource`] serving clones of stub providers alongside the
/// built-in install handlers.
#[derive(Debug, Default)]
pub struct StubSource {
    providers: Vec<StubProvider>,
}

impl StubSource {
    /// Serve `providers`.
    #[must_use]
    pub const fn new(providers: Vec<StubProvider>) -> Self {
        Self { providers }
    }

    /// A registry loaded from this source alone.
    #[must_use]
    pub fn registry(providers: Vec<StubProvider>) -> ProviderRegistry {
        ProviderRegistry::load(&[&Self::new(providers)])
    }
}

impl ExtensionSource for StubSource {
    fn name(&self) -> &str {
        "stub"
    }

    fn load(&self) -> Extensions {
        Extensions {
            providers: self
                .providers
                .iter()
                .map(|p| Box::new(p.clone()) as Box<dyn SearchProvider>)
                .collect(),
            handlers: vec![
                Box::new(AssemblyHandler::new()),
                Box::new(ArchiveHandler::zip()),
                Box::new(ArchiveHandler::tar_gz()),
                Box::new(ArchiveHandler::tar_zstd()),
            ],
        }
    }
}

/// A [`RegistryClient`] answering GETs from a fixed URL table.
///
/// Unknown URLs answer 404. POSTs answer from the same table.
#[derive(Debug, Default)]
pub struct StubRegistryClient {
    responses: HashMap<String, RegistryResponse>,
    requests: RefCell<Vec<String>>,
}

impl StubRegistryClient {
    /// Create a client with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for `url`.
    #[must_use]
    pub fn with_response(mut self, url: &str, response: RegistryResponse) -> Self {
        self.responses.insert(url.to_owned(), response);
        self
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    fn answer(&self, url: &str) -> RegistryResponse {
        self.requests.borrow_mut().push(url.to_owned());
        self.responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| RegistryResponse::new(404, ""))
    }
}

impl RegistryClient for StubRegistryClient {
    fn get(
        &self,
        url: &str,
        _headers: &[(String, String)],
    ) -> Result<RegistryResponse, TransportError> {
        Ok(self.answer(url))
    }

    fn post_form(
        &self,
        url: &str,
        _headers: &[(String, String)],
        _form: &[(String, String)],
    ) -> Result<RegistryResponse, TransportError> {
        Ok(self.answer(url))
    }
}

/// An [`ArtifactDownloader`] serving bytes from memory.
///
/// Unknown URLs fail with [`DownloadError::NotFound`].
#[derive(Debug, Default)]
pub struct StubDownloader {
    files: HashMap<String, Vec<u8>>,
    downloads: RefCell<Vec<String>>,
}

impl StubDownloader {
    /// Create a downloader with no files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `url`.
    #[must_use]
    pub fn with_file(mut self, url: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(url.to_owned(), bytes.into());
        self
    }

    /// URLs downloaded so far, in order.
    #[must_use]
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.borrow().clone()
    }
}

impl ArtifactDownloader for StubDownloader {
    fn download(&self, file: &ArtifactFile, dest: &Path) -> Result<(), DownloadError> {
        let url = file.download_url.as_str();
        self.downloads.borrow_mut().push(url.to_owned());
        let bytes = self.files.get(url).ok_or_else(|| DownloadError::NotFound {
            url: url.to_owned(),
        })?;
        fs::write(dest, bytes)?;
        Ok(())
    }
}

/// An [`IdentityReader`] that parses the file content as
/// `name|author|version`.
///
/// Anything else (including an unparsable version) is unreadable.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubIdentityReader;

impl StubIdentityReader {
    /// Content that this reader parses back into the given identity.
    #[must_use]
    pub fn content(name: &str, author: &str, version: &str) -> String {
        format!("{name}|{author}|{version}")
    }
}

impl IdentityReader for StubIdentityReader {
    fn read_identity(&self, path: &Path) -> Option<EmbeddedIdentity> {
        let text = fs::read_to_string(path).ok()?;
        let mut parts = text.trim().splitn(3, '|');
        let name = parts.next()?;
        let author = parts.next()?;
        let version = SemanticVersion::parse(parts.next()?).ok()?;
        Some(EmbeddedIdentity {
            identity: PackageIdentity::new(name, author),
            version,
        })
    }
}

/// Build a release with one named file per `(file name, url)` pair.
#[must_use]
pub fn release(version: SemanticVersion, files: &[(&str, &str)]) -> ReleaseInfo {
    ReleaseInfo::new(
        version,
        files
            .iter()
            .map(|(name, url)| ArtifactFile::named(*name, *url))
            .collect(),
        "https://registry.test/release",
    )
}

/// Build an in-memory zip archive. Names ending in `/` become directories.
///
/// # Panics
///
/// Panics when the archive cannot be written.
#[must_use]
#[allow(clippy::expect_used, reason = "test fixture")]
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("add directory");
        } else {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(contents).expect("write entry");
        }
    }
    writer.finish().expect("finish zip").into_inner()
}

/// A throwaway host tree rooted in a temporary directory.
///
/// Scratch space lives under `<root>/scratch`; the whole tree is removed on
/// drop.
#[derive(Debug)]
pub struct TestHost {
    root: tempfile::TempDir,
    config: HostConfig,
    layout: HostLayout,
}

impl TestHost {
    /// Create the tree and its host directories.
    ///
    /// # Panics
    ///
    /// Panics when the temporary directory cannot be created or is not
    /// UTF-8.
    #[must_use]
    #[allow(clippy::expect_used, reason = "test fixture")]
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("temp dir");
        let root_path =
            Utf8PathBuf::from_path_buf(root.path().to_path_buf()).expect("utf-8 temp dir");
        let config = HostConfig {
            root: root_path,
            scratch_dir: Some(Utf8PathBuf::from("scratch")),
            ..HostConfig::default()
        };
        let layout = HostLayout::from_config(&config);
        layout.ensure_writable().expect("writable host");
        Self {
            root,
            config,
            layout,
        }
    }

    /// Host configuration describing this tree.
    #[must_use]
    pub const fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Resolved layout.
    #[must_use]
    pub const fn layout(&self) -> &HostLayout {
        &self.layout
    }

    /// Host root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Absolute path of `relative` inside the package directory.
    #[must_use]
    pub fn plugin(&self, relative: &str) -> PathBuf {
        self.layout.packages_dir().as_std_path().join(relative)
    }

    /// Write a file below the host root and return its path.
    ///
    /// # Panics
    ///
    /// Panics when the file cannot be written.
    #[allow(clippy::expect_used, reason = "test fixture")]
    pub fn write(&self, relative: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directory");
        }
        fs::write(&path, content).expect("write file");
        path
    }

    /// Read a file below the host root, `None` when absent.
    #[must_use]
    pub fn read(&self, relative: &str) -> Option<String> {
        fs::read_to_string(self.root().join(relative)).ok()
    }

    /// Files below the scratch directory, relative to it.
    #[must_use]
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        fs::read_dir(self.layout.scratch_dir())
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|entry| PathBuf::from(entry.file_name()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_source_serves_fresh_copies_sharing_one_call_log() {
        let calls = CallLog::default();
        let source = StubSource::new(vec![
            StubProvider::new("Thunderstore")
                .with_call_log(Rc::clone(&calls))
                .on_search("https://a.test", Ok(release(SemanticVersion::new(1, 0, 0), &[]))),
        ]);

        for mut extensions in [source.load(), source.load()] {
            let provider = extensions.providers.first_mut().expect("one provider");
            let found = provider.search("https://a.test", &SemanticVersion::new(0, 1, 0));
            assert!(found.is_ok());
        }

        assert_eq!(calls.borrow().len(), 2);
    }
}
