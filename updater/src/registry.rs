//! Extension registration.
//!
//! Search providers and install handlers are registered explicitly through
//! [`ExtensionSource`]s. The registry validates each extension's contract
//! revision, orders providers, and maps file extensions onto handlers.

use std::collections::BTreeMap;
use std::rc::Rc;

use modsync_common::ProviderDescriptor;

use crate::clock::Clock;
use crate::config::ProvidersConfig;
use crate::handler::InstallHandler;
use crate::handler::archive::ArchiveHandler;
use crate::handler::assembly::AssemblyHandler;
use crate::http::RegistryClient;
use crate::provider::SearchProvider;
use crate::provider::github::{GitHubOptions, GitHubProvider};
use crate::provider::thunderstore::ThunderstoreProvider;

/// Extensions contributed by one source.
#[derive(Default)]
pub struct Extensions {
    /// Search providers, in any order.
    pub providers: Vec<Box<dyn SearchProvider>>,
    /// Install handlers, in any order.
    pub handlers: Vec<Box<dyn InstallHandler>>,
}

/// Something that contributes providers and handlers to a registry.
pub trait ExtensionSource {
    /// Label used in log messages.
    fn name(&self) -> &str;

    /// Construct this source's extensions.
    fn load(&self) -> Extensions;
}

/// The extensions shipped with modsync.
pub struct BuiltinExtensions {
    client: Rc<dyn RegistryClient>,
    clock: Rc<dyn Clock>,
    config: ProvidersConfig,
}

impl BuiltinExtensions {
    /// Build the source from provider configuration.
    #[must_use]
    pub fn new(client: Rc<dyn RegistryClient>, clock: Rc<dyn Clock>, config: ProvidersConfig) -> Self {
        Self {
            client,
            clock,
            config,
        }
    }
}

impl ExtensionSource for BuiltinExtensions {
    fn name(&self) -> &str {
        "builtin"
    }

    fn load(&self) -> Extensions {
        let github = GitHubOptions {
            api_url: self.config.github.api_url.clone(),
            token: self.config.github.token.clone(),
            include_prereleases: self.config.github.include_prereleases,
            fallback_cooldown: self.config.cooldown(),
        };
        Extensions {
            providers: vec![
                Box::new(ThunderstoreProvider::new(
                    Rc::clone(&self.client),
                    Rc::clone(&self.clock),
                    &self.config.thunderstore.base_url,
                    self.config.cooldown(),
                )),
                Box::new(GitHubProvider::new(
                    Rc::clone(&self.client),
                    Rc::clone(&self.clock),
                    github,
                )),
            ],
            handlers: vec![
                Box::new(AssemblyHandler::new()),
                Box::new(ArchiveHandler::zip()),
                Box::new(ArchiveHandler::tar_gz()),
                Box::new(ArchiveHandler::tar_zstd()),
            ],
        }
    }
}

/// Loaded providers and handlers.
///
/// Providers are ordered by source registration order, then by name
/// ignoring ASCII case. Each file extension maps to at most one handler: the
/// first one registered that claims it.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn SearchProvider>>,
    handlers: Vec<Box<dyn InstallHandler>>,
    by_extension: BTreeMap<String, usize>,
}

impl ProviderRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every source in order.
    #[must_use]
    pub fn load(sources: &[&dyn ExtensionSource]) -> Self {
        let mut registry = Self::new();
        for source in sources {
            registry.register(*source);
        }
        registry
    }

    /// Load one source's extensions after everything already registered.
    pub fn register(&mut self, source: &dyn ExtensionSource) {
        let Extensions {
            mut providers,
            handlers,
        } = source.load();
        providers.sort_by_key(|p| p.descriptor().name.to_ascii_lowercase());

        for provider in providers {
            if self.accepts_provider(source.name(), provider.descriptor()) {
                log::debug!("loaded search provider {}", provider.descriptor());
                self.providers.push(provider);
            }
        }
        for handler in handlers {
            self.register_handler(source.name(), handler);
        }
    }

    fn accepts_provider(&self, source: &str, descriptor: &ProviderDescriptor) -> bool {
        if !descriptor.is_compatible() {
            log::warn!(
                "{source}: skipping provider {descriptor}: built for extension API {}",
                descriptor.api_version
            );
            return false;
        }
        let duplicate = self
            .providers
            .iter()
            .any(|p| p.descriptor().name.eq_ignore_ascii_case(&descriptor.name));
        if duplicate {
            log::warn!("{source}: skipping provider {descriptor}: name already registered");
            return false;
        }
        true
    }

    fn register_handler(&mut self, source: &str, handler: Box<dyn InstallHandler>) {
        let descriptor = handler.descriptor();
        if !descriptor.is_compatible() {
            log::warn!(
                "{source}: skipping install handler {descriptor}: built for extension API {}",
                descriptor.api_version
            );
            return;
        }
        let index = self.handlers.len();
        let mut claimed = false;
        for ext in handler.extensions() {
            let ext = ext.to_ascii_lowercase();
            if let Some(owner) = self.handler_for(&ext) {
                log::warn!(
                    "{source}: .{ext} is already handled by {}; ignoring {descriptor}",
                    owner.descriptor()
                );
                continue;
            }
            self.by_extension.insert(ext, index);
            claimed = true;
        }
        if claimed {
            log::debug!("loaded install handler {descriptor}");
            self.handlers.push(handler);
        }
    }

    /// Providers in resolution order.
    #[must_use]
    pub fn providers(&self) -> &[Box<dyn SearchProvider>] {
        &self.providers
    }

    /// Mutable access for resolvers; providers keep rate-limit state.
    pub fn providers_mut(&mut self) -> &mut [Box<dyn SearchProvider>] {
        &mut self.providers
    }

    /// Registered handlers in registration order.
    #[must_use]
    pub fn handlers(&self) -> &[Box<dyn InstallHandler>] {
        &self.handlers
    }

    /// The handler claiming `extension` (ASCII case ignored).
    #[must_use]
    pub fn handler_for(&self, extension: &str) -> Option<&dyn InstallHandler> {
        self.by_extension
            .get(&extension.to_ascii_lowercase())
            .and_then(|&index| self.handlers.get(index))
            .map(AsRef::as_ref)
    }

    /// Extensions claimed by each handler, keyed by handler name.
    #[must_use]
    pub fn claimed_extensions(&self) -> BTreeMap<String, Vec<String>> {
        let mut claimed: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (ext, &index) in &self.by_extension {
            if let Some(handler) = self.handlers.get(index) {
                claimed
                    .entry(handler.descriptor().name.clone())
                    .or_default()
                    .push(ext.clone());
            }
        }
        claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{InstallContext, InstallError, InstallOutcome};
    use crate::test_utils::{ManualClock, StubProvider, StubRegistryClient};
    use modsync_common::{EXTENSION_API_VERSION, SemanticVersion};
    use chrono::Utc;
    use rstest::rstest;
    use std::path::Path;

    struct FakeHandler {
        descriptor: ProviderDescriptor,
        extensions: &'static [&'static str],
    }

    impl FakeHandler {
        fn boxed(name: &str, extensions: &'static [&'static str]) -> Box<dyn InstallHandler> {
            Box::new(Self {
                descriptor: ProviderDescriptor::new(
                    name,
                    "tests",
                    SemanticVersion::new(1, 0, 0),
                    "https://example.test",
                ),
                extensions,
            })
        }
    }

    impl InstallHandler for FakeHandler {
        fn descriptor(&self) -> &ProviderDescriptor {
            &self.descriptor
        }

        fn extensions(&self) -> &[&'static str] {
            self.extensions
        }

        fn install(
            &self,
            _file: &Path,
            _ctx: &mut InstallContext<'_>,
        ) -> Result<InstallOutcome, InstallError> {
            Ok(InstallOutcome::success())
        }
    }

    struct FixedSource {
        name: &'static str,
        build: fn() -> Extensions,
    }

    impl ExtensionSource for FixedSource {
        fn name(&self) -> &str {
            self.name
        }

        fn load(&self) -> Extensions {
            (self.build)()
        }
    }

    fn names(registry: &ProviderRegistry) -> Vec<String> {
        registry
            .providers()
            .iter()
            .map(|p| p.descriptor().name.clone())
            .collect()
    }

    #[test]
    fn providers_follow_source_order_then_name() {
        let first = FixedSource {
            name: "first",
            build: || Extensions {
                providers: vec![
                    Box::new(StubProvider::new("zeta")),
                    Box::new(StubProvider::new("Alpha")),
                ],
                handlers: Vec::new(),
            },
        };
        let second = FixedSource {
            name: "second",
            build: || Extensions {
                providers: vec![Box::new(StubProvider::new("aardvark"))],
                handlers: Vec::new(),
            },
        };

        let registry = ProviderRegistry::load(&[&first, &second]);

        assert_eq!(names(&registry), ["Alpha", "zeta", "aardvark"]);
    }

    #[test]
    fn incompatible_and_duplicate_providers_are_skipped() {
        let source = FixedSource {
            name: "mixed",
            build: || Extensions {
                providers: vec![
                    Box::new(StubProvider::new("Same")),
                    Box::new(StubProvider::new("same")),
                    Box::new(
                        StubProvider::new("Legacy").with_api_version(EXTENSION_API_VERSION + 1),
                    ),
                ],
                handlers: Vec::new(),
            },
        };

        let registry = ProviderRegistry::load(&[&source]);

        assert_eq!(registry.providers().len(), 1);
    }

    #[test]
    fn first_handler_keeps_a_contested_extension() {
        let source = FixedSource {
            name: "handlers",
            build: || Extensions {
                providers: Vec::new(),
                handlers: vec![
                    FakeHandler::boxed("First", &["zip"]),
                    FakeHandler::boxed("Second", &["ZIP", "rar"]),
                    FakeHandler::boxed("Third", &["zip"]),
                ],
            },
        };

        let registry = ProviderRegistry::load(&[&source]);

        let zip = registry.handler_for("zip").expect("zip handler");
        assert_eq!(zip.descriptor().name, "First");
        let rar = registry.handler_for("RAR").expect("rar handler");
        assert_eq!(rar.descriptor().name, "Second");
        assert_eq!(registry.handlers().len(), 2, "Third claims nothing");
    }

    #[rstest]
    #[case::assembly("dll", "Assembly")]
    #[case::zip("zip", "Zip archive")]
    #[case::tgz("tgz", "Gzip tarball")]
    #[case::gz("gz", "Gzip tarball")]
    #[case::zst("zst", "Zstd tarball")]
    fn builtin_extensions_cover_known_formats(#[case] ext: &str, #[case] handler: &str) {
        let builtin = BuiltinExtensions::new(
            Rc::new(StubRegistryClient::new()),
            Rc::new(ManualClock::new(Utc::now())),
            ProvidersConfig::default(),
        );

        let registry = ProviderRegistry::load(&[&builtin]);

        assert_eq!(names(&registry), ["GitHub", "Thunderstore"]);
        let found = registry.handler_for(ext).expect("handler");
        assert_eq!(found.descriptor().name, handler);
        assert!(registry.handler_for("exe").is_none());
    }

    #[test]
    fn claimed_extensions_group_by_handler() {
        let builtin = BuiltinExtensions::new(
            Rc::new(StubRegistryClient::new()),
            Rc::new(ManualClock::new(Utc::now())),
            ProvidersConfig::default(),
        );
        let registry = ProviderRegistry::load(&[&builtin]);

        let claimed = registry.claimed_extensions();

        assert_eq!(claimed.get("Gzip tarball"), Some(&vec!["gz".to_owned(), "tgz".to_owned()]));
        assert_eq!(claimed.get("Assembly"), Some(&vec!["dll".to_owned()]));
    }
}
