//! Configuration loaded from `modsync.toml`.
//!
//! The file is located by, in order: the `--config` flag, the
//! `MODSYNC_CONFIG` environment variable, then
//! `<platform config dir>/modsync/modsync.toml`. Only the last location may be
//! missing, in which case every setting takes its default. Environment
//! overrides (currently `MODSYNC_GITHUB_TOKEN`) are applied after parsing.

use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::TimeDelta;
use serde::Deserialize;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "MODSYNC_CONFIG";

/// Environment variable overriding `providers.github.token`.
pub const GITHUB_TOKEN_ENV: &str = "MODSYNC_GITHUB_TOKEN";

/// Configuration file name inside the platform config directory.
pub const CONFIG_FILE: &str = "modsync.toml";

const DEFAULT_CATALOG: &str = "modsync-packages.toml";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        /// The file that was read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid.
    #[error("invalid configuration {path}: {source}")]
    Parse {
        /// The file that was parsed.
        path: Utf8PathBuf,
        /// The TOML error.
        #[source]
        source: toml::de::Error,
    },
}

/// Where the configuration is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    /// File path.
    pub path: Utf8PathBuf,
    /// Whether a missing file is an error.
    pub required: bool,
}

impl ConfigLocation {
    /// Resolve the location from an explicit path, the environment, or the
    /// platform config directory. Returns `None` when none is available.
    #[must_use]
    pub fn resolve(explicit: Option<&Utf8Path>) -> Option<Self> {
        if let Some(path) = explicit {
            return Some(Self {
                path: path.to_owned(),
                required: true,
            });
        }
        if let Some(path) = std::env::var(CONFIG_ENV).ok().filter(|v| !v.trim().is_empty()) {
            return Some(Self {
                path: Utf8PathBuf::from(path),
                required: true,
            });
        }
        let base = directories_next::BaseDirs::new()?;
        let dir = Utf8PathBuf::from_path_buf(base.config_dir().to_path_buf()).ok()?;
        Some(Self {
            path: dir.join("modsync").join(CONFIG_FILE),
            required: false,
        })
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Host directory layout.
    pub host: HostConfig,
    /// Registry access settings.
    pub providers: ProvidersConfig,
}

impl Config {
    /// Load configuration from the resolved location and apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required file is missing or any file
    /// fails to parse.
    pub fn load(explicit: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let mut config = match ConfigLocation::resolve(explicit) {
            Some(location) => Self::load_with(&location, |path| std::fs::read_to_string(path))?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration using the supplied reader.
    ///
    /// This helper exists so tests can supply file contents without touching
    /// the file system. Environment overrides are not applied.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8PathBuf;
    /// use modsync_updater::config::{Config, ConfigLocation};
    ///
    /// let location = ConfigLocation { path: Utf8PathBuf::from("modsync.toml"), required: true };
    /// let config = Config::load_with(&location, |_| Ok("[providers]\ntimeout_secs = 5\n".to_owned()))
    ///     .expect("valid configuration");
    /// assert_eq!(config.providers.timeout_secs, 5);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the reader fails (other than a missing,
    /// optional file) or the contents fail to parse.
    pub fn load_with<F>(location: &ConfigLocation, reader: F) -> Result<Self, ConfigError>
    where
        F: FnOnce(&Utf8Path) -> io::Result<String>,
    {
        let text = match reader(&location.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound && !location.required => {
                log::debug!("no configuration at {}; using defaults", location.path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: location.path.clone(),
                    source,
                });
            }
        };
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: location.path.clone(),
            source,
        })
    }

    /// Apply environment overrides on top of the parsed file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(token) = std::env::var(GITHUB_TOKEN_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            self.providers.github.token = Some(token);
        }
    }
}

/// The `[host]` section.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Host root; relative paths resolve against the working directory.
    pub root: Utf8PathBuf,
    /// Raw binary package directory, relative to `root`.
    pub packages_dir: Utf8PathBuf,
    /// Backup directory, relative to `root`.
    pub backup_dir: Utf8PathBuf,
    /// Scratch directory, relative to `root`; system temp when absent.
    pub scratch_dir: Option<Utf8PathBuf>,
    /// Installed-package catalog, relative to `root`.
    pub catalog: Option<Utf8PathBuf>,
    /// Recognised top-level archive folders and their host directories.
    pub categories: BTreeMap<String, Utf8PathBuf>,
}

impl HostConfig {
    /// Path of the installed-package catalog.
    #[must_use]
    pub fn catalog_path(&self) -> Utf8PathBuf {
        self.root
            .join(self.catalog.as_deref().unwrap_or(Utf8Path::new(DEFAULT_CATALOG)))
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        let categories = ["plugins", "patchers", "config", "core", "monomod"]
            .into_iter()
            .map(|name| (name.to_owned(), Utf8PathBuf::from("BepInEx").join(name)))
            .collect();
        Self {
            root: Utf8PathBuf::from("."),
            packages_dir: Utf8PathBuf::from("BepInEx/plugins"),
            backup_dir: Utf8PathBuf::from("BepInEx/backup"),
            scratch_dir: None,
            catalog: None,
            categories,
        }
    }
}

/// The `[providers]` section.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProvidersConfig {
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Global per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Fixed rate-limit cooldown in seconds.
    pub cooldown_secs: u64,
    /// GitHub settings.
    pub github: GitHubConfig,
    /// Thunderstore settings.
    pub thunderstore: ThunderstoreConfig,
}

impl ProvidersConfig {
    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Fixed cooldown length, saturating at the largest representable span.
    #[must_use]
    pub fn cooldown(&self) -> TimeDelta {
        i64::try_from(self.cooldown_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("modsync/", env!("CARGO_PKG_VERSION")).to_owned(),
            timeout_secs: 30,
            cooldown_secs: 60,
            github: GitHubConfig::default(),
            thunderstore: ThunderstoreConfig::default(),
        }
    }
}

/// The `[providers.github]` section.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubConfig {
    /// Bearer token for API requests.
    pub token: Option<String>,
    /// OAuth application id used by `modsync auth`.
    pub client_id: Option<String>,
    /// Report pre-releases as update candidates.
    pub include_prereleases: bool,
    /// API root override, mainly for GitHub Enterprise.
    pub api_url: Option<String>,
}

/// The `[providers.thunderstore]` section.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ThunderstoreConfig {
    /// Instance root.
    pub base_url: String,
}

impl Default for ThunderstoreConfig {
    fn default() -> Self {
        Self {
            base_url: crate::provider::thunderstore::DEFAULT_BASE_URL.to_owned(),
        }
    }
}
