//! Sync configuration loading and editing.
//!
//! Configuration lives in a TOML file (by default `copilot-sync.toml` in the
//! workspace root):
//!
//! ```toml
//! cache-ttl-secs = 300
//! backup-retention-days = 7
//! concurrency = 8
//!
//! [templates]
//! mcp = "templates/mcp.json"
//!
//! [[repository]]
//! name = "Team prompts"
//! url = "https://github.com/acme/copilot-prompts"
//! branch = "main"
//!
//! [repository.paths]
//! prompts = "prompts"
//! instructions = "docs/instructions"
//! ```
//!
//! The built-in repository is always present. A `[[repository]]` entry with
//! its URL may disable it, but it cannot be removed.

mod error;
mod repository;

pub use error::ConfigError;
pub(crate) use repository::normalize_url;
pub use repository::{
    same_url, GitHubCoordinates, RepositoryConfig, DEFAULT_REPOSITORY_NAME,
    DEFAULT_REPOSITORY_URL,
};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default config file name, relative to the workspace root.
pub const CONFIG_FILE_NAME: &str = "copilot-sync.toml";

/// Environment variable overriding [`SyncConfig::concurrency`].
pub const CONCURRENCY_ENV: &str = "COPILOT_SYNC_CONCURRENCY";

/// Optional per-file template overrides, relative to the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TemplatePaths {
    /// Replacement for the built-in `settings.json` template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<PathBuf>,

    /// Replacement for the built-in `extensions.json` template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<PathBuf>,

    /// Replacement for the built-in `mcp.json` template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp: Option<PathBuf>,
}

/// Complete sync configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SyncConfig {
    /// Listing cache time-to-live in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Backups older than this many days are removed by cleanup.
    #[serde(default = "default_backup_retention_days")]
    pub backup_retention_days: u32,

    /// Maximum concurrent downloads.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Snapshot a category directory before overwriting files in it.
    #[serde(default = "default_backup_before_overwrite")]
    pub backup_before_overwrite: bool,

    /// Template overrides.
    #[serde(default, skip_serializing_if = "is_default_templates")]
    pub templates: TemplatePaths,

    /// Configured repositories, built-in first.
    #[serde(default, rename = "repository")]
    pub repositories: Vec<RepositoryConfig>,
}

pub(crate) fn default_cache_ttl_secs() -> u64 {
    crate::cache::DEFAULT_TTL.as_secs()
}

pub(crate) fn default_backup_retention_days() -> u32 {
    7
}

pub(crate) fn default_concurrency() -> usize {
    8
}

fn default_backup_before_overwrite() -> bool {
    true
}

fn is_default_templates(templates: &TemplatePaths) -> bool {
    *templates == TemplatePaths::default()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            backup_retention_days: default_backup_retention_days(),
            concurrency: default_concurrency(),
            backup_before_overwrite: default_backup_before_overwrite(),
            templates: TemplatePaths::default(),
            repositories: vec![RepositoryConfig::default_source()],
        }
    }
}

impl SyncConfig {
    /// Loads configuration from `path`, or defaults if the file is missing.
    ///
    /// Relative template paths are resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file can't be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        info!(path = %path.display(), "Loading config");
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            path: path.display().to_string(),
            source,
        })?;

        let mut config = Self::parse(&contents, path)?;
        if let Some(base) = path.parent() {
            config.templates.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Parses configuration text. `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is invalid.
    pub fn parse(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(contents).map_err(|source| ConfigError::TomlError {
            path: origin.display().to_string(),
            source,
        })?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| ConfigError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Ensures the built-in source is present, first, and flagged non-removable.
    fn normalize(&mut self) {
        let builtin = self
            .repositories
            .iter()
            .position(RepositoryConfig::is_default_source);

        let mut source = RepositoryConfig::default_source();
        if let Some(index) = builtin {
            let configured = self.repositories.remove(index);
            source.enabled = configured.enabled;
            if configured.branch.is_some() {
                source.branch = configured.branch;
            }
            if !configured.paths.is_empty() {
                source.paths = configured.paths;
            }
        }
        self.repositories.insert(0, source);

        if self.concurrency == 0 {
            warn!("concurrency of 0 is not allowed, using 1");
            self.concurrency = 1;
        }
    }

    /// Validates every repository and rejects duplicate URLs.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for repository in &self.repositories {
            repository.validate()?;
            if !seen.insert(repository::normalize_url(&repository.url)) {
                return Err(ConfigError::DuplicateRepository {
                    url: repository.url.clone(),
                });
            }
        }
        Ok(())
    }

    /// Repositories taking part in syncs, in configured order.
    #[must_use]
    pub fn enabled_repositories(&self) -> Vec<RepositoryConfig> {
        self.repositories
            .iter()
            .filter(|repository| repository.enabled)
            .cloned()
            .collect()
    }

    /// Finds a repository by URL.
    #[must_use]
    pub fn repository(&self, url: &str) -> Option<&RepositoryConfig> {
        self.repositories
            .iter()
            .find(|repository| same_url(&repository.url, url))
    }

    /// Adds a user repository.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if it is invalid or its URL is already configured.
    pub fn add_repository(&mut self, mut repository: RepositoryConfig) -> Result<(), ConfigError> {
        repository.validate()?;
        if self.repository(&repository.url).is_some() {
            return Err(ConfigError::DuplicateRepository {
                url: repository.url,
            });
        }
        repository.removable = true;
        info!(name = %repository.name, url = %repository.url, "Added repository");
        self.repositories.push(repository);
        Ok(())
    }

    /// Removes a user repository.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotRemovable`] for the built-in source and
    /// [`ConfigError::UnknownRepository`] if nothing matches.
    pub fn remove_repository(&mut self, url: &str) -> Result<RepositoryConfig, ConfigError> {
        let index = self
            .repositories
            .iter()
            .position(|repository| same_url(&repository.url, url))
            .ok_or_else(|| ConfigError::UnknownRepository {
                url: url.to_string(),
            })?;

        if !self.repositories[index].removable {
            return Err(ConfigError::NotRemovable {
                url: url.to_string(),
            });
        }

        let removed = self.repositories.remove(index);
        info!(name = %removed.name, url = %removed.url, "Removed repository");
        Ok(removed)
    }

    /// Enables or disables a repository.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownRepository`] if nothing matches.
    pub fn set_enabled(&mut self, url: &str, enabled: bool) -> Result<(), ConfigError> {
        let repository = self
            .repositories
            .iter_mut()
            .find(|repository| same_url(&repository.url, url))
            .ok_or_else(|| ConfigError::UnknownRepository {
                url: url.to_string(),
            })?;
        repository.enabled = enabled;
        Ok(())
    }

    /// Effective download concurrency.
    ///
    /// The environment variable takes precedence over the config file.
    #[must_use]
    pub fn resolve_concurrency(&self) -> usize {
        if let Ok(value) = std::env::var(CONCURRENCY_ENV) {
            match value.parse::<usize>() {
                Ok(n) if n > 0 => return n,
                _ => warn!(value = %value, "Ignoring invalid {CONCURRENCY_ENV}"),
            }
        }
        self.concurrency.max(1)
    }
}

impl TemplatePaths {
    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.settings, &mut self.extensions, &mut self.mcp]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}
