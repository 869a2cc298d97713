//! Remote repository configuration.

use crate::category::Category;
use crate::config::ConfigError;
use bstr::ByteSlice;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// URL of the built-in repository.
pub const DEFAULT_REPOSITORY_URL: &str = "https://github.com/github/awesome-copilot";

/// Name of the built-in repository.
pub const DEFAULT_REPOSITORY_NAME: &str = "Awesome Copilot";

/// A remote source of resources.
///
/// Identity is the `url`. The built-in source has `removable == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepositoryConfig {
    /// Display name, also used as the cache key.
    pub name: String,

    /// GitHub repository URL (`https://github.com/<owner>/<repo>`).
    pub url: String,

    /// Branch to read from; the repository's default branch when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Whether this source takes part in syncs.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Remote directory per category. Categories without a path are not listed.
    #[serde(with = "category_paths")]
    pub paths: BTreeMap<Category, String>,

    /// False only for the built-in source.
    #[serde(skip, default = "default_removable")]
    pub removable: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_removable() -> bool {
    true
}

/// Owner and repository name parsed from a GitHub URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubCoordinates {
    /// User or organization.
    pub owner: String,

    /// Repository name.
    pub repo: String,
}

impl RepositoryConfig {
    /// Creates a user-added repository with one path per category, each
    /// named after the category.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            branch: None,
            enabled: true,
            paths: Category::ALL
                .into_iter()
                .map(|category| (category, category.as_str().to_string()))
                .collect(),
            removable: true,
        }
    }

    /// The built-in, non-removable source.
    #[must_use]
    pub fn default_source() -> Self {
        Self {
            branch: Some("main".to_string()),
            removable: false,
            ..Self::new(DEFAULT_REPOSITORY_NAME, DEFAULT_REPOSITORY_URL)
        }
    }

    /// Sets the branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Replaces the category paths.
    #[must_use]
    pub fn with_paths(mut self, paths: impl IntoIterator<Item = (Category, String)>) -> Self {
        self.paths = paths.into_iter().collect();
        self
    }

    /// Returns true if this is the built-in source's URL.
    #[must_use]
    pub fn is_default_source(&self) -> bool {
        same_url(&self.url, DEFAULT_REPOSITORY_URL)
    }

    /// Parses owner and repository name from the URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the URL is not a GitHub
    /// repository URL.
    pub fn coordinates(&self) -> Result<GitHubCoordinates, ConfigError> {
        let invalid = |message: String| ConfigError::ValidationError {
            name: self.name.clone(),
            message,
        };

        let url = Url::parse(&self.url)
            .map_err(|e| invalid(format!("url '{}' is not valid: {e}", self.url)))?;

        if url.host_str() != Some("github.com") {
            return Err(invalid(format!("url '{}' is not a github.com URL", self.url)));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [owner, repo] => Ok(GitHubCoordinates {
                owner: (*owner).to_string(),
                repo: repo.trim_end_matches(".git").to_string(),
            }),
            _ => Err(invalid(format!(
                "url '{}' must look like https://github.com/<owner>/<repo>",
                self.url
            ))),
        }
    }

    /// Validates the entry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::ValidationError {
            name: self.name.clone(),
            message: message.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }

        self.coordinates()?;

        if let Some(branch) = &self.branch {
            if gix_validate::reference::name_partial(branch.as_bytes().as_bstr()).is_err() {
                return Err(invalid(&format!("branch '{branch}' is not a valid ref name")));
            }
        }

        if self.paths.is_empty() {
            return Err(invalid("at least one category path is required"));
        }

        for (category, path) in &self.paths {
            let trimmed = path.trim_matches('/');
            if trimmed.is_empty() {
                return Err(invalid(&format!("path for {category} must not be empty")));
            }
            if trimmed.split('/').any(|part| part == ".." || part == ".") {
                return Err(invalid(&format!(
                    "path for {category} must not contain '.' or '..' segments"
                )));
            }
        }

        Ok(())
    }
}

/// Compares repository URLs ignoring case, trailing slashes and `.git`.
#[must_use]
pub fn same_url(a: &str, b: &str) -> bool {
    normalize_url(a) == normalize_url(b)
}

pub(crate) fn normalize_url(url: &str) -> String {
    url.trim()
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .to_ascii_lowercase()
}

/// Serializes category keys through their string names.
mod category_paths {
    use crate::category::Category;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub(super) fn serialize<S: Serializer>(
        paths: &BTreeMap<Category, String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        paths
            .iter()
            .map(|(category, path)| (category.as_str(), path.as_str()))
            .collect::<BTreeMap<_, _>>()
            .serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Category, String>, D::Error> {
        BTreeMap::<String, String>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, path)| {
                key.parse::<Category>()
                    .map(|category| (category, path))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_github_coordinates() {
        let repo = RepositoryConfig::new("x", "https://github.com/octo/prompts.git/");
        assert_eq!(
            repo.coordinates().unwrap(),
            GitHubCoordinates {
                owner: "octo".to_string(),
                repo: "prompts".to_string(),
            }
        );
    }

    #[test]
    fn rejects_non_github_urls() {
        let repo = RepositoryConfig::new("x", "https://gitlab.com/octo/prompts");
        assert!(matches!(
            repo.validate(),
            Err(ConfigError::ValidationError { .. })
        ));

        let repo = RepositoryConfig::new("x", "https://github.com/octo");
        assert!(repo.validate().is_err());
    }

    #[test]
    fn rejects_invalid_branch() {
        let repo = RepositoryConfig::new("x", "https://github.com/octo/prompts")
            .with_branch("bad..branch");
        assert!(repo.validate().is_err());

        let repo = RepositoryConfig::new("x", "https://github.com/octo/prompts")
            .with_branch("release/v1");
        assert!(repo.validate().is_ok());
    }

    #[test]
    fn rejects_parent_segments_in_paths() {
        let repo = RepositoryConfig::new("x", "https://github.com/octo/prompts")
            .with_paths([(Category::Agents, "../secrets".to_string())]);
        assert!(repo.validate().is_err());
    }

    #[test]
    fn default_source_is_not_removable() {
        let repo = RepositoryConfig::default_source();
        assert!(!repo.removable);
        assert!(repo.is_default_source());
        assert!(repo.validate().is_ok());
        assert_eq!(repo.paths.len(), Category::ALL.len());
    }

    #[test]
    fn compares_urls_loosely() {
        assert!(same_url(
            "https://github.com/Github/Awesome-Copilot/",
            "https://github.com/github/awesome-copilot.git"
        ));
        assert!(!same_url(
            "https://github.com/github/awesome-copilot",
            "https://github.com/github/other"
        ));
    }
}
