//! GitHub directory listings.

use super::{IndexError, RepositoryItem};
use crate::category::Category;
use crate::config::{GitHubCoordinates, RepositoryConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;
use url::Url;

const API_BASE: &str = "https://api.github.com";
const RAW_BASE: &str = "https://raw.githubusercontent.com";

/// Everything listed for one repository.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryListing {
    /// Repository name.
    pub repository_name: String,

    /// Repository URL.
    pub repository_url: String,

    /// Items across all categories, ordered by title.
    pub items: Vec<RepositoryItem>,

    /// Categories that could not be listed.
    pub failures: Vec<ListingFailure>,

    /// Whether the items came from the cache.
    pub from_cache: bool,
}

impl RepositoryListing {
    /// Returns true if every configured category was listed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A (repository, category) pair that failed to list.
#[derive(Debug, Clone, Serialize)]
pub struct ListingFailure {
    /// Category whose listing failed.
    pub category: Category,

    /// Error message.
    pub error: String,
}

/// One entry of a GitHub contents API directory response.
#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    download_url: Option<String>,
}

/// Builds the contents API URL listing `path` in a repository.
pub(crate) fn contents_url(
    coordinates: &GitHubCoordinates,
    path: &str,
    branch: Option<&str>,
) -> Result<String, IndexError> {
    let mut url = Url::parse(API_BASE).map_err(|e| IndexError::InvalidListing {
        url: API_BASE.to_string(),
        message: e.to_string(),
    })?;

    url.path_segments_mut()
        .map_err(|()| IndexError::InvalidListing {
            url: API_BASE.to_string(),
            message: "base URL cannot have a path".to_string(),
        })?
        .pop_if_empty()
        .extend(["repos", coordinates.owner.as_str(), coordinates.repo.as_str(), "contents"])
        .extend(path.split('/').filter(|segment| !segment.is_empty()));

    if let Some(branch) = branch {
        url.query_pairs_mut().append_pair("ref", branch);
    }

    Ok(url.to_string())
}

/// Fallback raw URL for entries without a `download_url`.
fn raw_url(coordinates: &GitHubCoordinates, branch: Option<&str>, path: &str) -> String {
    format!(
        "{RAW_BASE}/{}/{}/{}/{}",
        coordinates.owner,
        coordinates.repo,
        branch.unwrap_or("HEAD"),
        path.trim_start_matches('/')
    )
}

/// Returns true if `name` is a single path component that can't leave its directory.
pub(crate) fn is_plain_file_name(name: &str) -> bool {
    !name.contains(['/', '\\'])
        && !name.contains("..")
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

/// Parses a contents API body, keeping only files with the category suffix.
pub(crate) fn parse_listing(
    body: &str,
    url: &str,
    category: Category,
    repository: &RepositoryConfig,
    coordinates: &GitHubCoordinates,
) -> Result<Vec<RepositoryItem>, IndexError> {
    let entries: Vec<ContentEntry> =
        serde_json::from_str(body).map_err(|e| IndexError::InvalidListing {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    Ok(entries
        .into_iter()
        .filter(|entry| entry.kind == "file" && category.matches(&entry.name))
        .filter(|entry| {
            let plain = is_plain_file_name(&entry.name);
            if !plain {
                warn!(url, name = %entry.name, "Skipping listing entry with an unsafe name");
            }
            plain
        })
        .map(|entry| RepositoryItem {
            title: category.title_for(&entry.name),
            raw_content_url: entry.download_url.unwrap_or_else(|| {
                raw_url(coordinates, repository.branch.as_deref(), &entry.path)
            }),
            name: entry.name,
            category,
            source_repository_name: repository.name.clone(),
            source_repository_url: repository.url.clone(),
        })
        .collect())
}

/// Orders items by title, then filename, then category.
pub(crate) fn sort_items(items: &mut [RepositoryItem]) {
    items.sort_by(|a, b| {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.category.cmp(&b.category))
    });
}
