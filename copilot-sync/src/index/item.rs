//! Remote item type.

use crate::category::Category;
use serde::Serialize;

/// One remote file that can be installed.
///
/// Identity is `(source_repository_url, category, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryItem {
    /// Filename, e.g. `code-review.agent.md`.
    pub name: String,

    /// Category the file belongs to.
    pub category: Category,

    /// Display title derived from the filename.
    pub title: String,

    /// Direct download URL for the file contents.
    pub raw_content_url: String,

    /// Name of the repository the item was listed from.
    pub source_repository_name: String,

    /// URL of the repository the item was listed from.
    pub source_repository_url: String,
}

impl RepositoryItem {
    /// Key under which the item is installed locally.
    ///
    /// Two items from different repositories with the same key would write
    /// the same file.
    #[must_use]
    pub fn install_key(&self) -> (Category, &str) {
        (self.category, self.name.as_str())
    }
}
