//! Per-item and per-file outcomes.

use crate::category::Category;
use crate::merge::ConfigFileKind;

/// Result of deploying a single item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The file was written (or would be, in a dry run).
    Installed {
        /// Item category.
        category: Category,
        /// Item filename.
        name: String,
        /// Repository the content came from.
        source: String,
        /// True if an existing, different file was replaced.
        replaced: bool,
    },

    /// The installed file is already byte-identical.
    Unchanged {
        /// Item category.
        category: Category,
        /// Item filename.
        name: String,
    },

    /// The item could not be downloaded or written.
    Failed {
        /// Item category.
        category: Category,
        /// Item filename.
        name: String,
        /// Repository the item was listed from, if any.
        source: Option<String>,
        /// Error message.
        error: String,
    },
}

impl ItemOutcome {
    /// Category of the item.
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::Installed { category, .. }
            | Self::Unchanged { category, .. }
            | Self::Failed { category, .. } => *category,
        }
    }

    /// Filename of the item.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Installed { name, .. }
            | Self::Unchanged { name, .. }
            | Self::Failed { name, .. } => name,
        }
    }
}

/// A (repository, category) pair that could not be listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    /// Repository name.
    pub repository: String,
    /// Category that failed.
    pub category: Category,
    /// Error message.
    pub error: String,
}

/// What happened to one managed config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigFileStatus {
    /// The file did not exist and was written from the template.
    Created,
    /// The merged document differed and was written.
    Updated,
    /// The file already matched the merge result.
    Unchanged,
    /// The file was not valid JSON; it was backed up and replaced.
    Replaced {
        /// Id of the backup of the malformed file.
        backup: Option<String>,
    },
    /// The file could not be reconciled.
    Failed {
        /// Error message.
        error: String,
    },
}

/// Outcome for one managed config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFileReport {
    /// Which file.
    pub kind: ConfigFileKind,
    /// What happened.
    pub status: ConfigFileStatus,
}
