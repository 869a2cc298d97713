//! Installed-item tracking.
//!
//! The local filesystem is the source of truth for what is installed. Nothing
//! here is cached: every call reads the `.github/<category>/` directories as
//! they are right now.

use crate::category::Category;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Directory under the workspace root holding one directory per category.
pub const MANAGED_ROOT: &str = ".github";

/// Snapshot of installed filenames per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstalledItems {
    items: BTreeMap<Category, BTreeSet<String>>,
}

impl InstalledItems {
    /// Returns true if `filename` was installed in `category` at scan time.
    #[must_use]
    pub fn contains(&self, category: Category, filename: &str) -> bool {
        self.items
            .get(&category)
            .is_some_and(|names| names.contains(filename))
    }

    /// Installed filenames in `category`, sorted.
    pub fn names(&self, category: Category) -> impl Iterator<Item = &str> {
        self.items
            .get(&category)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Number of installed files in `category`.
    #[must_use]
    pub fn count(&self, category: Category) -> usize {
        self.items.get(&category).map_or(0, BTreeSet::len)
    }

    /// Count per category, including categories with nothing installed.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<Category, usize> {
        Category::ALL
            .into_iter()
            .map(|category| (category, self.count(category)))
            .collect()
    }

    /// Total number of installed files.
    #[must_use]
    pub fn total(&self) -> usize {
        self.items.values().map(BTreeSet::len).sum()
    }
}

/// Path of the managed directory for `category` under `root`.
#[must_use]
pub fn category_dir(root: &Path, category: Category) -> PathBuf {
    root.join(MANAGED_ROOT).join(category.as_str())
}

/// Scans every category directory under `root`.
///
/// A missing or unreadable directory contributes an empty set; the scan as a
/// whole never fails. Only regular files carrying the category suffix count.
#[must_use]
pub fn scan(root: &Path) -> InstalledItems {
    let items = Category::ALL
        .into_iter()
        .map(|category| (category, scan_category(root, category)))
        .collect();
    InstalledItems { items }
}

fn scan_category(root: &Path, category: Category) -> BTreeSet<String> {
    let dir = category_dir(root, category);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            trace!(path = %dir.display(), "Category directory does not exist");
            return BTreeSet::new();
        }
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Failed to read category directory");
            return BTreeSet::new();
        }
    };

    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| category.matches(name))
        .collect()
}

/// Answers installed-state questions for one workspace.
#[derive(Debug, Clone)]
pub struct InstalledItemTracker {
    root: PathBuf,
}

impl InstalledItemTracker {
    /// Creates a tracker for the workspace at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads the current installed state.
    #[must_use]
    pub fn scan(&self) -> InstalledItems {
        scan(&self.root)
    }

    /// Probes for a single installed file.
    ///
    /// Advisory only: the file may appear or vanish right after.
    #[must_use]
    pub fn exists(&self, category: Category, filename: &str) -> bool {
        self.path_of(category, filename).is_file()
    }

    /// Number of installed files in `category`.
    #[must_use]
    pub fn count(&self, category: Category) -> usize {
        scan_category(&self.root, category).len()
    }

    /// Where `filename` lives (or would live) in `category`.
    #[must_use]
    pub fn path_of(&self, category: Category, filename: &str) -> PathBuf {
        category_dir(&self.root, category).join(filename)
    }
}
