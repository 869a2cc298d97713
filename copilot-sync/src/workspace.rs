//! Workspace root resolution.

use crate::config::CONFIG_FILE_NAME;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Entries whose presence marks a directory as a workspace root.
const MARKERS: [&str; 4] = [".git", ".vscode", ".github", CONFIG_FILE_NAME];

/// Errors resolving the workspace root.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// No workspace is open, and none could be found.
    #[error("No workspace open: pass --workspace or run inside a project directory")]
    NoWorkspaceOpen,

    /// The given workspace path is not a directory.
    #[error("Workspace '{path}' is not a directory")]
    NotADirectory { path: String },

    /// The workspace path could not be resolved.
    #[error("Failed to resolve workspace '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Supplies the directory that anchors `.github/` and `.vscode/`.
pub trait WorkspaceResolver: Send + Sync {
    /// Returns the absolute workspace root.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::NoWorkspaceOpen`] if there is none.
    fn resolve(&self) -> Result<PathBuf, WorkspaceError>;
}

/// A workspace given up front, or none at all.
#[derive(Debug, Clone, Default)]
pub struct FixedWorkspace(pub Option<PathBuf>);

impl WorkspaceResolver for FixedWorkspace {
    fn resolve(&self) -> Result<PathBuf, WorkspaceError> {
        let path = self.0.as_deref().ok_or(WorkspaceError::NoWorkspaceOpen)?;
        let absolute = std::fs::canonicalize(path).map_err(|source| WorkspaceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if !absolute.is_dir() {
            return Err(WorkspaceError::NotADirectory {
                path: absolute.display().to_string(),
            });
        }
        Ok(absolute)
    }
}

/// Walks up from a starting directory to the nearest workspace marker.
#[derive(Debug, Clone)]
pub struct DiscoveredWorkspace {
    start: PathBuf,
}

impl DiscoveredWorkspace {
    /// Searches from `start` upwards.
    #[must_use]
    pub fn new(start: impl Into<PathBuf>) -> Self {
        Self {
            start: start.into(),
        }
    }
}

impl WorkspaceResolver for DiscoveredWorkspace {
    fn resolve(&self) -> Result<PathBuf, WorkspaceError> {
        let start = std::fs::canonicalize(&self.start).map_err(|source| WorkspaceError::Io {
            path: self.start.display().to_string(),
            source,
        })?;
        let root = start
            .ancestors()
            .find(|dir| is_workspace_root(dir))
            .ok_or(WorkspaceError::NoWorkspaceOpen)?;
        debug!(root = %root.display(), "Discovered workspace");
        Ok(root.to_path_buf())
    }
}

fn is_workspace_root(dir: &Path) -> bool {
    MARKERS.iter().any(|marker| dir.join(marker).exists())
}
