//! Deployment error types.

use crate::backup::BackupError;
use crate::config::ConfigError;
use crate::workspace::WorkspaceError;

/// Errors that abort a deployment operation.
///
/// Per-item and per-source failures are not errors; they are recorded in the
/// [`DeploymentSummary`](super::DeploymentSummary).
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// No workspace to deploy into.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// Configuration or templates are unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A backup or restore failed.
    #[error(transparent)]
    Backup(#[from] BackupError),
}
