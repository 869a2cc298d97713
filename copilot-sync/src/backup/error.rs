//! Backup error types.

use thiserror::Error;

/// Errors that can occur while creating or restoring backups.
#[derive(Debug, Error)]
pub enum BackupError {
    /// A filesystem operation failed outside of a restore.
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// No backup with this id exists for the target.
    #[error("No backup '{id}' found for '{target}'")]
    NotFound { target: String, id: String },

    /// A target name or backup id would escape its directory.
    #[error("Invalid {what} '{value}'")]
    InvalidName { what: &'static str, value: String },

    /// The restore failed and the live directory was rolled back to its
    /// previous contents.
    #[error("Restore of '{target}' failed and was rolled back: {source}")]
    RestoreFailed {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// The restore failed and so did the rollback. The previous contents
    /// are still available in the temporary snapshot.
    #[error(
        "Restore of '{target}' failed and so did the rollback; previous contents are in '{snapshot}': {source}"
    )]
    RollbackFailed {
        target: String,
        snapshot: String,
        #[source]
        source: std::io::Error,
    },
}

impl BackupError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
