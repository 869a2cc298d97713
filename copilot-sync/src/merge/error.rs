//! Config merge error types.

use thiserror::Error;

/// Errors that can occur while reading or writing a managed config file.
///
/// A malformed existing file is not an error; see
/// [`ExistingDocument::Invalid`](super::ExistingDocument::Invalid).
#[derive(Debug, Error)]
pub enum MergeError {
    /// Failed to read or write the file.
    #[error("Failed to access config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to render the merged document.
    #[error("Failed to serialize '{path}': {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
