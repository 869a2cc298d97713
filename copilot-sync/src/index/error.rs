//! Content index error types.

use crate::config::ConfigError;
use crate::fetch::FetchError;
use thiserror::Error;

/// Errors that can occur while listing or downloading remote items.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The request never produced a response.
    #[error("Network failure for '{url}': {source}")]
    Network {
        url: String,
        #[source]
        source: FetchError,
    },

    /// Still unauthorized after signing in.
    #[error("Authorization required for '{url}'")]
    AuthRequired { url: String },

    /// The remote resource does not exist.
    #[error("Not found: '{url}'")]
    NotFound { url: String },

    /// The GitHub rate limit is exhausted.
    #[error("Rate limit exceeded for '{url}'")]
    RateLimited { url: String, reset: Option<u64> },

    /// Any other unexpected status.
    #[error("Unexpected HTTP status {status} for '{url}'")]
    Http { url: String, status: u16 },

    /// The directory listing body could not be understood.
    #[error("Invalid directory listing from '{url}': {message}")]
    InvalidListing { url: String, message: String },

    /// The repository configuration is unusable.
    #[error(transparent)]
    InvalidRepository(#[from] ConfigError),
}
