//! Fetch error types.

use thiserror::Error;

/// Transport-level failures. HTTP error statuses are not errors here.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("Request to '{url}' failed: {message}")]
    Transport { url: String, message: String },

    /// A request header could not be encoded.
    #[error("Invalid request header '{name}'")]
    InvalidHeader { name: String },

    /// Interactive sign-in was requested but nothing can perform it.
    #[error("Sign-in required but no sign-in method is available")]
    SignInUnavailable,

    /// Interactive sign-in ran and failed.
    #[error("Sign-in failed: {message}")]
    SignInFailed { message: String },

    /// GitHub client construction failed.
    #[error("GitHub client error: {0}")]
    Client(#[from] octocrab::Error),
}
