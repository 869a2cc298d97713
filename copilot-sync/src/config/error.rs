//! Configuration error types.

use thiserror::Error;

/// Errors that can occur while loading, validating or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or write a file.
    #[error("Failed to access file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML content.
    #[error("Failed to parse config '{path}': {source}")]
    TomlError {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Failed to serialize the configuration.
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A repository entry failed validation.
    #[error("Invalid repository '{name}': {message}")]
    ValidationError { name: String, message: String },

    /// Two repositories share the same URL.
    #[error("Repository '{url}' is configured more than once")]
    DuplicateRepository { url: String },

    /// No repository with this URL is configured.
    #[error("No repository configured with URL '{url}'")]
    UnknownRepository { url: String },

    /// Attempted to remove the built-in repository.
    #[error("Repository '{url}' is built in and cannot be removed; disable it instead")]
    NotRemovable { url: String },

    /// A template override file is not valid JSON.
    #[error("Template '{path}' is not valid JSON: {source}")]
    TemplateError {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
