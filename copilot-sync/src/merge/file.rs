//! Managed config files and their templates.

use crate::config::{ConfigError, TemplatePaths};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

const SETTINGS_TEMPLATE: &str = include_str!("../../templates/settings.json");
const EXTENSIONS_TEMPLATE: &str = include_str!("../../templates/extensions.json");
const MCP_TEMPLATE: &str = include_str!("../../templates/mcp.json");

/// Directory under the workspace root holding the managed config files.
pub const VSCODE_DIR: &str = ".vscode";

/// A config file the tool reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFileKind {
    /// `.vscode/settings.json`
    Settings,
    /// `.vscode/extensions.json`
    Extensions,
    /// `.vscode/mcp.json`
    Mcp,
}

impl ConfigFileKind {
    /// Every managed file, in reconcile order.
    pub const ALL: [Self; 3] = [Self::Settings, Self::Extensions, Self::Mcp];

    /// File name inside `.vscode/`.
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Settings => "settings.json",
            Self::Extensions => "extensions.json",
            Self::Mcp => "mcp.json",
        }
    }

    /// Absolute location under the workspace `root`.
    #[must_use]
    pub fn path_in(self, root: &Path) -> PathBuf {
        root.join(VSCODE_DIR).join(self.file_name())
    }

    fn builtin(self) -> &'static str {
        match self {
            Self::Settings => SETTINGS_TEMPLATE,
            Self::Extensions => EXTENSIONS_TEMPLATE,
            Self::Mcp => MCP_TEMPLATE,
        }
    }

    fn override_path(self, paths: &TemplatePaths) -> Option<&Path> {
        match self {
            Self::Settings => paths.settings.as_deref(),
            Self::Extensions => paths.extensions.as_deref(),
            Self::Mcp => paths.mcp.as_deref(),
        }
    }
}

impl fmt::Display for ConfigFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Template documents for every managed file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigTemplates {
    settings: Value,
    extensions: Value,
    mcp: Value,
}

impl ConfigTemplates {
    /// Template for `kind`.
    #[must_use]
    pub fn get(&self, kind: ConfigFileKind) -> &Value {
        match kind {
            ConfigFileKind::Settings => &self.settings,
            ConfigFileKind::Extensions => &self.extensions,
            ConfigFileKind::Mcp => &self.mcp,
        }
    }

    /// The templates compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TemplateError`] if a built-in template is not
    /// valid JSON.
    pub fn builtin() -> Result<Self, ConfigError> {
        load_templates(&TemplatePaths::default())
    }
}

/// Loads templates, preferring the override files configured in `paths`.
///
/// # Errors
///
/// Returns [`ConfigError::IoError`] if an override can't be read, or
/// [`ConfigError::TemplateError`] if a template is not valid JSON.
pub fn load_templates(paths: &TemplatePaths) -> Result<ConfigTemplates, ConfigError> {
    let load = |kind: ConfigFileKind| -> Result<Value, ConfigError> {
        match kind.override_path(paths) {
            Some(path) => {
                debug!(file = %kind, path = %path.display(), "Loading template override");
                let contents =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
                        path: path.display().to_string(),
                        source,
                    })?;
                parse_template(&contents, &path.display().to_string())
            }
            None => parse_template(kind.builtin(), &format!("<built-in {kind}>")),
        }
    };

    Ok(ConfigTemplates {
        settings: load(ConfigFileKind::Settings)?,
        extensions: load(ConfigFileKind::Extensions)?,
        mcp: load(ConfigFileKind::Mcp)?,
    })
}

fn parse_template(contents: &str, origin: &str) -> Result<Value, ConfigError> {
    serde_json::from_str(contents).map_err(|source| ConfigError::TemplateError {
        path: origin.to_string(),
        source,
    })
}
