//! Reconciling one config file on disk.

use super::{merge, ConfigFileKind, MergeError};
use crate::fsutil::write_atomic;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// What was on disk before reconciling.
#[derive(Debug, Clone, PartialEq)]
pub enum ExistingDocument {
    /// No file yet.
    Missing,
    /// A parseable JSON document.
    Valid(Value),
    /// A file that is not valid JSON. It is treated as an empty user layer.
    Invalid {
        /// Parser message.
        message: String,
    },
}

/// The merged result for one file, ready to be written.
#[derive(Debug, Clone)]
pub struct MergePlan {
    /// Which file this is.
    pub kind: ConfigFileKind,

    /// Absolute path of the file.
    pub path: PathBuf,

    /// Previous contents.
    pub existing: ExistingDocument,

    /// Template with the user layer applied.
    pub merged: Value,

    rendered: String,
}

impl MergePlan {
    /// Reads the current file under `root` and merges it over `template`.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError`] if the file exists but can't be read, or the
    /// merged document can't be rendered.
    pub fn prepare(
        root: &Path,
        kind: ConfigFileKind,
        template: &Value,
    ) -> Result<Self, MergeError> {
        let path = kind.path_in(root);
        let existing = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(value) => ExistingDocument::Valid(value),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Existing config is not valid JSON, using template only"
                    );
                    ExistingDocument::Invalid {
                        message: e.to_string(),
                    }
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => ExistingDocument::Missing,
            Err(source) => {
                return Err(MergeError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        let merged = match &existing {
            ExistingDocument::Valid(user) => merge(template, user),
            ExistingDocument::Missing | ExistingDocument::Invalid { .. } => template.clone(),
        };

        let mut rendered =
            serde_json::to_string_pretty(&merged).map_err(|source| MergeError::Serialize {
                path: path.display().to_string(),
                source,
            })?;
        rendered.push('\n');

        Ok(Self {
            kind,
            path,
            existing,
            merged,
            rendered,
        })
    }

    /// Returns true if writing would change the file's meaning.
    ///
    /// A valid file whose document already equals the merge result is left
    /// alone, whatever its formatting.
    #[must_use]
    pub fn needs_write(&self) -> bool {
        match &self.existing {
            ExistingDocument::Valid(current) => *current != self.merged,
            ExistingDocument::Missing | ExistingDocument::Invalid { .. } => true,
        }
    }

    /// Returns true if the previous file was not valid JSON.
    #[must_use]
    pub fn replaces_invalid(&self) -> bool {
        matches!(self.existing, ExistingDocument::Invalid { .. })
    }

    /// Writes the merged document.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Io`] if the write fails.
    pub fn apply(&self) -> Result<(), MergeError> {
        write_atomic(&self.path, self.rendered.as_bytes()).map_err(|source| MergeError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, kind: ConfigFileKind, contents: &str) {
        let path = kind.path_in(root);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn missing_file_gets_template() {
        let temp = TempDir::new().unwrap();
        let template = json!({"recommendations": ["a"]});

        let plan = MergePlan::prepare(temp.path(), ConfigFileKind::Extensions, &template).unwrap();
        assert_eq!(plan.existing, ExistingDocument::Missing);
        assert!(plan.needs_write());
        plan.apply().unwrap();

        let written = fs::read_to_string(ConfigFileKind::Extensions.path_in(temp.path())).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&written).unwrap(), template);
    }

    #[test]
    fn invalid_file_is_replaced_by_template() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), ConfigFileKind::Settings, "{ broken");
        let template = json!({"a": 1});

        let plan = MergePlan::prepare(temp.path(), ConfigFileKind::Settings, &template).unwrap();

        assert!(plan.replaces_invalid());
        assert!(plan.needs_write());
        assert_eq!(plan.merged, template);
    }

    #[test]
    fn already_merged_file_is_left_alone() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            ConfigFileKind::Extensions,
            r#"{"recommendations":["a","b"]}"#,
        );
        let template = json!({"recommendations": ["a"]});

        let plan = MergePlan::prepare(temp.path(), ConfigFileKind::Extensions, &template).unwrap();

        assert!(!plan.needs_write());
    }

    #[test]
    fn written_file_keeps_user_key_order() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), ConfigFileKind::Settings, r#"{"zeta": 1, "alpha": 2}"#);
        let template = json!({"chat.enabled": true});

        let plan = MergePlan::prepare(temp.path(), ConfigFileKind::Settings, &template).unwrap();
        plan.apply().unwrap();

        let written = fs::read_to_string(ConfigFileKind::Settings.path_in(temp.path())).unwrap();
        let zeta = written.find("zeta").unwrap();
        let alpha = written.find("alpha").unwrap();
        let chat = written.find("chat.enabled").unwrap();
        assert!(zeta < alpha && alpha < chat);
    }
}
