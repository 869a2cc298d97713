//! Resource categories.
//!
//! Every synchronized resource belongs to exactly one [`Category`], which
//! decides both where it lives in the workspace (`.github/<category>/`) and
//! which filename suffix a remote file must carry to be picked up.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A category of synchronized resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Custom agent definitions (`*.agent.md`).
    Agents,
    /// Reusable prompt files (`*.prompt.md`).
    Prompts,
    /// Custom instruction files (`*.instructions.md`).
    Instructions,
    /// Chat mode definitions (`*.chatmode.md`).
    Chatmodes,
}

impl Category {
    /// All categories, in the order they are processed and reported.
    pub const ALL: [Category; 4] = [
        Category::Agents,
        Category::Prompts,
        Category::Instructions,
        Category::Chatmodes,
    ];

    /// Directory name under `.github/`, also used as the config key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agents => "agents",
            Self::Prompts => "prompts",
            Self::Instructions => "instructions",
            Self::Chatmodes => "chatmodes",
        }
    }

    /// Filename suffix a file must end with to belong to this category.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Agents => ".agent.md",
            Self::Prompts => ".prompt.md",
            Self::Instructions => ".instructions.md",
            Self::Chatmodes => ".chatmode.md",
        }
    }

    /// Human-readable name for summaries.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Agents => "Agents",
            Self::Prompts => "Prompts",
            Self::Instructions => "Instructions",
            Self::Chatmodes => "Chat Modes",
        }
    }

    /// Returns true if `filename` carries this category's suffix.
    ///
    /// A bare suffix (e.g. `.agent.md`) is not a valid item name.
    #[must_use]
    pub fn matches(self, filename: &str) -> bool {
        filename.len() > self.suffix().len() && filename.ends_with(self.suffix())
    }

    /// Derives a display title from an item filename.
    ///
    /// `code-review_helper.agent.md` becomes `Code Review Helper`. Names that
    /// don't carry the suffix are titled as-is.
    #[must_use]
    pub fn title_for(self, filename: &str) -> String {
        let stem = filename.strip_suffix(self.suffix()).unwrap_or(filename);
        stem.split(['-', '_', ' '])
            .filter(|word| !word.is_empty())
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown category '{0}', expected one of: agents, prompts, instructions, chatmodes")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
