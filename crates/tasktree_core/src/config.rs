//! Tree store configuration.
//!
//! # Responsibility
//! - Name the sentinel folders located by title at the root level.
//! - Name the tags that drive stuck-project detection.
//! - Carry structural policy knobs (template rewrite kind, traversal ceiling).
//!
//! # Invariants
//! - Every field has a default, so an empty JSON object is a valid config.
//! - `max_traversal_depth` is strictly positive.

use crate::model::item::ItemKind;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Absolute recursion ceiling applied to every traversal.
pub const DEFAULT_MAX_TRAVERSAL_DEPTH: usize = 100;

/// Titles of the root-level sentinel folders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SentinelTitles {
    pub trash: String,
    pub archive: String,
    pub reference: String,
    pub templates: String,
    pub inbox: String,
}

impl Default for SentinelTitles {
    fn default() -> Self {
        Self {
            trash: "Trash".to_string(),
            archive: "Archive".to_string(),
            reference: "Reference".to_string(),
            templates: "Templates".to_string(),
            inbox: "Inbox".to_string(),
        }
    }
}

/// Configuration consumed by `TreeService`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeConfig {
    pub sentinels: SentinelTitles,
    /// Presence within two levels marks a project as not stuck.
    pub actionable_tag: String,
    /// Candidates carrying any of these tags are never reported as stuck.
    pub excluded_tags: Vec<String>,
    /// Kind given to copied `Template` nodes below the clone root.
    pub template_container_kind: ItemKind,
    pub max_traversal_depth: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            sentinels: SentinelTitles::default(),
            actionable_tag: "Next".to_string(),
            excluded_tags: vec!["On Hold".to_string(), "Routine".to_string()],
            template_container_kind: ItemKind::Folder,
            max_traversal_depth: DEFAULT_MAX_TRAVERSAL_DEPTH,
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid tree config: {err}"),
            Self::Invalid(message) => write!(f, "invalid tree config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl TreeConfig {
    /// Parses a JSON document, filling omitted fields with defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_traversal_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_traversal_depth must be greater than zero".to_string(),
            ));
        }
        if self.actionable_tag.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "actionable_tag must not be blank".to_string(),
            ));
        }
        let titles = [
            &self.sentinels.trash,
            &self.sentinels.archive,
            &self.sentinels.reference,
            &self.sentinels.templates,
            &self.sentinels.inbox,
        ];
        if titles.iter().any(|title| title.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "sentinel titles must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}
